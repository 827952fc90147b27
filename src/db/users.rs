use chrono::Utc;

use super::Db;
use super::models::{DbTeam, DbUser};
use super::patch::{TeamCreate, UserCreate};
use crate::error::CimsError;

const USER_COLUMNS: &str =
    "id, email, password_hash, name, role, is_active, profile_photo, last_login_at, created_at";

impl Db {
    pub async fn create_user(&self, user: UserCreate) -> Result<i64, CimsError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (email, password_hash, name, role, is_active, created_at)
            VALUES (?, ?, ?, ?, 1, ?)
            RETURNING id
            "#,
        )
        .bind(user.email.trim().to_lowercase())
        .bind(user.password_hash)
        .bind(user.name)
        .bind(user.role)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;

        Ok(id)
    }

    pub async fn count_users(&self) -> Result<i64, CimsError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await?;
        Ok(n)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<DbUser>, CimsError> {
        let row = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn find_user(&self, id: i64) -> Result<Option<DbUser>, CimsError> {
        let row = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn set_user_active(&self, id: i64, active: bool) -> Result<(), CimsError> {
        let res = sqlx::query("UPDATE users SET is_active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(self.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(CimsError::not_found("User"));
        }
        Ok(())
    }

    /// Stamp `last_login_at` and return the refreshed row.
    pub async fn record_login(&self, id: i64) -> Result<DbUser, CimsError> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;
        self.find_user(id)
            .await?
            .ok_or_else(|| CimsError::not_found("User"))
    }

    pub async fn list_teams(&self) -> Result<Vec<DbTeam>, CimsError> {
        let rows = sqlx::query_as::<_, DbTeam>(
            "SELECT id, name, email_alias, created_at FROM teams ORDER BY name",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn find_team(&self, id: i64) -> Result<Option<DbTeam>, CimsError> {
        let row = sqlx::query_as::<_, DbTeam>(
            "SELECT id, name, email_alias, created_at FROM teams WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn create_team(&self, team: TeamCreate) -> Result<DbTeam, CimsError> {
        let row = sqlx::query_as::<_, DbTeam>(
            r#"
            INSERT INTO teams (name, email_alias, created_at)
            VALUES (?, ?, ?)
            RETURNING id, name, email_alias, created_at
            "#,
        )
        .bind(team.name)
        .bind(team.email_alias)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await
        .map_err(|e| CimsError::from(e).on_unique("Team already exists"))?;
        Ok(row)
    }
}
