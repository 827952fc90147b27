use chrono::Utc;

use super::Db;
use super::models::DbChatMessage;
use crate::error::CimsError;

impl Db {
    pub async fn append_chat_message(
        &self,
        user_id: i64,
        session_id: &str,
        role: &str,
        content: &str,
    ) -> Result<(), CimsError> {
        sqlx::query(
            "INSERT INTO chat_history (user_id, session_id, role, content, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(session_id)
        .bind(role)
        .bind(content)
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// A user's messages, oldest first; all sessions unless `session_id` is given.
    pub async fn chat_history(
        &self,
        user_id: i64,
        session_id: Option<&str>,
    ) -> Result<Vec<DbChatMessage>, CimsError> {
        let rows = sqlx::query_as::<_, DbChatMessage>(
            r#"
            SELECT id, user_id, session_id, role, content, timestamp
            FROM chat_history
            WHERE user_id = ? AND (? IS NULL OR session_id = ?)
            ORDER BY timestamp, id
            "#,
        )
        .bind(user_id)
        .bind(session_id)
        .bind(session_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn clear_chat_session(&self, user_id: i64, session_id: &str) -> Result<u64, CimsError> {
        let res = sqlx::query("DELETE FROM chat_history WHERE user_id = ? AND session_id = ?")
            .bind(user_id)
            .bind(session_id)
            .execute(self.pool())
            .await?;
        Ok(res.rows_affected())
    }
}
