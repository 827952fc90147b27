use chrono::Utc;

use super::Db;
use super::models::DbLlmKey;
use crate::error::CimsError;

/// Fixed primary key of the single `llm_settings` row.
const SETTINGS_ROW_ID: i64 = 1;

/// Stored provider keys (newest first) and the current selection.
#[derive(Debug, Clone, Default)]
pub struct LlmKeyState {
    pub keys: Vec<DbLlmKey>,
    pub selected_key_id: Option<i64>,
}

impl Db {
    pub async fn llm_key_state(&self) -> Result<LlmKeyState, CimsError> {
        let keys = sqlx::query_as::<_, DbLlmKey>(
            "SELECT id, provider, label, api_key, created_at FROM llm_api_keys ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.pool())
        .await?;

        let selected_key_id: Option<Option<i64>> =
            sqlx::query_scalar("SELECT selected_key_id FROM llm_settings WHERE id = ?")
                .bind(SETTINGS_ROW_ID)
                .fetch_optional(self.pool())
                .await?;

        Ok(LlmKeyState {
            keys,
            selected_key_id: selected_key_id.flatten(),
        })
    }

    /// Store a key; the first key ever stored becomes the selection.
    pub async fn add_llm_key(
        &self,
        provider: &str,
        label: Option<String>,
        api_key: &str,
    ) -> Result<i64, CimsError> {
        let mut tx = self.pool().begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO llm_api_keys (provider, label, api_key, created_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(provider)
        .bind(label)
        .bind(api_key)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM llm_api_keys")
            .fetch_one(&mut *tx)
            .await?;
        if count == 1 {
            write_selection(&mut tx, Some(id)).await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    pub async fn select_llm_key(&self, key_id: i64) -> Result<(), CimsError> {
        let mut tx = self.pool().begin().await?;
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM llm_api_keys WHERE id = ?)")
            .bind(key_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(CimsError::not_found("API key"));
        }
        write_selection(&mut tx, Some(key_id)).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Delete a key. If it was selected, the newest remaining key (or none) takes over.
    pub async fn delete_llm_key(&self, key_id: i64) -> Result<(), CimsError> {
        let mut tx = self.pool().begin().await?;

        let res = sqlx::query("DELETE FROM llm_api_keys WHERE id = ?")
            .bind(key_id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(CimsError::not_found("API key"));
        }

        let selected: Option<Option<i64>> =
            sqlx::query_scalar("SELECT selected_key_id FROM llm_settings WHERE id = ?")
                .bind(SETTINGS_ROW_ID)
                .fetch_optional(&mut *tx)
                .await?;

        if selected.flatten() == Some(key_id) {
            let newest: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM llm_api_keys ORDER BY created_at DESC, id DESC LIMIT 1",
            )
            .fetch_optional(&mut *tx)
            .await?;
            write_selection(&mut tx, newest).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Replace the key material and/or label. `label: Some("")` clears the label.
    pub async fn update_llm_key(
        &self,
        key_id: i64,
        api_key: Option<&str>,
        label: Option<Option<String>>,
    ) -> Result<(), CimsError> {
        let label_set = label.is_some();
        let res = sqlx::query(
            r#"
            UPDATE llm_api_keys
            SET
                api_key = COALESCE(?, api_key),
                label = CASE WHEN ? THEN ? ELSE label END
            WHERE id = ?
            "#,
        )
        .bind(api_key)
        .bind(label_set)
        .bind(label.flatten())
        .bind(key_id)
        .execute(self.pool())
        .await?;
        if res.rows_affected() == 0 {
            return Err(CimsError::not_found("API key"));
        }
        Ok(())
    }
}

async fn write_selection(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    key_id: Option<i64>,
) -> Result<(), CimsError> {
    sqlx::query(
        r#"
        INSERT INTO llm_settings (id, selected_key_id, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            selected_key_id = excluded.selected_key_id,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(SETTINGS_ROW_ID)
    .bind(key_id)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
