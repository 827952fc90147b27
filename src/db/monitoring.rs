use chrono::{DateTime, Utc};
use cims_schema::ExtractedMetric;
use serde::Deserialize;
use sqlx::types::Json;
use tracing::debug;

use super::Db;
use super::models::{DbMonitoringUpload, ParseStatus};
use super::patch::MonitoringUploadCreate;
use crate::error::CimsError;

const UPLOAD_COLUMNS: &str = "id, device_item_id, vm_id, location_id, file_path, file_name, \
     mime_type, uploaded_by_user_id, capture_time, dashboard_label, raw_text, extracted_metrics, \
     parse_status, parse_confidence, parse_error, created_at";

const UPLOAD_LIST_LIMIT: i64 = 200;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadFilter {
    pub device_item_id: Option<i64>,
    pub vm_id: Option<i64>,
}

/// Outcome of one background parse, written back onto the upload row.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub status: ParseStatus,
    pub raw_text: Option<String>,
    pub metrics: Vec<ExtractedMetric>,
    pub confidence: Option<f64>,
    pub error: Option<String>,
    /// Replaces the stored capture time when present.
    pub capture_time: Option<DateTime<Utc>>,
}

impl Db {
    pub async fn create_monitoring_upload(
        &self,
        c: MonitoringUploadCreate,
    ) -> Result<DbMonitoringUpload, CimsError> {
        let row = sqlx::query_as::<_, DbMonitoringUpload>(&format!(
            r#"
            INSERT INTO monitoring_uploads (
                device_item_id, vm_id, location_id, file_path, file_name, mime_type,
                uploaded_by_user_id, capture_time, dashboard_label, parse_status, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {UPLOAD_COLUMNS}
            "#
        ))
        .bind(c.device_item_id)
        .bind(c.vm_id)
        .bind(c.location_id)
        .bind(c.file_path)
        .bind(c.file_name)
        .bind(c.mime_type)
        .bind(c.uploaded_by_user_id)
        .bind(c.capture_time)
        .bind(c.dashboard_label)
        .bind(ParseStatus::Pending)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await
        .map_err(|e| CimsError::from(e).on_foreign_key("Device item, VM or location not found"))?;
        Ok(row)
    }

    pub async fn get_monitoring_upload(&self, id: i64) -> Result<DbMonitoringUpload, CimsError> {
        sqlx::query_as::<_, DbMonitoringUpload>(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM monitoring_uploads WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CimsError::not_found("Upload"))
    }

    pub async fn list_monitoring_uploads(
        &self,
        filter: &UploadFilter,
    ) -> Result<Vec<DbMonitoringUpload>, CimsError> {
        let rows = sqlx::query_as::<_, DbMonitoringUpload>(&format!(
            r#"
            SELECT {UPLOAD_COLUMNS}
            FROM monitoring_uploads
            WHERE (? IS NULL OR device_item_id = ?)
              AND (? IS NULL OR vm_id = ?)
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#
        ))
        .bind(filter.device_item_id)
        .bind(filter.device_item_id)
        .bind(filter.vm_id)
        .bind(filter.vm_id)
        .bind(UPLOAD_LIST_LIMIT)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn record_parse_outcome(&self, id: i64, outcome: ParseOutcome) -> Result<(), CimsError> {
        let res = sqlx::query(
            r#"
            UPDATE monitoring_uploads
            SET
                parse_status = ?,
                raw_text = ?,
                extracted_metrics = ?,
                parse_confidence = ?,
                parse_error = ?,
                capture_time = COALESCE(?, capture_time)
            WHERE id = ?
            "#,
        )
        .bind(outcome.status)
        .bind(outcome.raw_text)
        .bind(Json(outcome.metrics))
        .bind(outcome.confidence)
        .bind(outcome.error)
        .bind(outcome.capture_time)
        .bind(id)
        .execute(self.pool())
        .await?;

        debug!(upload_id = id, status = ?outcome.status, affected = res.rows_affected(), "parse outcome stored");
        if res.rows_affected() == 0 {
            return Err(CimsError::not_found("Upload"));
        }
        Ok(())
    }

    pub async fn set_parse_status(&self, id: i64, status: ParseStatus) -> Result<(), CimsError> {
        let res = sqlx::query("UPDATE monitoring_uploads SET parse_status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(self.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(CimsError::not_found("Upload"));
        }
        Ok(())
    }

    /// Uploads created before `cutoff`, as `(id, file_path)` pairs.
    pub async fn monitoring_uploads_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<(i64, String)>, CimsError> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, file_path FROM monitoring_uploads WHERE created_at < ?")
                .bind(cutoff)
                .fetch_all(self.pool())
                .await?;
        Ok(rows)
    }

    /// Delete uploads and the samples sourced from them. Returns the number of samples removed.
    pub async fn purge_monitoring_uploads(&self, ids: &[i64]) -> Result<u64, CimsError> {
        let mut tx = self.pool().begin().await?;
        let mut samples_removed = 0;
        for id in ids {
            samples_removed += sqlx::query("DELETE FROM metric_samples WHERE source_upload_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            sqlx::query("DELETE FROM monitoring_uploads WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(samples_removed)
    }
}
