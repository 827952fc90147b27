use chrono::Utc;

use super::Db;
use super::models::{AlertStatus, DbAlert, DbAlertRule, DbAlertUpdate};
use super::patch::AlertRuleUpsert;
use crate::error::CimsError;

const RULE_COLUMNS: &str = "id, name, group_id, metric_key, operator, threshold, duration_minutes, \
     severity, message_template, team_id, is_enabled, created_at";

const ALERT_COLUMNS: &str = "id, device_item_id, vm_id, rule_id, status, severity, detected_at, \
     latest_value, summary, evidence_upload_id";

const ALERT_LIST_LIMIT: i64 = 200;

const UNKNOWN_RULE_REFERENCE: &str = "Metric group or team not found";

/// A new alert raised by the engine.
#[derive(Debug, Clone)]
pub struct AlertCreate {
    pub device_item_id: Option<i64>,
    pub vm_id: Option<i64>,
    pub rule_id: i64,
    pub severity: String,
    pub latest_value: f64,
    pub summary: String,
    pub evidence_upload_id: Option<i64>,
}

impl Db {
    pub async fn list_alert_rules(&self) -> Result<Vec<DbAlertRule>, CimsError> {
        let rows = sqlx::query_as::<_, DbAlertRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM alert_rules ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn create_alert_rule(&self, c: AlertRuleUpsert) -> Result<DbAlertRule, CimsError> {
        let row = sqlx::query_as::<_, DbAlertRule>(&format!(
            r#"
            INSERT INTO alert_rules (
                name, group_id, metric_key, operator, threshold, duration_minutes, severity,
                message_template, team_id, is_enabled, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(c.name)
        .bind(c.group_id)
        .bind(c.metric_key)
        .bind(c.operator)
        .bind(c.threshold)
        .bind(c.duration_minutes)
        .bind(c.severity)
        .bind(c.message_template)
        .bind(c.team_id)
        .bind(c.is_enabled)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await
        .map_err(|e| CimsError::from(e).on_foreign_key(UNKNOWN_RULE_REFERENCE))?;
        Ok(row)
    }

    /// Replace every field of a rule.
    pub async fn update_alert_rule(&self, id: i64, c: AlertRuleUpsert) -> Result<DbAlertRule, CimsError> {
        sqlx::query_as::<_, DbAlertRule>(&format!(
            r#"
            UPDATE alert_rules
            SET
                name = ?, group_id = ?, metric_key = ?, operator = ?, threshold = ?,
                duration_minutes = ?, severity = ?, message_template = ?, team_id = ?, is_enabled = ?
            WHERE id = ?
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(c.name)
        .bind(c.group_id)
        .bind(c.metric_key)
        .bind(c.operator)
        .bind(c.threshold)
        .bind(c.duration_minutes)
        .bind(c.severity)
        .bind(c.message_template)
        .bind(c.team_id)
        .bind(c.is_enabled)
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| CimsError::from(e).on_foreign_key(UNKNOWN_RULE_REFERENCE))?
        .ok_or_else(|| CimsError::not_found("Rule"))
    }

    pub async fn delete_alert_rule(&self, id: i64) -> Result<(), CimsError> {
        let res = sqlx::query("DELETE FROM alert_rules WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(CimsError::not_found("Rule"));
        }
        Ok(())
    }

    /// Enabled rules for `metric_key`; restricted to `group_id` when the target belongs to one.
    pub async fn matching_alert_rules(
        &self,
        metric_key: &str,
        group_id: Option<i64>,
    ) -> Result<Vec<DbAlertRule>, CimsError> {
        let rows = sqlx::query_as::<_, DbAlertRule>(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM alert_rules
            WHERE metric_key = ? AND is_enabled = 1
              AND (? IS NULL OR group_id = ?)
            ORDER BY id
            "#
        ))
        .bind(metric_key)
        .bind(group_id)
        .bind(group_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Metric group of the VM or device a sample belongs to. The VM wins when both are set.
    pub async fn target_metric_group(
        &self,
        device_item_id: Option<i64>,
        vm_id: Option<i64>,
    ) -> Result<Option<i64>, CimsError> {
        if let Some(id) = vm_id {
            let group: Option<Option<i64>> =
                sqlx::query_scalar("SELECT metric_group_id FROM vm_items WHERE id = ?")
                    .bind(id)
                    .fetch_optional(self.pool())
                    .await?;
            return Ok(group.flatten());
        }
        if let Some(id) = device_item_id {
            let group: Option<Option<i64>> =
                sqlx::query_scalar("SELECT metric_group_id FROM device_items WHERE id = ?")
                    .bind(id)
                    .fetch_optional(self.pool())
                    .await?;
            return Ok(group.flatten());
        }
        Ok(None)
    }

    pub async fn list_alerts(&self) -> Result<Vec<DbAlert>, CimsError> {
        let rows = sqlx::query_as::<_, DbAlert>(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts ORDER BY detected_at DESC, id DESC LIMIT ?"
        ))
        .bind(ALERT_LIST_LIMIT)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn get_alert(&self, id: i64) -> Result<DbAlert, CimsError> {
        sqlx::query_as::<_, DbAlert>(&format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| CimsError::not_found("Alert"))
    }

    /// The open/acknowledged/in-progress alert for this rule and target, if any.
    pub async fn find_active_alert(
        &self,
        rule_id: i64,
        device_item_id: Option<i64>,
        vm_id: Option<i64>,
    ) -> Result<Option<DbAlert>, CimsError> {
        let [a, b, c] = AlertStatus::ACTIVE;
        let row = sqlx::query_as::<_, DbAlert>(&format!(
            r#"
            SELECT {ALERT_COLUMNS}
            FROM alerts
            WHERE rule_id = ?
              AND device_item_id IS ?
              AND vm_id IS ?
              AND status IN (?, ?, ?)
            ORDER BY detected_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(rule_id)
        .bind(device_item_id)
        .bind(vm_id)
        .bind(a)
        .bind(b)
        .bind(c)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn refresh_alert(&self, id: i64, latest_value: f64, summary: &str) -> Result<(), CimsError> {
        sqlx::query("UPDATE alerts SET latest_value = ?, summary = ? WHERE id = ?")
            .bind(latest_value)
            .bind(summary)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn create_alert(&self, c: AlertCreate) -> Result<DbAlert, CimsError> {
        let row = sqlx::query_as::<_, DbAlert>(&format!(
            r#"
            INSERT INTO alerts (
                device_item_id, vm_id, rule_id, status, severity, detected_at, latest_value,
                summary, evidence_upload_id
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {ALERT_COLUMNS}
            "#
        ))
        .bind(c.device_item_id)
        .bind(c.vm_id)
        .bind(c.rule_id)
        .bind(AlertStatus::Open)
        .bind(c.severity)
        .bind(Utc::now())
        .bind(c.latest_value)
        .bind(c.summary)
        .bind(c.evidence_upload_id)
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    /// Record a status change on an alert and apply it.
    pub async fn add_alert_update(
        &self,
        alert_id: i64,
        status: AlertStatus,
        note: Option<String>,
        updated_by: i64,
    ) -> Result<DbAlertUpdate, CimsError> {
        let mut tx = self.pool().begin().await?;

        let res = sqlx::query("UPDATE alerts SET status = ? WHERE id = ?")
            .bind(status)
            .bind(alert_id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(CimsError::not_found("Alert"));
        }

        let row = sqlx::query_as::<_, DbAlertUpdate>(
            r#"
            INSERT INTO alert_updates (alert_id, status, note, updated_by, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, alert_id, status, note, updated_by, updated_at
            "#,
        )
        .bind(alert_id)
        .bind(status)
        .bind(note)
        .bind(updated_by)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row)
    }

    pub async fn list_alert_updates(&self, alert_id: i64) -> Result<Vec<DbAlertUpdate>, CimsError> {
        let rows = sqlx::query_as::<_, DbAlertUpdate>(
            r#"
            SELECT id, alert_id, status, note, updated_by, updated_at
            FROM alert_updates
            WHERE alert_id = ?
            ORDER BY updated_at, id
            "#,
        )
        .bind(alert_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn assign_alert(
        &self,
        alert_id: i64,
        team_id: Option<i64>,
        user_id: Option<i64>,
    ) -> Result<(), CimsError> {
        sqlx::query(
            "INSERT INTO alert_assignments (alert_id, team_id, user_id, assigned_at) VALUES (?, ?, ?, ?)",
        )
        .bind(alert_id)
        .bind(team_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| CimsError::from(e).on_foreign_key("Alert, team or user not found"))?;
        Ok(())
    }
}
