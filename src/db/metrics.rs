use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;

use super::Db;
use super::models::{DbMetricDefinition, DbMetricGroup, DbMetricSample, MetricGroupView};
use super::patch::{MetricDefinitionCreate, MetricGroupUpsert, MetricSampleCreate};
use crate::error::CimsError;

const SAMPLE_COLUMNS: &str =
    "id, device_item_id, vm_id, captured_at, metric_key, value, unit, source_upload_id, confidence";

/// Newest-first cap for the sample list.
const SAMPLE_LIST_LIMIT: i64 = 500;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SampleFilter {
    pub device_item_id: Option<i64>,
    pub vm_id: Option<i64>,
    pub metric_key: Option<String>,
}

impl Db {
    pub async fn list_metric_definitions(&self) -> Result<Vec<DbMetricDefinition>, CimsError> {
        let rows = sqlx::query_as::<_, DbMetricDefinition>(
            "SELECT id, key, display_name, default_unit, description FROM metric_definitions ORDER BY key",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn create_metric_definition(
        &self,
        c: MetricDefinitionCreate,
    ) -> Result<DbMetricDefinition, CimsError> {
        let row = sqlx::query_as::<_, DbMetricDefinition>(
            r#"
            INSERT INTO metric_definitions (key, display_name, default_unit, description)
            VALUES (?, ?, ?, ?)
            RETURNING id, key, display_name, default_unit, description
            "#,
        )
        .bind(c.key.trim())
        .bind(c.display_name)
        .bind(c.default_unit)
        .bind(c.description)
        .fetch_one(self.pool())
        .await
        .map_err(|e| CimsError::from(e).on_unique("Metric key already exists"))?;
        Ok(row)
    }

    pub async fn list_metric_groups(&self) -> Result<Vec<MetricGroupView>, CimsError> {
        let groups = sqlx::query_as::<_, DbMetricGroup>(
            "SELECT id, name, description, created_at FROM metric_groups ORDER BY name",
        )
        .fetch_all(self.pool())
        .await?;

        let members: Vec<(i64, String)> = sqlx::query_as(
            "SELECT group_id, metric_key FROM metric_group_members ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;

        let mut by_group: HashMap<i64, Vec<String>> = HashMap::new();
        for (group_id, key) in members {
            by_group.entry(group_id).or_default().push(key);
        }

        Ok(groups
            .into_iter()
            .map(|group| MetricGroupView {
                members: by_group.remove(&group.id).unwrap_or_default(),
                group,
            })
            .collect())
    }

    pub async fn get_metric_group(&self, id: i64) -> Result<MetricGroupView, CimsError> {
        let group = sqlx::query_as::<_, DbMetricGroup>(
            "SELECT id, name, description, created_at FROM metric_groups WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CimsError::not_found("Group"))?;

        let members: Vec<String> = sqlx::query_scalar(
            "SELECT metric_key FROM metric_group_members WHERE group_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await?;

        Ok(MetricGroupView { group, members })
    }

    pub async fn create_metric_group(&self, c: MetricGroupUpsert) -> Result<MetricGroupView, CimsError> {
        let group = sqlx::query_as::<_, DbMetricGroup>(
            r#"
            INSERT INTO metric_groups (name, description, created_at)
            VALUES (?, ?, ?)
            RETURNING id, name, description, created_at
            "#,
        )
        .bind(c.name)
        .bind(c.description)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await
        .map_err(|e| CimsError::from(e).on_unique("Group already exists"))?;

        Ok(MetricGroupView {
            group,
            members: Vec::new(),
        })
    }

    /// Replace a group's name and description.
    pub async fn update_metric_group(
        &self,
        id: i64,
        c: MetricGroupUpsert,
    ) -> Result<MetricGroupView, CimsError> {
        let res = sqlx::query("UPDATE metric_groups SET name = ?, description = ? WHERE id = ?")
            .bind(c.name)
            .bind(c.description)
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(|e| CimsError::from(e).on_unique("Group already exists"))?;
        if res.rows_affected() == 0 {
            return Err(CimsError::not_found("Group"));
        }
        self.get_metric_group(id).await
    }

    /// Delete a group. Devices, VMs and rules that referenced it are detached
    /// (`ON DELETE SET NULL`); its member keys are removed.
    pub async fn delete_metric_group(&self, id: i64) -> Result<(), CimsError> {
        let res = sqlx::query("DELETE FROM metric_groups WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(CimsError::not_found("Group"));
        }
        Ok(())
    }

    pub async fn add_metric_group_member(&self, group_id: i64, metric_key: &str) -> Result<(), CimsError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM metric_groups WHERE id = ?)")
            .bind(group_id)
            .fetch_one(self.pool())
            .await?;
        if !exists {
            return Err(CimsError::not_found("Group"));
        }

        sqlx::query("INSERT INTO metric_group_members (group_id, metric_key) VALUES (?, ?)")
            .bind(group_id)
            .bind(metric_key.trim())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn insert_metric_sample(&self, c: MetricSampleCreate) -> Result<DbMetricSample, CimsError> {
        let row = sqlx::query_as::<_, DbMetricSample>(&format!(
            r#"
            INSERT INTO metric_samples (
                device_item_id, vm_id, captured_at, metric_key, value, unit, source_upload_id, confidence
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {SAMPLE_COLUMNS}
            "#
        ))
        .bind(c.device_item_id)
        .bind(c.vm_id)
        .bind(c.captured_at)
        .bind(c.metric_key)
        .bind(c.value)
        .bind(c.unit)
        .bind(c.source_upload_id)
        .bind(c.confidence)
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn list_metric_samples(&self, filter: &SampleFilter) -> Result<Vec<DbMetricSample>, CimsError> {
        let rows = sqlx::query_as::<_, DbMetricSample>(&format!(
            r#"
            SELECT {SAMPLE_COLUMNS}
            FROM metric_samples
            WHERE (? IS NULL OR device_item_id = ?)
              AND (? IS NULL OR vm_id = ?)
              AND (? IS NULL OR metric_key = ?)
            ORDER BY captured_at DESC, id DESC
            LIMIT ?
            "#
        ))
        .bind(filter.device_item_id)
        .bind(filter.device_item_id)
        .bind(filter.vm_id)
        .bind(filter.vm_id)
        .bind(&filter.metric_key)
        .bind(&filter.metric_key)
        .bind(SAMPLE_LIST_LIMIT)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}
