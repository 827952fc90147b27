//! Locations, device items and virtual machines.

use chrono::Utc;
use serde::Deserialize;
use sqlx::{Sqlite, Transaction};

use super::Db;
use super::models::{CategoryCount, DbDeviceItem, DbDeviceListItem, DbLocation, DbVm, DeviceItemDetail};
use super::patch::{DeviceItemCreate, LocationCreate, VmCreate};
use crate::error::CimsError;

const LOCATION_COLUMNS: &str =
    "id, name, code, type, address, is_primary, is_active, created_at, updated_at";

const DEVICE_COLUMNS: &str = "id, device_name, hostname, ip_address, serial_number, category, \
     equipment_id, model, version, location_id, username, password, description, rack_position, \
     status, grafana_url, metric_group_id, created_at, updated_at";

const VM_COLUMNS: &str = "id, name, vendor, project, tier, ip_address, hostname, role, os, \
     disk_primary, disk_secondary, memory_gb, host_ip, vcpu, location_id, grafana_url, \
     metric_group_id, created_at, updated_at";

const UNKNOWN_DEVICE_REFERENCE: &str = "Equipment, location or metric group not found";

/// Query-string filters for the device list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceItemFilter {
    pub category: Option<String>,
    pub location_id: Option<i64>,
    pub status: Option<String>,
}

impl Db {
    pub async fn list_active_locations(&self) -> Result<Vec<DbLocation>, CimsError> {
        let rows = sqlx::query_as::<_, DbLocation>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE is_active = 1 ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn find_location(&self, id: i64) -> Result<Option<DbLocation>, CimsError> {
        let row = sqlx::query_as::<_, DbLocation>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn get_location(&self, id: i64) -> Result<DbLocation, CimsError> {
        self.find_location(id)
            .await?
            .ok_or_else(|| CimsError::not_found("Location"))
    }

    pub async fn count_locations(&self) -> Result<i64, CimsError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations")
            .fetch_one(self.pool())
            .await?;
        Ok(n)
    }

    pub async fn create_location(&self, c: LocationCreate) -> Result<DbLocation, CimsError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, DbLocation>(&format!(
            r#"
            INSERT INTO locations (name, code, type, address, is_primary, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {LOCATION_COLUMNS}
            "#
        ))
        .bind(c.name)
        .bind(c.code)
        .bind(c.kind)
        .bind(c.address)
        .bind(c.is_primary)
        .bind(c.is_active)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|e| CimsError::from(e).on_unique("Location code already exists"))?;
        Ok(row)
    }

    pub async fn delete_location(&self, id: i64) -> Result<(), CimsError> {
        let res = sqlx::query("DELETE FROM locations WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(CimsError::not_found("Location"));
        }
        Ok(())
    }

    pub async fn list_device_items(
        &self,
        filter: &DeviceItemFilter,
    ) -> Result<Vec<DbDeviceListItem>, CimsError> {
        let rows = sqlx::query_as::<_, DbDeviceListItem>(
            r#"
            SELECT
                d.id, d.device_name, d.hostname, d.ip_address, d.serial_number, d.category,
                CASE WHEN e.id IS NOT NULL THEN e.vendor || ' ' || e.model ELSE d.model END AS model,
                d.version, d.status,
                l.name AS location_name,
                e.name AS equipment_name,
                d.grafana_url, d.metric_group_id
            FROM device_items d
            LEFT JOIN equipment e ON e.id = d.equipment_id
            LEFT JOIN locations l ON l.id = d.location_id
            WHERE (? IS NULL OR d.category = ?)
              AND (? IS NULL OR d.location_id = ?)
              AND (? IS NULL OR d.status = ?)
            ORDER BY d.id
            "#,
        )
        .bind(&filter.category)
        .bind(&filter.category)
        .bind(filter.location_id)
        .bind(filter.location_id)
        .bind(&filter.status)
        .bind(&filter.status)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn device_categories(&self) -> Result<Vec<CategoryCount>, CimsError> {
        let rows = sqlx::query_as::<_, CategoryCount>(
            "SELECT category, COUNT(*) AS count FROM device_items GROUP BY category ORDER BY category",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn find_device_item(&self, id: i64) -> Result<Option<DbDeviceItem>, CimsError> {
        let row = sqlx::query_as::<_, DbDeviceItem>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM device_items WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn get_device_item_detail(&self, id: i64) -> Result<DeviceItemDetail, CimsError> {
        let item = self
            .find_device_item(id)
            .await?
            .ok_or_else(|| CimsError::not_found("Device item"))?;

        let equipment = match item.equipment_id {
            Some(eid) => self.find_equipment_brief(eid).await?,
            None => None,
        };
        let location = match item.location_id {
            Some(lid) => self.find_location(lid).await?,
            None => None,
        };

        Ok(DeviceItemDetail {
            item,
            equipment,
            location,
        })
    }

    /// First device whose `ip_address` matches exactly.
    pub async fn find_device_by_ip(&self, ip: &str) -> Result<Option<DbDeviceItem>, CimsError> {
        let row = sqlx::query_as::<_, DbDeviceItem>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM device_items WHERE ip_address = ? ORDER BY id LIMIT 1"
        ))
        .bind(ip)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Create one device item after checking its equipment and location exist.
    pub async fn create_device_item(&self, c: DeviceItemCreate) -> Result<i64, CimsError> {
        if let Some(eid) = c.equipment_id {
            if self.find_equipment_brief(eid).await?.is_none() {
                return Err(CimsError::bad_request("Equipment not found"));
            }
        }
        if let Some(lid) = c.location_id {
            if self.find_location(lid).await?.is_none() {
                return Err(CimsError::bad_request("Location not found"));
            }
        }

        let mut tx = self.pool().begin().await?;
        let id = insert_device_item(&mut tx, c)
            .await
            .map_err(|e| e.on_foreign_key(UNKNOWN_DEVICE_REFERENCE))?;
        tx.commit().await?;
        Ok(id)
    }

    /// Create many device items atomically.
    pub async fn create_device_items_bulk(
        &self,
        items: Vec<DeviceItemCreate>,
    ) -> Result<Vec<i64>, CimsError> {
        let mut tx = self.pool().begin().await?;
        let mut ids = Vec::with_capacity(items.len());
        for c in items {
            let id = insert_device_item(&mut tx, c)
                .await
                .map_err(|e| e.on_foreign_key(UNKNOWN_DEVICE_REFERENCE))?;
            ids.push(id);
        }
        tx.commit().await?;
        Ok(ids)
    }

    pub async fn delete_device_item(&self, id: i64) -> Result<(), CimsError> {
        let res = sqlx::query("DELETE FROM device_items WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(CimsError::not_found("Device item"));
        }
        Ok(())
    }

    pub async fn list_vms(&self) -> Result<Vec<DbVm>, CimsError> {
        let rows = sqlx::query_as::<_, DbVm>(&format!("SELECT {VM_COLUMNS} FROM vm_items ORDER BY id"))
            .fetch_all(self.pool())
            .await?;
        Ok(rows)
    }

    pub async fn find_vm(&self, id: i64) -> Result<Option<DbVm>, CimsError> {
        let row = sqlx::query_as::<_, DbVm>(&format!("SELECT {VM_COLUMNS} FROM vm_items WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row)
    }

    pub async fn get_vm(&self, id: i64) -> Result<DbVm, CimsError> {
        self.find_vm(id).await?.ok_or_else(|| CimsError::not_found("VM"))
    }

    /// First VM whose `ip_address` matches exactly.
    pub async fn find_vm_by_ip(&self, ip: &str) -> Result<Option<DbVm>, CimsError> {
        let row = sqlx::query_as::<_, DbVm>(&format!(
            "SELECT {VM_COLUMNS} FROM vm_items WHERE ip_address = ? ORDER BY id LIMIT 1"
        ))
        .bind(ip)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn create_vm(&self, c: VmCreate) -> Result<DbVm, CimsError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, DbVm>(&format!(
            r#"
            INSERT INTO vm_items (
                name, vendor, project, tier, ip_address, hostname, role, os, disk_primary,
                disk_secondary, memory_gb, host_ip, vcpu, location_id, grafana_url, metric_group_id,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {VM_COLUMNS}
            "#
        ))
        .bind(c.name)
        .bind(c.vendor)
        .bind(c.project)
        .bind(c.tier)
        .bind(c.ip_address)
        .bind(c.hostname)
        .bind(c.role)
        .bind(c.os)
        .bind(c.disk_primary)
        .bind(c.disk_secondary)
        .bind(c.memory_gb)
        .bind(c.host_ip)
        .bind(c.vcpu)
        .bind(c.location_id)
        .bind(c.grafana_url)
        .bind(c.metric_group_id)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(|e| CimsError::from(e).on_foreign_key("Location or metric group not found"))?;
        Ok(row)
    }

    pub async fn delete_vm(&self, id: i64) -> Result<(), CimsError> {
        let res = sqlx::query("DELETE FROM vm_items WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        if res.rows_affected() == 0 {
            return Err(CimsError::not_found("VM"));
        }
        Ok(())
    }
}

async fn insert_device_item(
    tx: &mut Transaction<'_, Sqlite>,
    c: DeviceItemCreate,
) -> Result<i64, CimsError> {
    let now = Utc::now();
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO device_items (
            device_name, hostname, ip_address, serial_number, category, equipment_id, model,
            version, location_id, username, password, description, rack_position, status,
            grafana_url, metric_group_id, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(c.device_name)
    .bind(c.hostname)
    .bind(c.ip_address)
    .bind(c.serial_number)
    .bind(c.category)
    .bind(c.equipment_id)
    .bind(c.model)
    .bind(c.version)
    .bind(c.location_id)
    .bind(c.username)
    .bind(c.password)
    .bind(c.description)
    .bind(c.rack_position)
    .bind(c.status)
    .bind(c.grafana_url)
    .bind(c.metric_group_id)
    .bind(now)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;
    Ok(id)
}
