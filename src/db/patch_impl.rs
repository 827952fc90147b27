//! ResourcePatch -> DbPatchable implementation.
//!
//! This sits in the `db` module because it contains SQL/table knowledge.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::patch::{
    DbPatchable, DeviceItemPatch, EquipmentPatch, LocationPatch, ResourcePatch, VmPatch,
};
use crate::error::CimsError;

#[async_trait]
impl DbPatchable for ResourcePatch {
    async fn apply_patch(&self, pool: &SqlitePool) -> Result<(), CimsError> {
        let updated_at = Utc::now();

        let (table, entity, id, affected) = match self {
            ResourcePatch::Equipment { id, patch } => {
                let EquipmentPatch {
                    name,
                    area,
                    kind,
                    vendor,
                    model,
                    serial_number,
                    license_details,
                    quantity,
                    sop_status,
                    email,
                    phone,
                    license_applicable,
                    account_type,
                    security_level,
                    web_support,
                    username,
                    credentials,
                    otp_required,
                    contact_person_otp,
                    validity,
                    contact_info,
                    contact_number,
                } = patch;

                let res = sqlx::query(
                    r#"
                    UPDATE equipment
                    SET
                        name = COALESCE(?, name),
                        area = COALESCE(?, area),
                        type = COALESCE(?, type),
                        vendor = COALESCE(?, vendor),
                        model = COALESCE(?, model),
                        serial_number = COALESCE(?, serial_number),
                        license_details = COALESCE(?, license_details),
                        quantity = COALESCE(?, quantity),
                        sop_status = COALESCE(?, sop_status),
                        email = COALESCE(?, email),
                        phone = COALESCE(?, phone),
                        license_applicable = COALESCE(?, license_applicable),
                        account_type = COALESCE(?, account_type),
                        security_level = COALESCE(?, security_level),
                        web_support = COALESCE(?, web_support),
                        username = COALESCE(?, username),
                        credentials = COALESCE(?, credentials),
                        otp_required = COALESCE(?, otp_required),
                        contact_person_otp = COALESCE(?, contact_person_otp),
                        validity = COALESCE(?, validity),
                        contact_info = COALESCE(?, contact_info),
                        contact_number = COALESCE(?, contact_number),
                        updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(name)
                .bind(area)
                .bind(kind)
                .bind(vendor)
                .bind(model)
                .bind(serial_number)
                .bind(license_details)
                .bind(quantity)
                .bind(sop_status)
                .bind(email)
                .bind(phone)
                .bind(license_applicable)
                .bind(account_type)
                .bind(security_level)
                .bind(web_support)
                .bind(username)
                .bind(credentials)
                .bind(otp_required)
                .bind(contact_person_otp)
                .bind(validity)
                .bind(contact_info)
                .bind(contact_number)
                .bind(updated_at)
                .bind(id)
                .execute(pool)
                .await?;

                ("equipment", "Equipment", *id, res.rows_affected())
            }

            ResourcePatch::Location { id, patch } => {
                let LocationPatch {
                    name,
                    code,
                    kind,
                    address,
                    is_primary,
                    is_active,
                } = patch;

                let res = sqlx::query(
                    r#"
                    UPDATE locations
                    SET
                        name = COALESCE(?, name),
                        code = COALESCE(?, code),
                        type = COALESCE(?, type),
                        address = COALESCE(?, address),
                        is_primary = COALESCE(?, is_primary),
                        is_active = COALESCE(?, is_active),
                        updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(name)
                .bind(code)
                .bind(kind)
                .bind(address)
                .bind(is_primary)
                .bind(is_active)
                .bind(updated_at)
                .bind(id)
                .execute(pool)
                .await?;

                ("locations", "Location", *id, res.rows_affected())
            }

            ResourcePatch::DeviceItem { id, patch } => {
                let DeviceItemPatch {
                    device_name,
                    hostname,
                    ip_address,
                    serial_number,
                    category,
                    equipment_id,
                    model,
                    version,
                    location_id,
                    username,
                    password,
                    description,
                    rack_position,
                    status,
                    grafana_url,
                    metric_group_id,
                } = patch;

                let res = sqlx::query(
                    r#"
                    UPDATE device_items
                    SET
                        device_name = COALESCE(?, device_name),
                        hostname = COALESCE(?, hostname),
                        ip_address = COALESCE(?, ip_address),
                        serial_number = COALESCE(?, serial_number),
                        category = COALESCE(?, category),
                        equipment_id = CASE WHEN ? THEN ? ELSE equipment_id END,
                        model = COALESCE(?, model),
                        version = COALESCE(?, version),
                        location_id = CASE WHEN ? THEN ? ELSE location_id END,
                        username = COALESCE(?, username),
                        password = COALESCE(?, password),
                        description = COALESCE(?, description),
                        rack_position = COALESCE(?, rack_position),
                        status = COALESCE(?, status),
                        grafana_url = COALESCE(?, grafana_url),
                        metric_group_id = CASE WHEN ? THEN ? ELSE metric_group_id END,
                        updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(device_name)
                .bind(hostname)
                .bind(ip_address)
                .bind(serial_number)
                .bind(category)
                .bind(equipment_id.is_some())
                .bind(equipment_id.flatten())
                .bind(model)
                .bind(version)
                .bind(location_id.is_some())
                .bind(location_id.flatten())
                .bind(username)
                .bind(password)
                .bind(description)
                .bind(rack_position)
                .bind(status)
                .bind(grafana_url)
                .bind(metric_group_id.is_some())
                .bind(metric_group_id.flatten())
                .bind(updated_at)
                .bind(id)
                .execute(pool)
                .await?;

                ("device_items", "Device item", *id, res.rows_affected())
            }

            ResourcePatch::Vm { id, patch } => {
                let VmPatch {
                    name,
                    vendor,
                    project,
                    tier,
                    ip_address,
                    hostname,
                    role,
                    os,
                    disk_primary,
                    disk_secondary,
                    memory_gb,
                    host_ip,
                    vcpu,
                    location_id,
                    grafana_url,
                    metric_group_id,
                } = patch;

                let res = sqlx::query(
                    r#"
                    UPDATE vm_items
                    SET
                        name = COALESCE(?, name),
                        vendor = COALESCE(?, vendor),
                        project = COALESCE(?, project),
                        tier = COALESCE(?, tier),
                        ip_address = COALESCE(?, ip_address),
                        hostname = COALESCE(?, hostname),
                        role = COALESCE(?, role),
                        os = COALESCE(?, os),
                        disk_primary = COALESCE(?, disk_primary),
                        disk_secondary = COALESCE(?, disk_secondary),
                        memory_gb = COALESCE(?, memory_gb),
                        host_ip = COALESCE(?, host_ip),
                        vcpu = COALESCE(?, vcpu),
                        location_id = CASE WHEN ? THEN ? ELSE location_id END,
                        grafana_url = COALESCE(?, grafana_url),
                        metric_group_id = CASE WHEN ? THEN ? ELSE metric_group_id END,
                        updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(name)
                .bind(vendor)
                .bind(project)
                .bind(tier)
                .bind(ip_address)
                .bind(hostname)
                .bind(role)
                .bind(os)
                .bind(disk_primary)
                .bind(disk_secondary)
                .bind(memory_gb)
                .bind(host_ip)
                .bind(vcpu)
                .bind(location_id.is_some())
                .bind(location_id.flatten())
                .bind(grafana_url)
                .bind(metric_group_id.is_some())
                .bind(metric_group_id.flatten())
                .bind(updated_at)
                .bind(id)
                .execute(pool)
                .await?;

                ("vm_items", "VM", *id, res.rows_affected())
            }
        };

        debug!(
            table,
            id,
            affected,
            updated_at = %updated_at,
            "db patch applied"
        );

        if affected == 0 {
            return Err(CimsError::not_found(entity));
        }

        Ok(())
    }
}
