//! Create payloads, partial-update payloads, and the patch envelope applied by `Db::patch`.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::SqlitePool;

use crate::error::CimsError;

/// A partial update that knows how to write itself.
///
/// `None` fields leave the stored column unchanged. Nullable links use
/// `Option<Option<_>>` so `Some(None)` can unlink them.
#[async_trait]
pub trait DbPatchable {
    async fn apply_patch(&self, pool: &SqlitePool) -> Result<(), CimsError>;
}

/// Keeps an explicit `null` apart from an absent field: absent stays `None`,
/// `null` becomes `Some(None)` and clears the column.
fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

fn default_quantity() -> String {
    "1".to_string()
}

fn default_sop_status() -> String {
    "Pending".to_string()
}

fn default_license_applicable() -> String {
    "No".to_string()
}

fn default_account_type() -> String {
    "AUTO".to_string()
}

fn default_security_level() -> String {
    "LOW".to_string()
}

fn default_location_type() -> String {
    "DC".to_string()
}

fn default_device_status() -> String {
    "Active".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentCreate {
    pub name: String,
    pub area: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub vendor: String,
    pub model: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub license_details: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: String,
    #[serde(default = "default_sop_status")]
    pub sop_status: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_license_applicable")]
    pub license_applicable: String,
    #[serde(default = "default_account_type")]
    pub account_type: String,
    #[serde(default = "default_security_level")]
    pub security_level: String,
    #[serde(default)]
    pub web_support: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub otp_required: Option<String>,
    #[serde(default)]
    pub contact_person_otp: Option<String>,
    #[serde(default)]
    pub validity: Option<String>,
    #[serde(default)]
    pub contact_info: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipmentPatch {
    pub name: Option<String>,
    pub area: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub license_details: Option<String>,
    pub quantity: Option<String>,
    pub sop_status: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub license_applicable: Option<String>,
    pub account_type: Option<String>,
    pub security_level: Option<String>,
    pub web_support: Option<String>,
    pub username: Option<String>,
    pub credentials: Option<String>,
    pub otp_required: Option<String>,
    pub contact_person_otp: Option<String>,
    pub validity: Option<String>,
    pub contact_info: Option<String>,
    pub contact_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationCreate {
    pub name: String,
    pub code: String,
    #[serde(rename = "type", default = "default_location_type")]
    pub kind: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationPatch {
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub address: Option<String>,
    pub is_primary: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceItemCreate {
    pub device_name: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    pub category: String,
    #[serde(default)]
    pub equipment_id: Option<i64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rack_position: Option<String>,
    #[serde(default = "default_device_status")]
    pub status: String,
    #[serde(default)]
    pub grafana_url: Option<String>,
    #[serde(default)]
    pub metric_group_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceItemPatch {
    pub device_name: Option<String>,
    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub serial_number: Option<String>,
    pub category: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub equipment_id: Option<Option<i64>>,
    pub model: Option<String>,
    pub version: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub location_id: Option<Option<i64>>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub description: Option<String>,
    pub rack_position: Option<String>,
    pub status: Option<String>,
    pub grafana_url: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub metric_group_id: Option<Option<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmCreate {
    pub name: String,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub disk_primary: Option<String>,
    #[serde(default)]
    pub disk_secondary: Option<String>,
    #[serde(default)]
    pub memory_gb: Option<String>,
    #[serde(default)]
    pub host_ip: Option<String>,
    #[serde(default)]
    pub vcpu: Option<String>,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub grafana_url: Option<String>,
    #[serde(default)]
    pub metric_group_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VmPatch {
    pub name: Option<String>,
    pub vendor: Option<String>,
    pub project: Option<String>,
    pub tier: Option<String>,
    pub ip_address: Option<String>,
    pub hostname: Option<String>,
    pub role: Option<String>,
    pub os: Option<String>,
    pub disk_primary: Option<String>,
    pub disk_secondary: Option<String>,
    pub memory_gb: Option<String>,
    pub host_ip: Option<String>,
    pub vcpu: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub location_id: Option<Option<i64>>,
    pub grafana_url: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub metric_group_id: Option<Option<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum ResourcePatch {
    Equipment { id: i64, patch: EquipmentPatch },
    Location { id: i64, patch: LocationPatch },
    DeviceItem { id: i64, patch: DeviceItemPatch },
    Vm { id: i64, patch: VmPatch },
}

/// Manual body as submitted by an admin or produced by the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualUpsert {
    pub summary: String,
    pub monitoring: Vec<String>,
    pub maintenance: Vec<String>,
    pub troubleshooting: Vec<String>,
    #[serde(default)]
    pub links: Option<Vec<cims_schema::LinkItem>>,
    #[serde(default)]
    pub illustration_prompt: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl From<cims_schema::ManualDraft> for ManualUpsert {
    fn from(d: cims_schema::ManualDraft) -> Self {
        Self {
            summary: d.summary,
            monitoring: d.monitoring,
            maintenance: d.maintenance,
            troubleshooting: d.troubleshooting,
            links: Some(d.links),
            illustration_prompt: d.illustration_prompt,
            image_url: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AttachmentCreate {
    pub equipment_id: i64,
    pub name: String,
    pub kind: String,
    pub url: String,
    pub metadata: Option<serde_json::Value>,
    pub document_category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDefinitionCreate {
    pub key: String,
    pub display_name: String,
    #[serde(default)]
    pub default_unit: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricGroupUpsert {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MetricSampleCreate {
    pub device_item_id: Option<i64>,
    pub vm_id: Option<i64>,
    pub captured_at: chrono::DateTime<chrono::Utc>,
    pub metric_key: String,
    pub value: f64,
    pub unit: Option<String>,
    pub source_upload_id: Option<i64>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct MonitoringUploadCreate {
    pub device_item_id: Option<i64>,
    pub vm_id: Option<i64>,
    pub location_id: Option<i64>,
    pub file_path: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub uploaded_by_user_id: Option<i64>,
    pub capture_time: Option<chrono::DateTime<chrono::Utc>>,
    pub dashboard_label: Option<String>,
}

fn default_operator() -> String {
    ">".to_string()
}

fn default_severity() -> String {
    "warning".to_string()
}

/// Alert rule body; `PUT` replaces every field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRuleUpsert {
    pub name: String,
    #[serde(default)]
    pub group_id: Option<i64>,
    pub metric_key: String,
    #[serde(default = "default_operator")]
    pub operator: String,
    pub threshold: f64,
    #[serde(default)]
    pub duration_minutes: i64,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default)]
    pub message_template: Option<String>,
    #[serde(default)]
    pub team_id: Option<i64>,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamCreate {
    pub name: String,
    #[serde(default)]
    pub email_alias: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserCreate {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: super::models::UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equipment_create_fills_defaults() {
        let c: EquipmentCreate = serde_json::from_value(json!({
            "name": "Core Switch",
            "area": "Network",
            "type": "Switch",
            "vendor": "Cisco",
            "model": "C9300"
        }))
        .unwrap();
        assert_eq!(c.quantity, "1");
        assert_eq!(c.sop_status, "Pending");
        assert_eq!(c.license_applicable, "No");
        assert_eq!(c.account_type, "AUTO");
        assert_eq!(c.security_level, "LOW");
    }

    #[test]
    fn empty_patch_is_valid() {
        let p: DeviceItemPatch = serde_json::from_value(json!({})).unwrap();
        assert!(p.device_name.is_none());
        let p: EquipmentPatch = serde_json::from_value(json!({"type": "Router"})).unwrap();
        assert_eq!(p.kind.as_deref(), Some("Router"));
    }

    #[test]
    fn null_link_differs_from_absent_link() {
        let p: VmPatch = serde_json::from_value(json!({"location_id": null, "metric_group_id": 3})).unwrap();
        assert_eq!(p.location_id, Some(None));
        assert_eq!(p.metric_group_id, Some(Some(3)));
        let p: DeviceItemPatch = serde_json::from_value(json!({"device_name": "sw-02"})).unwrap();
        assert_eq!(p.equipment_id, None);
        assert_eq!(p.location_id, None);
    }
}
