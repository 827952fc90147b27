use chrono::{DateTime, Utc};
use cims_schema::{ExtractedMetric, LinkItem};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, types::Json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub profile_photo: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub profile_photo: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for UserView {
    fn from(u: DbUser) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            role: u.role,
            is_active: u.is_active,
            profile_photo: u.profile_photo,
            last_login_at: u.last_login_at,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbTeam {
    pub id: i64,
    pub name: String,
    pub email_alias: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbLocation {
    pub id: i64,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub address: Option<String>,
    pub is_primary: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbEquipment {
    pub id: i64,
    pub name: String,
    pub area: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub vendor: String,
    pub model: String,
    pub serial_number: Option<String>,
    pub license_details: Option<String>,
    pub quantity: String,
    pub sop_status: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub license_applicable: String,
    pub account_type: String,
    pub security_level: String,
    pub web_support: Option<String>,
    pub username: Option<String>,
    pub credentials: Option<String>,
    pub otp_required: Option<String>,
    pub contact_person_otp: Option<String>,
    pub validity: Option<String>,
    pub contact_info: Option<String>,
    pub contact_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row of the equipment list, with attachment counters.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbEquipmentListItem {
    pub id: i64,
    pub name: String,
    pub area: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub vendor: String,
    pub model: String,
    pub quantity: String,
    pub sop_status: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub account_type: String,
    pub security_level: String,
    pub doc_count: i64,
    pub video_count: i64,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbManual {
    pub id: i64,
    pub equipment_id: i64,
    pub summary: String,
    pub monitoring: Json<Vec<String>>,
    pub maintenance: Json<Vec<String>>,
    pub troubleshooting: Json<Vec<String>>,
    pub links: Option<Json<Vec<LinkItem>>>,
    pub illustration_prompt: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbAttachment {
    pub id: i64,
    pub equipment_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub url: String,
    pub thumbnail: Option<String>,
    #[serde(rename = "metadata")]
    #[sqlx(rename = "file_metadata")]
    pub metadata: Option<Json<Value>>,
    pub upload_date: DateTime<Utc>,
    pub document_category: String,
    pub is_published: bool,
}

/// Full equipment record with its manual and attachments.
#[derive(Debug, Clone, Serialize)]
pub struct EquipmentDetail {
    #[serde(flatten)]
    pub equipment: DbEquipment,
    pub manual: Option<DbManual>,
    pub attachments: Vec<DbAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbDeviceItem {
    pub id: i64,
    pub device_name: String,
    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub serial_number: Option<String>,
    pub category: String,
    pub equipment_id: Option<i64>,
    pub model: Option<String>,
    pub version: Option<String>,
    pub location_id: Option<i64>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub description: Option<String>,
    pub rack_position: Option<String>,
    pub status: String,
    pub grafana_url: Option<String>,
    pub metric_group_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbDeviceListItem {
    pub id: i64,
    pub device_name: String,
    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub serial_number: Option<String>,
    pub category: String,
    /// "vendor model" of the linked equipment, else the free-text model.
    pub model: Option<String>,
    pub version: Option<String>,
    pub status: String,
    pub location_name: Option<String>,
    pub equipment_name: Option<String>,
    pub grafana_url: Option<String>,
    pub metric_group_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EquipmentBrief {
    pub id: i64,
    pub name: String,
    pub vendor: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceItemDetail {
    #[serde(flatten)]
    pub item: DbDeviceItem,
    pub equipment: Option<EquipmentBrief>,
    pub location: Option<DbLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbVm {
    pub id: i64,
    pub name: String,
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
    pub location_id: Option<i64>,
    pub grafana_url: Option<String>,
    pub metric_group_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbMetricDefinition {
    pub id: i64,
    pub key: String,
    pub display_name: String,
    pub default_unit: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbMetricGroup {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricGroupView {
    #[serde(flatten)]
    pub group: DbMetricGroup,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbMetricSample {
    pub id: i64,
    pub device_item_id: Option<i64>,
    pub vm_id: Option<i64>,
    pub captured_at: DateTime<Utc>,
    pub metric_key: String,
    pub value: f64,
    pub unit: Option<String>,
    pub source_upload_id: Option<i64>,
    pub confidence: Option<f64>,
}

/// Lifecycle of a monitoring upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ParseStatus {
    /// Stored, parse not finished yet.
    Pending,
    /// Parse succeeded; awaiting human review.
    Ready,
    /// Parse failed.
    Error,
    /// Reviewed and confirmed; samples persisted.
    Ok,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbMonitoringUpload {
    pub id: i64,
    pub device_item_id: Option<i64>,
    pub vm_id: Option<i64>,
    pub location_id: Option<i64>,
    pub file_path: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub uploaded_by_user_id: Option<i64>,
    pub capture_time: Option<DateTime<Utc>>,
    pub dashboard_label: Option<String>,
    pub raw_text: Option<String>,
    pub extracted_metrics: Option<Json<Vec<ExtractedMetric>>>,
    pub parse_status: ParseStatus,
    pub parse_confidence: Option<f64>,
    pub parse_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Ack,
    InProgress,
    Resolved,
    Closed,
}

impl AlertStatus {
    /// Statuses under which a new breach updates the existing alert instead of opening one.
    pub const ACTIVE: [AlertStatus; 3] = [AlertStatus::Open, AlertStatus::Ack, AlertStatus::InProgress];

    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Open => "open",
            AlertStatus::Ack => "ack",
            AlertStatus::InProgress => "in_progress",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbAlertRule {
    pub id: i64,
    pub name: String,
    pub group_id: Option<i64>,
    pub metric_key: String,
    pub operator: String,
    pub threshold: f64,
    pub duration_minutes: i64,
    pub severity: String,
    pub message_template: Option<String>,
    pub team_id: Option<i64>,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbAlert {
    pub id: i64,
    pub device_item_id: Option<i64>,
    pub vm_id: Option<i64>,
    pub rule_id: Option<i64>,
    pub status: AlertStatus,
    pub severity: String,
    pub detected_at: DateTime<Utc>,
    pub latest_value: Option<f64>,
    pub summary: Option<String>,
    pub evidence_upload_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbAlertUpdate {
    pub id: i64,
    pub alert_id: i64,
    pub status: AlertStatus,
    pub note: Option<String>,
    pub updated_by: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbLlmKey {
    pub id: i64,
    pub provider: String,
    pub label: Option<String>,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbChatMessage {
    pub id: i64,
    pub user_id: i64,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}
