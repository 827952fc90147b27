//! SQL DDL for initializing the database schema.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema. Statements are applied one by one at connect time and must
/// stay idempotent.
pub const SQLITE_INIT: &str = r#"
-- ---------------------------------------------------------------------------
-- Accounts
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    name TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'user',
    is_active INTEGER NOT NULL DEFAULT 1,
    profile_photo TEXT NULL,
    last_login_at TEXT NULL, -- RFC3339
    created_at TEXT NOT NULL -- RFC3339
);

CREATE TABLE IF NOT EXISTS teams (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    email_alias TEXT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_teams (
    id INTEGER PRIMARY KEY NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
    UNIQUE(user_id, team_id)
);

-- ---------------------------------------------------------------------------
-- Sites and catalogue
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS locations (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    code TEXT NOT NULL UNIQUE,
    type TEXT NOT NULL DEFAULT 'DC',
    address TEXT NULL,
    is_primary INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS equipment (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    area TEXT NOT NULL,
    type TEXT NOT NULL,
    vendor TEXT NOT NULL,
    model TEXT NOT NULL,
    serial_number TEXT NULL,
    license_details TEXT NULL,
    quantity TEXT NOT NULL DEFAULT '1',
    sop_status TEXT NOT NULL DEFAULT 'Pending',
    email TEXT NULL,
    phone TEXT NULL,
    license_applicable TEXT NOT NULL DEFAULT 'No',
    account_type TEXT NOT NULL DEFAULT 'AUTO',
    security_level TEXT NOT NULL DEFAULT 'LOW',
    web_support TEXT NULL,
    username TEXT NULL,
    credentials TEXT NULL,
    otp_required TEXT NULL,
    contact_person_otp TEXT NULL,
    validity TEXT NULL,
    contact_info TEXT NULL,
    contact_number TEXT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS manual_contents (
    id INTEGER PRIMARY KEY NOT NULL,
    equipment_id INTEGER NOT NULL UNIQUE REFERENCES equipment(id) ON DELETE CASCADE,
    summary TEXT NOT NULL,
    monitoring TEXT NOT NULL, -- JSON array of strings
    maintenance TEXT NOT NULL, -- JSON array of strings
    troubleshooting TEXT NOT NULL, -- JSON array of strings
    links TEXT NULL, -- JSON array of {title, uri}
    illustration_prompt TEXT NULL,
    image_url TEXT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS attachments (
    id INTEGER PRIMARY KEY NOT NULL,
    equipment_id INTEGER NOT NULL REFERENCES equipment(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    type TEXT NOT NULL, -- pdf | docx | web | video | youtube
    url TEXT NOT NULL, -- local file path or external URL
    thumbnail TEXT NULL,
    file_metadata TEXT NULL, -- JSON object
    upload_date TEXT NOT NULL,
    document_category TEXT NOT NULL DEFAULT 'implementation',
    is_published INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_attachments_equipment ON attachments(equipment_id);

-- ---------------------------------------------------------------------------
-- Metric catalogue
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS metric_definitions (
    id INTEGER PRIMARY KEY NOT NULL,
    key TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    default_unit TEXT NULL,
    description TEXT NULL
);

CREATE TABLE IF NOT EXISTS metric_groups (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    description TEXT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS metric_group_members (
    id INTEGER PRIMARY KEY NOT NULL,
    group_id INTEGER NOT NULL REFERENCES metric_groups(id) ON DELETE CASCADE,
    metric_key TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_metric_group_members_group ON metric_group_members(group_id);

-- ---------------------------------------------------------------------------
-- Inventory
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS device_items (
    id INTEGER PRIMARY KEY NOT NULL,
    device_name TEXT NOT NULL,
    hostname TEXT NULL,
    ip_address TEXT NULL,
    serial_number TEXT NULL,
    category TEXT NOT NULL,
    equipment_id INTEGER NULL REFERENCES equipment(id) ON DELETE SET NULL,
    model TEXT NULL,
    version TEXT NULL,
    location_id INTEGER NULL REFERENCES locations(id) ON DELETE SET NULL,
    username TEXT NULL,
    password TEXT NULL,
    description TEXT NULL,
    rack_position TEXT NULL,
    status TEXT NOT NULL DEFAULT 'Active',
    grafana_url TEXT NULL,
    metric_group_id INTEGER NULL REFERENCES metric_groups(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_device_items_category ON device_items(category);
CREATE INDEX IF NOT EXISTS idx_device_items_ip ON device_items(ip_address);

CREATE TABLE IF NOT EXISTS vm_items (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    vendor TEXT NULL,
    project TEXT NULL,
    tier TEXT NULL,
    ip_address TEXT NULL,
    hostname TEXT NULL,
    role TEXT NULL,
    os TEXT NULL,
    disk_primary TEXT NULL,
    disk_secondary TEXT NULL,
    memory_gb TEXT NULL,
    host_ip TEXT NULL,
    vcpu TEXT NULL,
    location_id INTEGER NULL REFERENCES locations(id) ON DELETE SET NULL,
    grafana_url TEXT NULL,
    metric_group_id INTEGER NULL REFERENCES metric_groups(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vm_items_ip ON vm_items(ip_address);

-- ---------------------------------------------------------------------------
-- Monitoring ingestion
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS monitoring_uploads (
    id INTEGER PRIMARY KEY NOT NULL,
    device_item_id INTEGER NULL REFERENCES device_items(id) ON DELETE SET NULL,
    vm_id INTEGER NULL REFERENCES vm_items(id) ON DELETE SET NULL,
    location_id INTEGER NULL REFERENCES locations(id) ON DELETE SET NULL,
    file_path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    mime_type TEXT NULL,
    uploaded_by_user_id INTEGER NULL REFERENCES users(id) ON DELETE SET NULL,
    capture_time TEXT NULL,
    dashboard_label TEXT NULL,
    raw_text TEXT NULL,
    extracted_metrics TEXT NULL, -- JSON array
    parse_status TEXT NOT NULL DEFAULT 'pending', -- pending | ready | error | ok
    parse_confidence REAL NULL,
    parse_error TEXT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_monitoring_uploads_created ON monitoring_uploads(created_at);

CREATE TABLE IF NOT EXISTS metric_samples (
    id INTEGER PRIMARY KEY NOT NULL,
    device_item_id INTEGER NULL REFERENCES device_items(id) ON DELETE CASCADE,
    vm_id INTEGER NULL REFERENCES vm_items(id) ON DELETE CASCADE,
    captured_at TEXT NOT NULL,
    metric_key TEXT NOT NULL,
    value REAL NOT NULL,
    unit TEXT NULL,
    source_upload_id INTEGER NULL REFERENCES monitoring_uploads(id) ON DELETE SET NULL,
    confidence REAL NULL
);

CREATE INDEX IF NOT EXISTS idx_metric_samples_key ON metric_samples(metric_key, captured_at);
CREATE INDEX IF NOT EXISTS idx_metric_samples_upload ON metric_samples(source_upload_id);

-- ---------------------------------------------------------------------------
-- Alerting
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS alert_rules (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    group_id INTEGER NULL REFERENCES metric_groups(id) ON DELETE SET NULL,
    metric_key TEXT NOT NULL,
    operator TEXT NOT NULL DEFAULT '>',
    threshold REAL NOT NULL,
    duration_minutes INTEGER NOT NULL DEFAULT 0,
    severity TEXT NOT NULL DEFAULT 'warning',
    message_template TEXT NULL,
    team_id INTEGER NULL REFERENCES teams(id) ON DELETE SET NULL,
    is_enabled INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_alert_rules_key ON alert_rules(metric_key);

CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY NOT NULL,
    device_item_id INTEGER NULL REFERENCES device_items(id) ON DELETE CASCADE,
    vm_id INTEGER NULL REFERENCES vm_items(id) ON DELETE CASCADE,
    rule_id INTEGER NULL REFERENCES alert_rules(id) ON DELETE SET NULL,
    status TEXT NOT NULL DEFAULT 'open', -- open | ack | in_progress | resolved | closed
    severity TEXT NOT NULL DEFAULT 'warning',
    detected_at TEXT NOT NULL,
    latest_value REAL NULL,
    summary TEXT NULL,
    evidence_upload_id INTEGER NULL REFERENCES monitoring_uploads(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_alerts_rule ON alerts(rule_id, status);

CREATE TABLE IF NOT EXISTS alert_updates (
    id INTEGER PRIMARY KEY NOT NULL,
    alert_id INTEGER NOT NULL REFERENCES alerts(id) ON DELETE CASCADE,
    status TEXT NOT NULL,
    note TEXT NULL,
    updated_by INTEGER NULL REFERENCES users(id) ON DELETE SET NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS alert_assignments (
    id INTEGER PRIMARY KEY NOT NULL,
    alert_id INTEGER NOT NULL REFERENCES alerts(id) ON DELETE CASCADE,
    team_id INTEGER NULL REFERENCES teams(id) ON DELETE SET NULL,
    user_id INTEGER NULL REFERENCES users(id) ON DELETE SET NULL,
    assigned_at TEXT NOT NULL
);

-- ---------------------------------------------------------------------------
-- LLM keys and chat
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS llm_api_keys (
    id INTEGER PRIMARY KEY NOT NULL,
    provider TEXT NOT NULL,
    label TEXT NULL,
    api_key TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Single row (id = 1) holding the active key.
CREATE TABLE IF NOT EXISTS llm_settings (
    id INTEGER PRIMARY KEY NOT NULL,
    selected_key_id INTEGER NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_history (
    id INTEGER PRIMARY KEY NOT NULL,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    session_id TEXT NOT NULL,
    role TEXT NOT NULL, -- user | model
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_history_session ON chat_history(user_id, session_id)
"#;
