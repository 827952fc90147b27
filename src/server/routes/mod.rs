//! REST handlers, one module per resource. Each exposes `router()`, merged under `/api`.

pub mod alerts;
pub mod attachments;
pub mod auth;
pub mod chat;
pub mod device_items;
pub mod equipment;
pub mod llm_config;
pub mod locations;
pub mod manuals;
pub mod metrics;
pub mod monitoring;
pub mod teams;
pub mod vms;

use axum::Json;
use serde_json::{Value, json};

/// `{"message": ...}` acknowledgement body.
pub(crate) fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}
