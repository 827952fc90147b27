use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, patch, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::LlmProvider;
use crate::db::LlmKeyState;
use crate::error::CimsError;
use crate::server::extract::ApiJson;
use crate::server::guards::auth::AdminUser;
use crate::server::router::CimsState;

pub fn router() -> Router<CimsState> {
    Router::new()
        .route("/llm-config", get(get_config))
        .route("/llm-config/keys", post(add_key))
        .route("/llm-config/select", patch(select_key))
        .route("/llm-config/keys/{id}", patch(update_key).delete(delete_key))
}

#[derive(Debug, Serialize)]
pub struct LlmKeySummary {
    pub id: i64,
    pub provider: String,
    pub label: Option<String>,
    pub masked_key: String,
    pub created_at: DateTime<Utc>,
    pub is_selected: bool,
}

#[derive(Debug, Serialize)]
pub struct LlmConfigView {
    pub selected_key_id: Option<i64>,
    /// Several keys are stored and none is selected.
    pub requires_selection: bool,
    pub keys: Vec<LlmKeySummary>,
}

#[derive(Debug, Deserialize)]
pub struct AddKeyRequest {
    pub provider: String,
    pub api_key: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectKeyRequest {
    pub key_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateKeyRequest {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// `****` plus the last four characters.
fn mask_key(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let tail: String = {
        let chars: Vec<char> = value.chars().collect();
        chars[chars.len().saturating_sub(4)..].iter().collect()
    };
    format!("****{tail}")
}

impl From<LlmKeyState> for LlmConfigView {
    fn from(state: LlmKeyState) -> Self {
        let selected = state.selected_key_id;
        Self {
            selected_key_id: selected,
            requires_selection: state.keys.len() > 1 && selected.is_none(),
            keys: state
                .keys
                .into_iter()
                .map(|k| LlmKeySummary {
                    masked_key: mask_key(&k.api_key),
                    is_selected: selected == Some(k.id),
                    id: k.id,
                    provider: k.provider,
                    label: k.label,
                    created_at: k.created_at,
                })
                .collect(),
        }
    }
}

async fn current_view(state: &CimsState) -> Result<Json<LlmConfigView>, CimsError> {
    Ok(Json(state.db.llm_key_state().await?.into()))
}

async fn get_config(
    State(state): State<CimsState>,
    _admin: AdminUser,
) -> Result<Json<LlmConfigView>, CimsError> {
    current_view(&state).await
}

async fn add_key(
    State(state): State<CimsState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<AddKeyRequest>,
) -> Result<Json<LlmConfigView>, CimsError> {
    let provider = LlmProvider::parse(&body.provider)
        .ok_or_else(|| CimsError::bad_request("Unsupported provider"))?;
    let api_key = body.api_key.trim();
    if api_key.is_empty() {
        return Err(CimsError::bad_request("API key required"));
    }
    let label = body
        .label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    let id = state.db.add_llm_key(provider.as_str(), label, api_key).await?;
    info!(key_id = id, provider = %provider, "LLM API key stored");
    current_view(&state).await
}

async fn select_key(
    State(state): State<CimsState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<SelectKeyRequest>,
) -> Result<Json<LlmConfigView>, CimsError> {
    state.db.select_llm_key(body.key_id).await?;
    current_view(&state).await
}

/// PATCH /api/llm-config/keys/{id}. A blank `label` clears it; a blank `api_key` is ignored.
async fn update_key(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<UpdateKeyRequest>,
) -> Result<Json<LlmConfigView>, CimsError> {
    let api_key = body
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());
    let label = body.label.map(|l| {
        let l = l.trim();
        (!l.is_empty()).then(|| l.to_string())
    });
    state.db.update_llm_key(id, api_key, label).await?;
    current_view(&state).await
}

async fn delete_key(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<LlmConfigView>, CimsError> {
    state.db.delete_llm_key(id).await?;
    info!(key_id = id, "LLM API key deleted");
    current_view(&state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_all_but_last_four() {
        assert_eq!(mask_key("sk-abcdef123456"), "****3456");
        assert_eq!(mask_key("abc"), "****abc");
        assert_eq!(mask_key(""), "");
    }
}
