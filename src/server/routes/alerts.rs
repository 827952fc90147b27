use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::message;
use crate::db::patch::AlertRuleUpsert;
use crate::db::{AlertStatus, DbAlert, DbAlertRule, DbAlertUpdate};
use crate::error::CimsError;
use crate::server::extract::ApiJson;
use crate::server::guards::auth::{AdminUser, CurrentUser};
use crate::server::router::CimsState;

const OPERATORS: [&str; 4] = [">", ">=", "<", "<="];

pub fn router() -> Router<CimsState> {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/rules", get(list_rules).post(create_rule))
        .route("/alerts/rules/{id}", put(update_rule).delete(delete_rule))
        .route("/alerts/{id}", get(get_alert))
        .route("/alerts/{id}/updates", post(add_update))
        .route("/alerts/{id}/assign", post(assign))
}

#[derive(Debug, Deserialize)]
pub struct AlertUpdateRequest {
    pub status: AlertStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    #[serde(default)]
    pub team_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// An alert with its status history.
#[derive(Debug, Serialize)]
pub struct AlertDetail {
    #[serde(flatten)]
    pub alert: DbAlert,
    pub updates: Vec<DbAlertUpdate>,
}

fn validate_rule(rule: &AlertRuleUpsert) -> Result<(), CimsError> {
    if !OPERATORS.contains(&rule.operator.as_str()) {
        return Err(CimsError::bad_request(format!(
            "Unsupported operator: {}",
            rule.operator
        )));
    }
    if rule.metric_key.trim().is_empty() {
        return Err(CimsError::bad_request("Metric key is required"));
    }
    Ok(())
}

async fn list_alerts(
    State(state): State<CimsState>,
    _user: CurrentUser,
) -> Result<Json<Vec<DbAlert>>, CimsError> {
    Ok(Json(state.db.list_alerts().await?))
}

async fn get_alert(
    State(state): State<CimsState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<AlertDetail>, CimsError> {
    let alert = state.db.get_alert(id).await?;
    let updates = state.db.list_alert_updates(id).await?;
    Ok(Json(AlertDetail { alert, updates }))
}

async fn list_rules(
    State(state): State<CimsState>,
    _user: CurrentUser,
) -> Result<Json<Vec<DbAlertRule>>, CimsError> {
    Ok(Json(state.db.list_alert_rules().await?))
}

async fn create_rule(
    State(state): State<CimsState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<AlertRuleUpsert>,
) -> Result<Json<DbAlertRule>, CimsError> {
    validate_rule(&body)?;
    Ok(Json(state.db.create_alert_rule(body).await?))
}

async fn update_rule(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<AlertRuleUpsert>,
) -> Result<Json<DbAlertRule>, CimsError> {
    validate_rule(&body)?;
    Ok(Json(state.db.update_alert_rule(id, body).await?))
}

async fn delete_rule(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, CimsError> {
    state.db.delete_alert_rule(id).await?;
    Ok(message("Rule deleted"))
}

/// POST /api/alerts/{id}/updates: set the status and record who did it.
async fn add_update(
    State(state): State<CimsState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<AlertUpdateRequest>,
) -> Result<Json<DbAlertUpdate>, CimsError> {
    let update = state
        .db
        .add_alert_update(id, body.status, body.note, user.id)
        .await?;
    info!(alert_id = id, status = body.status.as_str(), user_id = user.id, "Alert status updated");
    Ok(Json(update))
}

async fn assign(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<AssignRequest>,
) -> Result<Json<Value>, CimsError> {
    state.db.get_alert(id).await?;
    state.db.assign_alert(id, body.team_id, body.user_id).await?;
    Ok(message("Assigned"))
}
