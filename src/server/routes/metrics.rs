use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::Value;

use super::message;
use crate::db::patch::{MetricDefinitionCreate, MetricGroupUpsert};
use crate::db::{DbMetricDefinition, DbMetricSample, MetricGroupView, SampleFilter};
use crate::error::CimsError;
use crate::server::extract::{ApiJson, ApiQuery};
use crate::server::guards::auth::{AdminUser, CurrentUser};
use crate::server::router::CimsState;

pub fn router() -> Router<CimsState> {
    Router::new()
        .route(
            "/metrics/definitions",
            get(list_definitions).post(create_definition),
        )
        .route("/metrics/groups", get(list_groups).post(create_group))
        .route("/metrics/groups/{id}", put(update_group).delete(delete_group))
        .route("/metrics/groups/{id}/members", post(add_member))
        .route("/metrics/samples", get(list_samples))
}

#[derive(Debug, Deserialize)]
pub struct MemberRequest {
    pub metric_key: String,
}

async fn list_definitions(
    State(state): State<CimsState>,
    _user: CurrentUser,
) -> Result<Json<Vec<DbMetricDefinition>>, CimsError> {
    Ok(Json(state.db.list_metric_definitions().await?))
}

async fn create_definition(
    State(state): State<CimsState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<MetricDefinitionCreate>,
) -> Result<Json<DbMetricDefinition>, CimsError> {
    if body.key.trim().is_empty() {
        return Err(CimsError::bad_request("Metric key is required"));
    }
    Ok(Json(state.db.create_metric_definition(body).await?))
}

async fn list_groups(
    State(state): State<CimsState>,
    _user: CurrentUser,
) -> Result<Json<Vec<MetricGroupView>>, CimsError> {
    Ok(Json(state.db.list_metric_groups().await?))
}

async fn create_group(
    State(state): State<CimsState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<MetricGroupUpsert>,
) -> Result<Json<MetricGroupView>, CimsError> {
    Ok(Json(state.db.create_metric_group(body).await?))
}

async fn update_group(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<MetricGroupUpsert>,
) -> Result<Json<MetricGroupView>, CimsError> {
    Ok(Json(state.db.update_metric_group(id, body).await?))
}

async fn delete_group(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, CimsError> {
    state.db.delete_metric_group(id).await?;
    Ok(message("Group deleted"))
}

async fn add_member(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<MemberRequest>,
) -> Result<Json<Value>, CimsError> {
    if body.metric_key.trim().is_empty() {
        return Err(CimsError::bad_request("Metric key is required"));
    }
    state.db.add_metric_group_member(id, &body.metric_key).await?;
    Ok(message("Member added"))
}

/// GET /api/metrics/samples?device_item_id&vm_id&metric_key
async fn list_samples(
    State(state): State<CimsState>,
    _user: CurrentUser,
    ApiQuery(filter): ApiQuery<SampleFilter>,
) -> Result<Json<Vec<DbMetricSample>>, CimsError> {
    Ok(Json(state.db.list_metric_samples(&filter).await?))
}
