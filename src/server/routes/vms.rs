use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde_json::Value;

use super::message;
use crate::db::patch::{VmCreate, VmPatch};
use crate::db::{DbVm, ResourcePatch};
use crate::error::CimsError;
use crate::server::extract::ApiJson;
use crate::server::guards::auth::{AdminUser, CurrentUser};
use crate::server::router::CimsState;

pub fn router() -> Router<CimsState> {
    Router::new()
        .route("/vm-items", get(list_vms).post(create_vm))
        .route("/vm-items/{id}", get(get_vm).put(update_vm).delete(delete_vm))
}

async fn list_vms(
    State(state): State<CimsState>,
    _user: CurrentUser,
) -> Result<Json<Vec<DbVm>>, CimsError> {
    Ok(Json(state.db.list_vms().await?))
}

async fn get_vm(
    State(state): State<CimsState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DbVm>, CimsError> {
    Ok(Json(state.db.get_vm(id).await?))
}

async fn create_vm(
    State(state): State<CimsState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<VmCreate>,
) -> Result<Json<DbVm>, CimsError> {
    Ok(Json(state.db.create_vm(body).await?))
}

async fn update_vm(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<VmPatch>,
) -> Result<Json<DbVm>, CimsError> {
    state
        .db
        .patch(ResourcePatch::Vm { id, patch })
        .await
        .map_err(|e| e.on_foreign_key("Location or metric group not found"))?;
    Ok(Json(state.db.get_vm(id).await?))
}

async fn delete_vm(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, CimsError> {
    state.db.delete_vm(id).await?;
    Ok(message("VM deleted successfully"))
}
