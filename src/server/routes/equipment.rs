use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use serde_json::Value;
use tracing::info;

use super::attachments::local_upload_path;
use super::message;
use crate::db::patch::{EquipmentCreate, EquipmentPatch, ManualUpsert};
use crate::db::{DbEquipmentListItem, EquipmentDetail, ResourcePatch};
use crate::error::CimsError;
use crate::server::extract::ApiJson;
use crate::server::guards::auth::{AdminUser, CurrentUser};
use crate::server::router::CimsState;
use crate::service::retention::remove_file_quietly;

pub fn router() -> Router<CimsState> {
    Router::new()
        .route("/equipment", get(list_equipment).post(create_equipment))
        .route(
            "/equipment/{id}",
            get(get_equipment).put(update_equipment).delete(delete_equipment),
        )
        .route("/equipment/{id}/manual", put(upsert_manual))
}

async fn list_equipment(
    State(state): State<CimsState>,
    _user: CurrentUser,
) -> Result<Json<Vec<DbEquipmentListItem>>, CimsError> {
    Ok(Json(state.db.list_equipment().await?))
}

async fn get_equipment(
    State(state): State<CimsState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<EquipmentDetail>, CimsError> {
    Ok(Json(state.db.get_equipment_detail(id).await?))
}

async fn create_equipment(
    State(state): State<CimsState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<EquipmentCreate>,
) -> Result<Json<EquipmentDetail>, CimsError> {
    let id = state.db.create_equipment(body).await?;
    Ok(Json(state.db.get_equipment_detail(id).await?))
}

async fn update_equipment(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<EquipmentPatch>,
) -> Result<Json<EquipmentDetail>, CimsError> {
    state.db.patch(ResourcePatch::Equipment { id, patch }).await?;
    Ok(Json(state.db.get_equipment_detail(id).await?))
}

async fn delete_equipment(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, CimsError> {
    let urls = state.db.delete_equipment(id).await?;
    let mut removed = 0usize;
    for url in &urls {
        if let Some(path) = local_upload_path(&state.cfg.storage, url) {
            if remove_file_quietly(path).await {
                removed += 1;
            }
        }
    }
    info!(equipment_id = id, attachments = urls.len(), files_removed = removed, "Equipment deleted");
    Ok(message("Equipment deleted successfully"))
}

async fn upsert_manual(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<ManualUpsert>,
) -> Result<Json<EquipmentDetail>, CimsError> {
    state.db.upsert_manual(id, body).await?;
    Ok(Json(state.db.get_equipment_detail(id).await?))
}
