use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde_json::Value;

use super::message;
use crate::db::patch::{DeviceItemCreate, DeviceItemPatch};
use crate::db::{CategoryCount, DbDeviceListItem, DeviceItemDetail, DeviceItemFilter, ResourcePatch};
use crate::error::CimsError;
use crate::server::extract::{ApiJson, ApiQuery};
use crate::server::guards::auth::{AdminUser, CurrentUser};
use crate::server::router::CimsState;

pub fn router() -> Router<CimsState> {
    Router::new()
        .route("/device-items", get(list_device_items).post(create_device_item))
        .route("/device-items/categories", get(list_categories))
        .route("/device-items/bulk", post(create_bulk))
        .route(
            "/device-items/{id}",
            get(get_device_item)
                .put(update_device_item)
                .delete(delete_device_item),
        )
}

async fn list_device_items(
    State(state): State<CimsState>,
    _user: CurrentUser,
    ApiQuery(filter): ApiQuery<DeviceItemFilter>,
) -> Result<Json<Vec<DbDeviceListItem>>, CimsError> {
    Ok(Json(state.db.list_device_items(&filter).await?))
}

async fn list_categories(
    State(state): State<CimsState>,
    _user: CurrentUser,
) -> Result<Json<Vec<CategoryCount>>, CimsError> {
    Ok(Json(state.db.device_categories().await?))
}

async fn get_device_item(
    State(state): State<CimsState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DeviceItemDetail>, CimsError> {
    Ok(Json(state.db.get_device_item_detail(id).await?))
}

async fn create_device_item(
    State(state): State<CimsState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<DeviceItemCreate>,
) -> Result<Json<DeviceItemDetail>, CimsError> {
    let id = state.db.create_device_item(body).await?;
    Ok(Json(state.db.get_device_item_detail(id).await?))
}

/// POST /api/device-items/bulk: all or nothing. Returns the created items in input order.
async fn create_bulk(
    State(state): State<CimsState>,
    _admin: AdminUser,
    ApiJson(items): ApiJson<Vec<DeviceItemCreate>>,
) -> Result<Json<Vec<DeviceItemDetail>>, CimsError> {
    let ids = state.db.create_device_items_bulk(items).await?;
    let mut created = Vec::with_capacity(ids.len());
    for id in ids {
        created.push(state.db.get_device_item_detail(id).await?);
    }
    Ok(Json(created))
}

async fn update_device_item(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<DeviceItemPatch>,
) -> Result<Json<DeviceItemDetail>, CimsError> {
    state
        .db
        .patch(ResourcePatch::DeviceItem { id, patch })
        .await
        .map_err(|e| e.on_foreign_key("Equipment, location or metric group not found"))?;
    Ok(Json(state.db.get_device_item_detail(id).await?))
}

async fn delete_device_item(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, CimsError> {
    state.db.delete_device_item(id).await?;
    Ok(message("Device item deleted successfully"))
}
