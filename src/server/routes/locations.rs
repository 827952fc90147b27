use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use serde_json::Value;

use super::message;
use crate::db::patch::{LocationCreate, LocationPatch};
use crate::db::{DbLocation, ResourcePatch};
use crate::error::CimsError;
use crate::server::extract::ApiJson;
use crate::server::guards::auth::{AdminUser, CurrentUser};
use crate::server::router::CimsState;

pub fn router() -> Router<CimsState> {
    Router::new()
        .route("/locations", get(list_locations).post(create_location))
        .route(
            "/locations/{id}",
            get(get_location).put(update_location).delete(delete_location),
        )
}

async fn list_locations(
    State(state): State<CimsState>,
    _user: CurrentUser,
) -> Result<Json<Vec<DbLocation>>, CimsError> {
    Ok(Json(state.db.list_active_locations().await?))
}

async fn get_location(
    State(state): State<CimsState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DbLocation>, CimsError> {
    Ok(Json(state.db.get_location(id).await?))
}

async fn create_location(
    State(state): State<CimsState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<LocationCreate>,
) -> Result<Json<DbLocation>, CimsError> {
    Ok(Json(state.db.create_location(body).await?))
}

async fn update_location(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<LocationPatch>,
) -> Result<Json<DbLocation>, CimsError> {
    state
        .db
        .patch(ResourcePatch::Location { id, patch })
        .await
        .map_err(|e| e.on_unique("Location code already exists"))?;
    Ok(Json(state.db.get_location(id).await?))
}

async fn delete_location(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, CimsError> {
    state.db.delete_location(id).await?;
    Ok(message("Location deleted successfully"))
}
