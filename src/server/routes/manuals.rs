use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};

use crate::db::DbManual;
use crate::error::CimsError;
use crate::server::guards::auth::AdminUser;
use crate::server::router::CimsState;
use crate::service::manuals::generate_manual;

pub fn router() -> Router<CimsState> {
    Router::new().route("/manuals/generate/{id}", post(generate))
}

/// POST /api/manuals/generate/{equipment_id}
///
/// Never fails on the model side: a deterministic manual is stored instead.
async fn generate(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<DbManual>, CimsError> {
    let equipment = state.db.get_equipment(id).await?;
    let manual = generate_manual(state.llm.as_ref(), &equipment).await;
    Ok(Json(state.db.upsert_manual(id, manual).await?))
}
