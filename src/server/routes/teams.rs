use axum::{Json, Router, extract::State, routing::get};

use crate::db::DbTeam;
use crate::db::patch::TeamCreate;
use crate::error::CimsError;
use crate::server::extract::ApiJson;
use crate::server::guards::auth::{AdminUser, CurrentUser};
use crate::server::router::CimsState;

pub fn router() -> Router<CimsState> {
    Router::new().route("/teams", get(list_teams).post(create_team))
}

async fn list_teams(
    State(state): State<CimsState>,
    _user: CurrentUser,
) -> Result<Json<Vec<DbTeam>>, CimsError> {
    Ok(Json(state.db.list_teams().await?))
}

async fn create_team(
    State(state): State<CimsState>,
    _admin: AdminUser,
    ApiJson(body): ApiJson<TeamCreate>,
) -> Result<Json<DbTeam>, CimsError> {
    if body.name.trim().is_empty() {
        return Err(CimsError::bad_request("Team name is required"));
    }
    Ok(Json(state.db.create_team(body).await?))
}
