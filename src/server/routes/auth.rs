use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::message;
use crate::db::UserView;
use crate::error::CimsError;
use crate::server::extract::ApiJson;
use crate::server::guards::auth::{CurrentUser, Session, removal_cookie, session_cookie};
use crate::server::router::CimsState;
use crate::utils::password::verify_password;

pub fn router() -> Router<CimsState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/login
async fn login(
    State(state): State<CimsState>,
    jar: PrivateCookieJar,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<(PrivateCookieJar, Json<Value>), CimsError> {
    let invalid = || CimsError::Unauthorized("Invalid email or password".to_string());

    let user = state
        .db
        .find_user_by_email(&body.email)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&body.password, &user.password_hash) {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(CimsError::Forbidden("Account is inactive".to_string()));
    }

    let user = state.db.record_login(user.id).await?;
    let basic = &state.cfg.basic;
    let cookie = session_cookie(
        Session::new(user.id),
        basic.session_ttl_hours,
        !basic.insecure_cookie,
    );
    info!(user_id = user.id, "User logged in");

    Ok((
        jar.add(cookie),
        Json(json!({ "user": UserView::from(user) })),
    ))
}

/// POST /api/auth/logout
async fn logout(jar: PrivateCookieJar) -> (PrivateCookieJar, Json<Value>) {
    (jar.remove(removal_cookie()), message("Logged out successfully"))
}

/// GET /api/auth/me
async fn me(CurrentUser(user): CurrentUser) -> Json<Value> {
    Json(json!({ "user": UserView::from(user) }))
}
