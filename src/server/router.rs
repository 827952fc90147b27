use crate::config::Config;
use crate::db::Db;
use crate::llm::SharedLlm;
use crate::server::routes;
use crate::service::ExtractorHandle;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::{HeaderName, HeaderValue, Method, Version, header},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use axum_extra::extract::cookie::Key;
use base64::Engine as _;
use rand::RngCore;
use serde_json::{Value, json};
use std::{sync::Arc, time::Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use crate::error::CimsError;

const MAX_REQUEST_ID_LEN: usize = 128;
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_SESSION_ID: HeaderName = HeaderName::from_static("x-session-id");

/// Room for multipart framing and text fields on top of the largest accepted file.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

fn generate_request_id() -> String {
    // 96 bits => 16 chars base64url (no padding).
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn format_http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/?",
    }
}

#[derive(Clone)]
pub struct CimsState {
    pub db: Db,
    pub llm: SharedLlm,
    pub extractor: ExtractorHandle,
    pub cfg: Arc<Config>,
    cookie_key: Key,
}

impl CimsState {
    pub fn new(db: Db, llm: SharedLlm, extractor: ExtractorHandle, cfg: Config) -> Self {
        let cookie_key = match cfg
            .basic
            .cookie_key_bytes()
            .and_then(|bytes| Key::try_from(bytes.as_slice()).ok())
        {
            Some(key) => key,
            None => {
                if cfg.basic.cookie_secret.is_some() {
                    warn!("basic.cookie_secret is not valid base64 of at least 64 bytes; using a random key");
                }
                Key::generate()
            }
        };

        Self {
            db,
            llm,
            extractor,
            cfg: Arc::new(cfg),
            cookie_key,
        }
    }
}

impl FromRef<CimsState> for Key {
    fn from_ref(state: &CimsState) -> Self {
        state.cookie_key.clone()
    }
}

async fn not_found_handler() -> CimsError {
    CimsError::not_found("Resource")
}

async fn root_banner() -> Json<Value> {
    Json(json!({ "message": "CIMS API", "version": env!("CARGO_PKG_VERSION") }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let request_id = req
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);

    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let start = Instant::now();
    let mut resp = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        resp.headers_mut().insert(X_REQUEST_ID, value);
    }

    let status = resp.status();
    let latency_ms = start.elapsed().as_millis() as u64;
    let path = uri.path();
    let protocol = format_http_version(version);

    // For the chat stream, `latency_ms` is time-to-first-byte.
    if status.is_server_error() {
        error!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else if status.is_client_error() {
        warn!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    } else {
        info!(
            "| {:>3} | {} | {:^7} | {:<8} | {} | {}ms | {}",
            status.as_u16(),
            request_id,
            method.as_str(),
            protocol,
            path,
            latency_ms,
            user_agent
        );
    }

    resp
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();

    let allow_origin = if allowed.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, X_REQUEST_ID])
        .expose_headers([X_SESSION_ID, X_REQUEST_ID])
}

pub fn cims_router(state: CimsState) -> Router {
    let body_limit = state
        .cfg
        .storage
        .max_upload_size
        .saturating_add(MULTIPART_OVERHEAD);
    let cors = cors_layer(&state.cfg.basic.cors_origins);

    let api = Router::new()
        .route("/health", get(health))
        .merge(routes::auth::router())
        .merge(routes::locations::router())
        .merge(routes::equipment::router())
        .merge(routes::manuals::router())
        .merge(routes::attachments::router())
        .merge(routes::device_items::router())
        .merge(routes::vms::router())
        .merge(routes::metrics::router())
        .merge(routes::monitoring::router())
        .merge(routes::alerts::router())
        .merge(routes::teams::router())
        .merge(routes::llm_config::router())
        .merge(routes::chat::router());

    Router::new()
        .route("/", get(root_banner))
        .nest("/api", api)
        .fallback(not_found_handler)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(middleware::from_fn(access_log))
}
