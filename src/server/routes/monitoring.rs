use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::path::{Path as FsPath, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::patch::MonitoringUploadCreate;
use crate::db::{DbMonitoringUpload, UploadFilter};
use crate::error::CimsError;
use crate::server::extract::{ApiJson, ApiQuery, FormParts};
use crate::server::guards::auth::CurrentUser;
use crate::server::router::CimsState;
use crate::service::ExtractionJob;
use crate::service::monitoring::{ConfirmRequest, confirm_upload, failed_outcome, parse_capture_time};
use crate::service::retention::remove_file_quietly;

const DEFAULT_IMAGE_MIME: &str = "image/png";

pub fn router() -> Router<CimsState> {
    Router::new()
        .route("/monitoring-uploads", get(list_uploads).post(create_upload))
        .route("/monitoring-uploads/{id}", get(get_upload))
        .route("/monitoring-uploads/{id}/file", get(get_upload_file))
        .route("/monitoring-uploads/{id}/confirm", post(confirm))
}

/// POST /api/monitoring-uploads
///
/// Stores the screenshot, records a `pending` upload and queues the parse.
/// The response does not wait for the model.
async fn create_upload(
    State(state): State<CimsState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> Result<Json<DbMonitoringUpload>, CimsError> {
    let storage = &state.cfg.storage;
    let mut form = FormParts::read(multipart, storage.max_upload_size).await?;
    let file = form.take_file()?;

    let dir = storage.monitoring_dir();
    tokio::fs::create_dir_all(&dir).await?;
    let stored_name = match FsPath::new(&file.file_name).extension() {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_string_lossy()),
        None => Uuid::new_v4().to_string(),
    };
    let path: PathBuf = dir.join(stored_name);
    tokio::fs::write(&path, &file.bytes).await?;

    let create = MonitoringUploadCreate {
        device_item_id: form.int("device_item_id")?,
        vm_id: form.int("vm_id")?,
        location_id: form.int("location_id")?,
        file_path: path.to_string_lossy().into_owned(),
        file_name: file.file_name,
        mime_type: file.content_type.clone(),
        uploaded_by_user_id: Some(user.id),
        capture_time: form.text("capture_time").and_then(parse_capture_time),
        dashboard_label: form.text("dashboard_label").map(str::to_string),
    };
    let upload = match state.db.create_monitoring_upload(create).await {
        Ok(upload) => upload,
        Err(e) => {
            remove_file_quietly(&path).await;
            return Err(e);
        }
    };

    let job = ExtractionJob {
        upload_id: upload.id,
        file_path: path,
        mime_type: file
            .content_type
            .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string()),
    };
    if let Err(e) = state.extractor.submit(job) {
        warn!(upload_id = upload.id, error = %e, "Failed to queue screenshot parse");
        state
            .db
            .record_parse_outcome(
                upload.id,
                failed_outcome("Parse queue unavailable"),
            )
            .await?;
        return Ok(Json(state.db.get_monitoring_upload(upload.id).await?));
    }

    info!(upload_id = upload.id, bytes = file.bytes.len(), "Monitoring screenshot queued");
    Ok(Json(upload))
}

async fn list_uploads(
    State(state): State<CimsState>,
    _user: CurrentUser,
    ApiQuery(filter): ApiQuery<UploadFilter>,
) -> Result<Json<Vec<DbMonitoringUpload>>, CimsError> {
    Ok(Json(state.db.list_monitoring_uploads(&filter).await?))
}

async fn get_upload(
    State(state): State<CimsState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<DbMonitoringUpload>, CimsError> {
    Ok(Json(state.db.get_monitoring_upload(id).await?))
}

async fn get_upload_file(
    State(state): State<CimsState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, CimsError> {
    let upload = state.db.get_monitoring_upload(id).await?;
    let bytes = match tokio::fs::read(&upload.file_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CimsError::not_found("File"));
        }
        Err(e) => return Err(e.into()),
    };
    let mime = upload
        .mime_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

/// POST /api/monitoring-uploads/{id}/confirm
async fn confirm(
    State(state): State<CimsState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<ConfirmRequest>,
) -> Result<Json<Value>, CimsError> {
    let created = confirm_upload(&state.db, id, body).await?;
    Ok(Json(json!({
        "message": "Upload confirmed",
        "samples_created": created,
    })))
}
