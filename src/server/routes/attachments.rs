use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde_json::{Value, json};
use std::path::{Component, Path as FsPath};
use tracing::info;
use uuid::Uuid;

use super::message;
use crate::config::StorageConfig;
use crate::db::patch::AttachmentCreate;
use crate::error::CimsError;
use crate::server::extract::FormParts;
use crate::server::guards::auth::{AdminUser, CurrentUser};
use crate::server::router::CimsState;
use crate::service::retention::remove_file_quietly;

const DEFAULT_DOCUMENT_CATEGORY: &str = "implementation";

pub fn router() -> Router<CimsState> {
    Router::new()
        .route(
            "/attachments/{id}",
            post(upload_attachment).delete(delete_attachment),
        )
        .route("/attachments/{id}/url", post(add_url_attachment))
        .route("/attachments/{id}/publish", patch(toggle_publish))
        .route("/attachments/file/{id}", get(serve_file))
}

/// The stored path behind `url` when it points inside `upload_dir`.
///
/// Paths with `..` components never qualify, even when they start with `upload_dir`.
pub(crate) fn local_upload_path<'a>(storage: &StorageConfig, url: &'a str) -> Option<&'a FsPath> {
    let path = FsPath::new(url);
    let escapes = path
        .components()
        .any(|c| matches!(c, Component::ParentDir));
    (!escapes && path.starts_with(&storage.upload_dir)).then_some(path)
}

/// Media type used for inline display, keyed by file extension.
fn inline_media_type(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// Quote-safe ASCII rendition of a file name for `Content-Disposition`.
fn disposition_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// POST /api/attachments/{equipment_id} (multipart: file, file_type, document_category)
async fn upload_attachment(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(equipment_id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<Value>, CimsError> {
    let storage = &state.cfg.storage;
    let mut form = FormParts::read(multipart, storage.max_upload_size).await?;

    if state.db.find_equipment(equipment_id).await?.is_none() {
        return Err(CimsError::not_found("Equipment"));
    }

    let file = form.take_file()?;
    let kind = form.require_text("file_type")?.to_string();
    let document_category = form
        .text("document_category")
        .unwrap_or(DEFAULT_DOCUMENT_CATEGORY)
        .to_string();

    let stored_name = match FsPath::new(&file.file_name).extension() {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_string_lossy()),
        None => Uuid::new_v4().to_string(),
    };
    tokio::fs::create_dir_all(&storage.upload_dir).await?;
    let path = storage.upload_dir.join(stored_name);
    tokio::fs::write(&path, &file.bytes).await?;

    let attachment = state
        .db
        .create_attachment(AttachmentCreate {
            equipment_id,
            name: file.file_name,
            kind,
            url: path.to_string_lossy().into_owned(),
            metadata: None,
            document_category,
        })
        .await?;
    info!(
        attachment_id = attachment.id,
        equipment_id,
        bytes = file.bytes.len(),
        "Attachment stored"
    );

    Ok(Json(json!({
        "id": attachment.id,
        "name": attachment.name,
        "url": format!("/api/attachments/file/{}", attachment.id),
        "document_category": attachment.document_category,
    })))
}

/// POST /api/attachments/{equipment_id}/url (form: name, url, file_type, document_category, metadata)
async fn add_url_attachment(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(equipment_id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<Value>, CimsError> {
    let form = FormParts::read(multipart, state.cfg.storage.max_upload_size).await?;

    if state.db.find_equipment(equipment_id).await?.is_none() {
        return Err(CimsError::not_found("Equipment"));
    }

    let metadata = form
        .text("metadata")
        .map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(|_| CimsError::bad_request("metadata must be a JSON document"))?;

    let attachment = state
        .db
        .create_attachment(AttachmentCreate {
            equipment_id,
            name: form.require_text("name")?.to_string(),
            kind: form.require_text("file_type")?.to_string(),
            url: form.require_text("url")?.to_string(),
            metadata,
            document_category: form
                .text("document_category")
                .unwrap_or(DEFAULT_DOCUMENT_CATEGORY)
                .to_string(),
        })
        .await?;

    Ok(Json(json!({
        "id": attachment.id,
        "name": attachment.name,
        "url": attachment.url,
        "document_category": attachment.document_category,
    })))
}

async fn toggle_publish(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, CimsError> {
    let is_published = state.db.toggle_attachment_published(id).await?;
    Ok(Json(json!({ "id": id, "is_published": is_published })))
}

async fn delete_attachment(
    State(state): State<CimsState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<Value>, CimsError> {
    let attachment = state.db.delete_attachment(id).await?;
    if let Some(path) = local_upload_path(&state.cfg.storage, &attachment.url) {
        remove_file_quietly(path).await;
    }
    Ok(message("Attachment deleted successfully"))
}

/// GET /api/attachments/file/{id}: the stored file, for inline viewing.
async fn serve_file(
    State(state): State<CimsState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Response, CimsError> {
    let attachment = state.db.get_attachment(id).await?;
    // External links and anything outside the upload dir are not served from disk.
    let Some(path) = local_upload_path(&state.cfg.storage, &attachment.url) else {
        return Err(CimsError::not_found("File"));
    };
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CimsError::not_found("File"));
        }
        Err(e) => return Err(e.into()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, inline_media_type(&attachment.name).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", disposition_name(&attachment.name)),
            ),
        ],
        bytes,
    )
        .into_response())
}
