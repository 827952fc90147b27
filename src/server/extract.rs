use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::error::CimsError;

/// `Json<T>` whose rejection renders as a [`CimsError`] body.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = CimsError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Query<T>` whose rejection renders as a [`CimsError`] body.
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = CimsError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// The single file part of a multipart form.
#[derive(Debug, Clone)]
pub struct FormFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// A drained multipart form: text fields by name plus the `file` part, if any.
#[derive(Debug, Default)]
pub struct FormParts {
    pub fields: HashMap<String, String>,
    pub file: Option<FormFile>,
}

impl FormParts {
    /// Read every part. A `file` part larger than `max_file_size` is a 413.
    pub async fn read(mut multipart: Multipart, max_file_size: usize) -> Result<Self, CimsError> {
        let mut parts = Self::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == "file" {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                if bytes.len() > max_file_size {
                    return Err(CimsError::PayloadTooLarge);
                }
                parts.file = Some(FormFile {
                    file_name,
                    content_type,
                    bytes,
                });
            } else {
                parts.fields.insert(name, field.text().await?);
            }
        }
        Ok(parts)
    }

    /// Trimmed text field; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require_text(&self, name: &str) -> Result<&str, CimsError> {
        self.text(name)
            .ok_or_else(|| CimsError::bad_request(format!("Missing form field: {name}")))
    }

    /// Integer field; blank or absent is `None`, garbage is a 400.
    pub fn int(&self, name: &str) -> Result<Option<i64>, CimsError> {
        self.text(name)
            .map(|raw| {
                raw.parse::<i64>()
                    .map_err(|_| CimsError::bad_request(format!("Invalid integer for {name}")))
            })
            .transpose()
    }

    pub fn take_file(&mut self) -> Result<FormFile, CimsError> {
        self.file
            .take()
            .ok_or_else(|| CimsError::bad_request("Missing form field: file"))
    }
}
