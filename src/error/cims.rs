use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error as ThisError;
use tracing::{debug, error};

use super::llm::LlmError;

#[derive(Debug, ThisError)]
pub enum CimsError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("File too large")]
    PayloadTooLarge,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Ractor error: {0}")]
    RactorError(String),
}

impl CimsError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        CimsError::NotFound(entity.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        CimsError::BadRequest(msg.into())
    }

    /// True when the database rejected a write on a UNIQUE constraint.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            CimsError::DatabaseError(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    }

    /// Turn a UNIQUE violation into a 400 carrying `msg`; other errors pass through.
    pub fn on_unique(self, msg: &str) -> Self {
        if self.is_unique_violation() {
            CimsError::BadRequest(msg.to_string())
        } else {
            self
        }
    }

    /// Turn a FOREIGN KEY violation into a 400 carrying `msg`; other errors pass through.
    pub fn on_foreign_key(self, msg: &str) -> Self {
        match &self {
            CimsError::DatabaseError(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                CimsError::BadRequest(msg.to_string())
            }
            _ => self,
        }
    }
}

impl From<JsonRejection> for CimsError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection.body_text(), "rejected JSON body");
        CimsError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for CimsError {
    fn from(rejection: QueryRejection) -> Self {
        CimsError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for CimsError {
    fn from(rejection: MultipartRejection) -> Self {
        CimsError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for CimsError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            CimsError::PayloadTooLarge
        } else {
            CimsError::BadRequest(err.body_text())
        }
    }
}

impl IntoResponse for CimsError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            CimsError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                ApiErrorObject::new("NOT_FOUND", self.to_string()),
            ),

            CimsError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorObject::new("BAD_REQUEST", msg),
            ),

            CimsError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ApiErrorObject::new("UNAUTHORIZED", msg),
            ),

            CimsError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, ApiErrorObject::new("FORBIDDEN", msg))
            }

            CimsError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ApiErrorObject::new("PAYLOAD_TOO_LARGE", "File too large"),
            ),

            CimsError::Llm(err) => {
                let message = err.public_message();
                error!(error = %message, "LLM request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiErrorObject::new("LLM_ERROR", message),
                )
            }

            CimsError::DatabaseError(_)
            | CimsError::JsonError(_)
            | CimsError::IoError(_)
            | CimsError::RactorError(_) => {
                error!(error = %self, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorObject::new("INTERNAL_ERROR", "An internal server error occurred."),
                )
            }
        };
        (status, Json(ApiErrorBody { inner: error_body })).into_response()
    }
}

/// Standardized API error response payload.
#[derive(Serialize)]
pub struct ApiErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiErrorObject {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    #[serde(rename = "error")]
    pub inner: ApiErrorObject,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: CimsError) -> (StatusCode, Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_names_the_entity() {
        let (status, body) = body_of(CimsError::not_found("Equipment")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "Equipment not found");
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "secret path /etc");
        let (status, body) = body_of(CimsError::from(io)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], "An internal server error occurred.");

        let (status, body) =
            body_of(CimsError::RactorError("ExtractorActor cast failed".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.to_string().contains("ExtractorActor"));
    }

    #[tokio::test]
    async fn llm_errors_are_masked() {
        let err = LlmError::Unexpected("Incorrect API key provided: sk-abcdefgh12345678".to_string());
        let (status, body) = body_of(CimsError::Llm(err)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let message = body["error"]["message"].as_str().unwrap();
        assert!(!message.contains("sk-abcdefgh"), "{message}");
        assert!(message.contains("5678"), "{message}");
    }
}
