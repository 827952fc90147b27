use reqwest::StatusCode;
use thiserror::Error as ThisError;

use super::IsRetryable;
use crate::llm::sanitize_error_message;

#[derive(Debug, ThisError)]
pub enum LlmError {
    #[error("Missing API key for {0}")]
    MissingApiKey(String),

    /// Several stored keys and no usable selection.
    #[error("{0}")]
    KeySelection(String),

    #[error("Upstream error with status {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Stream protocol error: {0}")]
    StreamProtocolError(String),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("{0}")]
    Unexpected(String),
}

impl LlmError {
    /// Display text with anything resembling an API key masked.
    pub fn public_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

impl IsRetryable for LlmError {
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::ReqwestError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::UpstreamStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_upstream_statuses_retry() {
        let err = LlmError::UpstreamStatus {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        assert!(err.is_retryable());

        let err = LlmError::UpstreamStatus {
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
        };
        assert!(!err.is_retryable());
        assert!(!LlmError::MissingApiKey("gemini".to_string()).is_retryable());
    }
}
