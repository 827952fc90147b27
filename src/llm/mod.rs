//! Model access: the provider-agnostic [`LlmBackend`] trait, its hosted
//! implementation, prompt text, key resolution and output parsing helpers.

mod hosted;
mod keys;
mod parse;
pub mod prompts;
mod sanitize;
mod upstream;

pub use hosted::HostedLlm;
pub use keys::{MULTIPLE_KEYS_UNSELECTED, ResolvedKey, SELECTED_KEY_MISSING, resolve_key};
pub use parse::{parse_json_object, strip_code_fence};
pub use sanitize::sanitize_error_message;

use async_trait::async_trait;
use cims_schema::ExtractionPayload;
use futures::stream::BoxStream;
use std::sync::Arc;

use crate::error::LlmError;

/// Incremental model output.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

pub type SharedLlm = Arc<dyn LlmBackend>;

#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Read metrics off a dashboard screenshot.
    ///
    /// Unparseable model output is an `Ok` payload with status `"error"`; `Err` is
    /// reserved for transport, upstream and key-selection failures.
    async fn extract_metrics(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<ExtractionPayload, LlmError>;

    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    async fn stream(&self, prompt: &str) -> Result<TextStream, LlmError>;
}
