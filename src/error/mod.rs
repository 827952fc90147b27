mod cims;
mod llm;

pub use cims::{ApiErrorBody, ApiErrorObject, CimsError};
pub use llm::LlmError;

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
