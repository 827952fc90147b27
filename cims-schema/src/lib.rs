pub mod anthropic;
pub mod extraction;
pub mod gemini;
pub mod openai;

pub use anthropic::{AnthropicMessagesRequest, AnthropicMessagesResponse};
pub use extraction::{ExtractedMetric, ExtractionPayload, LinkItem, ManualDraft};
pub use gemini::{GeminiGenerateRequest, GeminiGenerateResponse};
pub use openai::{OpenaiChatRequest, OpenaiChatResponse, OpenaiChatChunk};
