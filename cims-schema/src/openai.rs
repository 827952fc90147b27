use serde::{Deserialize, Serialize};

/// OpenAI-compatible `/v1/chat/completions` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenaiChatRequest {
    pub model: String,
    pub messages: Vec<OpenaiMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenaiMessage {
    pub role: String,
    pub content: Vec<OpenaiContentPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenaiContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenaiImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenaiImageUrl {
    /// Either an https URL or a `data:<mime>;base64,<data>` URI.
    pub url: String,
}

impl OpenaiContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn inline_image(mime_type: &str, data_b64: &str) -> Self {
        Self::ImageUrl {
            image_url: OpenaiImageUrl {
                url: format!("data:{mime_type};base64,{data_b64}"),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenaiChatResponse {
    #[serde(default)]
    pub choices: Vec<OpenaiChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenaiChoice {
    #[serde(default)]
    pub message: OpenaiResponseMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenaiResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl OpenaiChatResponse {
    pub fn text(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
    }
}

/// One `data:` frame of a streamed chat completion.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenaiChatChunk {
    #[serde(default)]
    pub choices: Vec<OpenaiChunkChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenaiChunkChoice {
    #[serde(default)]
    pub delta: OpenaiDelta,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenaiDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl OpenaiChatChunk {
    pub fn delta_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|s| !s.is_empty())
    }
}
