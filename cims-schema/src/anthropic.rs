use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic `/v1/messages` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<AnthropicMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    Text { text: String },
    Image { source: AnthropicImageSource },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicImageSource {
    /// Always `"base64"` for inline images.
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: String,
}

impl AnthropicContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn inline_image(media_type: impl Into<String>, data_b64: impl Into<String>) -> Self {
        Self::Image {
            source: AnthropicImageSource {
                kind: "base64".to_string(),
                media_type: media_type.into(),
                data: data_b64.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnthropicMessagesResponse {
    #[serde(default)]
    pub content: Vec<AnthropicResponseBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnthropicResponseBlock {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl AnthropicMessagesResponse {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text.as_deref())
            .collect()
    }
}

/// Extract the text delta from one streaming event payload.
///
/// Only `content_block_delta` events of kind `text_delta` carry text; every
/// other event (`message_start`, `ping`, `message_stop`, ...) yields `None`.
pub fn stream_event_text(event: &Value) -> Option<&str> {
    if event.get("type").and_then(Value::as_str) != Some("content_block_delta") {
        return None;
    }
    let delta = event.get("delta")?;
    if delta.get("type").and_then(Value::as_str) != Some("text_delta") {
        return None;
    }
    delta.get("text").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stream_event_text_only_reads_text_deltas() {
        let delta = json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": "Hello"}
        });
        assert_eq!(stream_event_text(&delta), Some("Hello"));

        let ping = json!({"type": "ping"});
        assert_eq!(stream_event_text(&ping), None);

        let json_delta = json!({
            "type": "content_block_delta",
            "delta": {"type": "input_json_delta", "partial_json": "{"}
        });
        assert_eq!(stream_event_text(&json_delta), None);
    }

    #[test]
    fn image_block_wire_shape() {
        let block = AnthropicContentBlock::inline_image("image/jpeg", "AAAA");
        assert_eq!(
            serde_json::to_value(block).unwrap(),
            json!({"type": "image", "source": {"type": "base64", "media_type": "image/jpeg", "data": "AAAA"}})
        );
    }
}
