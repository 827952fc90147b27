use async_trait::async_trait;
use base64::Engine as _;
use cims_schema::{
    AnthropicMessagesRequest, AnthropicMessagesResponse, ExtractionPayload, GeminiGenerateRequest,
    GeminiGenerateResponse, OpenaiChatChunk, OpenaiChatRequest, OpenaiChatResponse,
    anthropic::{ANTHROPIC_VERSION, AnthropicContentBlock, AnthropicMessage, stream_event_text},
    gemini::GeminiPart,
    openai::{OpenaiContentPart, OpenaiMessage},
};
use eventsource_stream::Eventsource;
use futures::{TryStreamExt, future};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio_stream::StreamExt;
use tracing::{debug, error};
use url::Url;

use super::keys::{ResolvedKey, resolve_key};
use super::parse::{parse_json_object, strip_code_fence};
use super::prompts::METRIC_EXTRACTION_PROMPT;
use super::upstream::{post_json_with_retry, retry_policy};
use super::{LlmBackend, TextStream};
use crate::config::{LlmConfig, LlmProvider};
use crate::db::Db;
use crate::error::LlmError;

const CLAUDE_MAX_TOKENS: u32 = 4096;
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

const X_GOOG_API_KEY: HeaderName = HeaderName::from_static("x-goog-api-key");
const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
const ANTHROPIC_VERSION_HEADER: HeaderName = HeaderName::from_static("anthropic-version");

/// Image attached to a prompt, already base64-encoded.
struct InlineImage<'a> {
    mime_type: &'a str,
    data_b64: String,
}

/// Model backend calling the hosted provider APIs.
///
/// The provider and key are resolved from the database on every call, so key
/// changes made through the admin API apply to the next request.
#[derive(Clone)]
pub struct HostedLlm {
    db: Db,
    cfg: Arc<LlmConfig>,
    client: reqwest::Client,
}

impl HostedLlm {
    pub fn new(db: Db, cfg: LlmConfig) -> Result<Self, LlmError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("cims/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(5 * 60));

        if let Some(proxy_url) = cfg.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }

        let client = builder.http2_adaptive_window(true).build()?;

        Ok(Self {
            db,
            cfg: Arc::new(cfg),
            client,
        })
    }

    async fn resolve(&self) -> Result<ResolvedKey, LlmError> {
        let state = self
            .db
            .llm_key_state()
            .await
            .map_err(|e| LlmError::Unexpected(format!("Failed to load LLM settings: {e}")))?;
        resolve_key(&state, &self.cfg)
    }

    /// Send one user turn and return the raw upstream response.
    async fn send(
        &self,
        key: &ResolvedKey,
        prompt: &str,
        image: Option<InlineImage<'_>>,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let provider = key.provider;
        let model = self.cfg.model_for(provider).to_string();
        let base = self.cfg.base_url_for(provider);
        let retry = retry_policy(self.cfg.retry_max_times);
        let temperature = image.as_ref().map(|_| 0.0);

        debug!(
            provider = %provider,
            model = %model,
            stream,
            with_image = image.is_some(),
            "Dispatching model request"
        );

        match provider {
            LlmProvider::Openai => {
                let mut content = vec![OpenaiContentPart::text(prompt)];
                if let Some(img) = image {
                    content.push(OpenaiContentPart::inline_image(img.mime_type, &img.data_b64));
                }
                let body = OpenaiChatRequest {
                    model,
                    messages: vec![OpenaiMessage {
                        role: "user".to_string(),
                        content,
                    }],
                    temperature,
                    stream,
                };
                let url = base.join("v1/chat/completions")?;
                let headers = auth_headers(AUTHORIZATION, &format!("Bearer {}", key.api_key))?;
                post_json_with_retry("openai", &self.client, retry, &url, headers, &body).await
            }

            LlmProvider::Gemini => {
                let mut parts = vec![GeminiPart::text(prompt)];
                if let Some(img) = image {
                    parts.push(GeminiPart::inline(img.mime_type, img.data_b64));
                }
                let mut body = GeminiGenerateRequest::user_turn(parts);
                if let Some(t) = temperature {
                    body = body.with_temperature(t);
                }
                let url = gemini_url(base, &model, stream)?;
                let headers = auth_headers(X_GOOG_API_KEY, &key.api_key)?;
                post_json_with_retry("gemini", &self.client, retry, &url, headers, &body).await
            }

            LlmProvider::Claude => {
                let mut content = Vec::new();
                if let Some(img) = image {
                    content.push(AnthropicContentBlock::inline_image(img.mime_type, img.data_b64));
                }
                content.push(AnthropicContentBlock::text(prompt));
                let body = AnthropicMessagesRequest {
                    model,
                    max_tokens: CLAUDE_MAX_TOKENS,
                    messages: vec![AnthropicMessage {
                        role: "user".to_string(),
                        content,
                    }],
                    temperature,
                    stream,
                };
                let url = base.join("v1/messages")?;
                let mut headers = auth_headers(X_API_KEY, &key.api_key)?;
                headers.insert(
                    ANTHROPIC_VERSION_HEADER,
                    HeaderValue::from_static(ANTHROPIC_VERSION),
                );
                post_json_with_retry("claude", &self.client, retry, &url, headers, &body).await
            }
        }
    }

    async fn complete_with(
        &self,
        prompt: &str,
        image: Option<InlineImage<'_>>,
    ) -> Result<String, LlmError> {
        let key = self.resolve().await?;
        let resp = self.send(&key, prompt, image, false).await?;

        let text = match key.provider {
            LlmProvider::Openai => resp.json::<OpenaiChatResponse>().await?.text(),
            LlmProvider::Gemini => resp.json::<GeminiGenerateResponse>().await?.text(),
            LlmProvider::Claude => resp.json::<AnthropicMessagesResponse>().await?.text(),
        };
        Ok(text)
    }
}

#[async_trait]
impl LlmBackend for HostedLlm {
    async fn extract_metrics(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<ExtractionPayload, LlmError> {
        let data_b64 = base64::engine::general_purpose::STANDARD.encode(image);
        let text = self
            .complete_with(
                METRIC_EXTRACTION_PROMPT,
                Some(InlineImage {
                    mime_type,
                    data_b64,
                }),
            )
            .await?;

        Ok(parse_json_object::<ExtractionPayload>(&text).unwrap_or_else(|| {
            ExtractionPayload::failed(
                "Model output was not valid JSON",
                Some(strip_code_fence(&text).to_string()),
            )
        }))
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.complete_with(prompt, None).await
    }

    async fn stream(&self, prompt: &str) -> Result<TextStream, LlmError> {
        let key = self.resolve().await?;
        let provider = key.provider;
        let resp = self.send(&key, prompt, None, true).await?;

        let text = resp
            .bytes_stream()
            .eventsource()
            .map_err(|e| LlmError::StreamProtocolError(e.to_string()))
            .try_filter_map(move |event| future::ready(chunk_text(provider, &event.data)));

        let timed = text.timeout(STREAM_IDLE_TIMEOUT).map(|item| match item {
            Ok(chunk) => chunk,
            Err(_) => {
                error!("Upstream SSE stream timed out (idle > 60s)");
                Err(LlmError::StreamProtocolError(
                    "Stream idle timeout".to_string(),
                ))
            }
        });

        Ok(Box::pin(timed))
    }
}

fn auth_headers(name: HeaderName, value: &str) -> Result<HeaderMap, LlmError> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|_| LlmError::Unexpected("API key contains invalid header characters".to_string()))?;
    value.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert(name, value);
    Ok(headers)
}

fn gemini_url(base: &Url, model: &str, stream: bool) -> Result<Url, LlmError> {
    let mut url = if stream {
        base.join(&format!("v1beta/models/{model}:streamGenerateContent"))?
    } else {
        base.join(&format!("v1beta/models/{model}:generateContent"))?
    };
    if stream {
        url.query_pairs_mut().append_pair("alt", "sse");
    }
    Ok(url)
}

/// Visible text carried by one SSE `data:` payload, if any.
fn chunk_text(provider: LlmProvider, data: &str) -> Result<Option<String>, LlmError> {
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    match provider {
        LlmProvider::Openai => Ok(serde_json::from_str::<OpenaiChatChunk>(data)
            .ok()
            .and_then(|c| c.delta_text().map(str::to_string))),
        LlmProvider::Gemini => Ok(serde_json::from_str::<GeminiGenerateResponse>(data)
            .ok()
            .map(|r| r.text())
            .filter(|t| !t.is_empty())),
        LlmProvider::Claude => {
            let Ok(event) = serde_json::from_str::<Value>(data) else {
                return Ok(None);
            };
            if event.get("type").and_then(Value::as_str) == Some("error") {
                let message = event
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown stream error");
                return Err(LlmError::StreamProtocolError(message.to_string()));
            }
            Ok(stream_event_text(&event).map(str::to_string))
        }
    }
}
