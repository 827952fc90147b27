use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Gemini,
    Openai,
    Claude,
}

impl LlmProvider {
    pub const ALL: [LlmProvider; 3] = [LlmProvider::Openai, LlmProvider::Gemini, LlmProvider::Claude];

    pub fn as_str(self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::Openai => "openai",
            LlmProvider::Claude => "claude",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gemini" => Some(LlmProvider::Gemini),
            "openai" => Some(LlmProvider::Openai),
            "claude" | "anthropic" => Some(LlmProvider::Claude),
            _ => None,
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model provider settings.
///
/// Keys stored through the admin API take precedence; the `*_api_key` values here
/// are only consulted when no key has been stored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Fallback provider when no key is stored. TOML: `llm.provider`. Default: `gemini`.
    #[serde(default)]
    pub provider: LlmProvider,

    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: Url,

    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: Url,

    #[serde(default)]
    pub claude_api_key: Option<String>,
    #[serde(default = "default_claude_model")]
    pub claude_model: String,
    #[serde(default = "default_claude_base_url")]
    pub claude_base_url: Url,

    /// Optional outbound proxy (e.g., "http://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Retries on upstream 5xx / transport errors.
    #[serde(default = "default_retry_max_times")]
    pub retry_max_times: usize,

    /// Screenshot extractions dispatched per second.
    #[serde(default = "default_extract_tps")]
    pub extract_tps: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            gemini_api_key: None,
            gemini_model: default_gemini_model(),
            gemini_base_url: default_gemini_base_url(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            openai_base_url: default_openai_base_url(),
            claude_api_key: None,
            claude_model: default_claude_model(),
            claude_base_url: default_claude_base_url(),
            proxy: None,
            retry_max_times: default_retry_max_times(),
            extract_tps: default_extract_tps(),
        }
    }
}

impl LlmConfig {
    /// Configured key for `provider`, ignoring blank values.
    pub fn api_key_for(&self, provider: LlmProvider) -> Option<&str> {
        let key = match provider {
            LlmProvider::Gemini => self.gemini_api_key.as_deref(),
            LlmProvider::Openai => self.openai_api_key.as_deref(),
            LlmProvider::Claude => self.claude_api_key.as_deref(),
        };
        key.map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn model_for(&self, provider: LlmProvider) -> &str {
        match provider {
            LlmProvider::Gemini => &self.gemini_model,
            LlmProvider::Openai => &self.openai_model,
            LlmProvider::Claude => &self.claude_model,
        }
    }

    pub fn base_url_for(&self, provider: LlmProvider) -> &Url {
        match provider {
            LlmProvider::Gemini => &self.gemini_base_url,
            LlmProvider::Openai => &self.openai_base_url,
            LlmProvider::Claude => &self.claude_base_url,
        }
    }
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_claude_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}

fn default_gemini_base_url() -> Url {
    Url::parse("https://generativelanguage.googleapis.com/").expect("valid default gemini url")
}

fn default_openai_base_url() -> Url {
    Url::parse("https://api.openai.com/").expect("valid default openai url")
}

fn default_claude_base_url() -> Url {
    Url::parse("https://api.anthropic.com/").expect("valid default claude url")
}

fn default_retry_max_times() -> usize {
    2
}

fn default_extract_tps() -> usize {
    2
}
