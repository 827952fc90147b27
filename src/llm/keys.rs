use crate::config::{LlmConfig, LlmProvider};
use crate::db::LlmKeyState;
use crate::error::LlmError;

pub const MULTIPLE_KEYS_UNSELECTED: &str = "Multiple API keys configured. Select one in Admin Hub.";
pub const SELECTED_KEY_MISSING: &str = "Selected API key not found. Update LLM settings.";

/// Provider and credential a request will be made with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub provider: LlmProvider,
    pub api_key: String,
}

/// Pick the key for the next model call.
///
/// Stored keys win over configuration: a single stored key is used as is, several
/// require a valid selection. Only when nothing is stored does the configured
/// provider and its configured key apply.
pub fn resolve_key(state: &LlmKeyState, cfg: &LlmConfig) -> Result<ResolvedKey, LlmError> {
    let chosen = match state.keys.as_slice() {
        [] => None,
        [only] => Some(only),
        keys => {
            let Some(selected) = state.selected_key_id else {
                return Err(LlmError::KeySelection(MULTIPLE_KEYS_UNSELECTED.to_string()));
            };
            let Some(key) = keys.iter().find(|k| k.id == selected) else {
                return Err(LlmError::KeySelection(SELECTED_KEY_MISSING.to_string()));
            };
            Some(key)
        }
    };

    match chosen {
        Some(key) => {
            let provider = LlmProvider::parse(&key.provider).unwrap_or_default();
            let api_key = key.api_key.trim();
            if api_key.is_empty() {
                return Err(LlmError::MissingApiKey(provider.to_string()));
            }
            Ok(ResolvedKey {
                provider,
                api_key: api_key.to_string(),
            })
        }
        None => {
            let provider = cfg.provider;
            cfg.api_key_for(provider)
                .map(|k| ResolvedKey {
                    provider,
                    api_key: k.to_string(),
                })
                .ok_or_else(|| LlmError::MissingApiKey(provider.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbLlmKey;
    use chrono::Utc;

    fn key(id: i64, provider: &str, api_key: &str) -> DbLlmKey {
        DbLlmKey {
            id,
            provider: provider.to_string(),
            label: None,
            api_key: api_key.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn single_stored_key_is_used_without_selection() {
        let state = LlmKeyState {
            keys: vec![key(7, "openai", "sk-one")],
            selected_key_id: None,
        };
        let got = resolve_key(&state, &LlmConfig::default()).unwrap();
        assert_eq!(got.provider, LlmProvider::Openai);
        assert_eq!(got.api_key, "sk-one");
    }

    #[test]
    fn several_keys_need_a_valid_selection() {
        let mut state = LlmKeyState {
            keys: vec![key(2, "claude", "b"), key(1, "gemini", "a")],
            selected_key_id: None,
        };
        let err = resolve_key(&state, &LlmConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), MULTIPLE_KEYS_UNSELECTED);

        state.selected_key_id = Some(99);
        let err = resolve_key(&state, &LlmConfig::default()).unwrap_err();
        assert_eq!(err.to_string(), SELECTED_KEY_MISSING);

        state.selected_key_id = Some(2);
        let got = resolve_key(&state, &LlmConfig::default()).unwrap();
        assert_eq!(got.provider, LlmProvider::Claude);
        assert_eq!(got.api_key, "b");
    }

    #[test]
    fn falls_back_to_configured_provider() {
        let state = LlmKeyState::default();
        let mut cfg = LlmConfig::default();
        let err = resolve_key(&state, &cfg).unwrap_err();
        assert_eq!(err.to_string(), "Missing API key for gemini");

        cfg.provider = LlmProvider::Openai;
        cfg.openai_api_key = Some("  sk-config  ".to_string());
        let got = resolve_key(&state, &cfg).unwrap();
        assert_eq!(got.provider, LlmProvider::Openai);
        assert_eq!(got.api_key, "sk-config");
    }
}
