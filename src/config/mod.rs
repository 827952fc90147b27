mod admin;
mod basic;
mod llm;
mod storage;

pub use admin::AdminConfig;
pub use basic::BasicConfig;
pub use llm::{LlmConfig, LlmProvider};
pub use storage::StorageConfig;

use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::LazyLock};

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core server configuration (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Bootstrap administrator account (see `admin` table).
    #[serde(default)]
    pub admin: AdminConfig,

    /// Upload storage and retention (see `storage` table).
    #[serde(default)]
    pub storage: StorageConfig,

    /// Model provider settings (see `llm` table).
    #[serde(default)]
    pub llm: LlmConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";

impl Config {
    /// Builds a Figment that merges defaults and a config TOML file.
    pub fn figment() -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment.merge(Toml::file(DEFAULT_CONFIG_FILE))
        } else {
            figment
        }
    }

    /// Loads configuration by merging defaults and `config.toml` if present.
    pub fn from_optional_toml() -> Self {
        Self::figment().extract().unwrap_or_else(|err| {
            panic!("failed to extract configuration (defaults + optional config.toml): {err}")
        })
    }
}

/// Global, lazily-initialized configuration instance.
pub static CONFIG: LazyLock<Config> = LazyLock::new(Config::from_optional_toml);

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Toml;

    #[test]
    fn defaults_survive_partial_toml() {
        let cfg: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(
                r#"
                [basic]
                listen_port = 9000

                [llm]
                provider = "claude"
                claude_api_key = "sk-ant-test"
                "#,
            ))
            .extract()
            .unwrap();

        assert_eq!(cfg.basic.listen_port, 9000);
        assert_eq!(cfg.basic.database_url, "sqlite://cims.db");
        assert_eq!(cfg.storage.retention_days, 30);
        assert_eq!(cfg.llm.provider, LlmProvider::Claude);
        assert_eq!(cfg.llm.api_key_for(LlmProvider::Claude), Some("sk-ant-test"));
        assert_eq!(cfg.llm.api_key_for(LlmProvider::Gemini), None);
    }
}
