use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// Basic (core) configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BasicConfig {
    /// HTTP server listen address (e.g., "0.0.0.0", "127.0.0.1").
    /// TOML: `basic.listen_addr`. Default: `0.0.0.0`.
    #[serde(default = "default_listen_ip")]
    pub listen_addr: IpAddr,

    /// HTTP server listen port.
    /// TOML: `basic.listen_port`. Default: `8000`.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Database URL for SQLite.
    /// TOML: `basic.database_url`. Default: `sqlite://cims.db`.
    #[serde(default)]
    pub database_url: String,

    /// Log level for tracing subscriber initialization (e.g., "error", "warn", "info", "debug", "trace").
    /// TOML: `basic.loglevel`. Default: `info`.
    #[serde(default)]
    pub loglevel: String,

    /// Drop the `Secure` attribute on the session cookie (plain-HTTP development only).
    /// TOML: `basic.insecure_cookie`. Default: `false`.
    #[serde(default)]
    pub insecure_cookie: bool,

    /// Base64 master key for the encrypted session cookie (at least 64 bytes decoded).
    /// When unset, a random key is generated and sessions do not survive a restart.
    #[serde(default)]
    pub cookie_secret: Option<String>,

    /// Session lifetime in hours. TOML: `basic.session_ttl_hours`. Default: `24`.
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    /// Allowed CORS origins. Empty mirrors the request origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_ip(),
            listen_port: default_listen_port(),
            database_url: "sqlite://cims.db".to_string(),
            loglevel: "info".to_string(),
            insecure_cookie: false,
            cookie_secret: None,
            session_ttl_hours: default_session_ttl_hours(),
            cors_origins: Vec::new(),
        }
    }
}

impl BasicConfig {
    /// Decoded cookie master key, if configured and long enough.
    pub fn cookie_key_bytes(&self) -> Option<Vec<u8>> {
        let raw = self.cookie_secret.as_deref()?.trim();
        let bytes = base64::engine::general_purpose::STANDARD.decode(raw).ok()?;
        (bytes.len() >= 64).then_some(bytes)
    }
}

/// Default IP address for the HTTP server listen address.
fn default_listen_ip() -> IpAddr {
    Ipv4Addr::new(0, 0, 0, 0).into()
}

/// Default port for the HTTP server.
fn default_listen_port() -> u16 {
    8000
}

fn default_session_ttl_hours() -> i64 {
    24
}
