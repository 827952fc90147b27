use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for attachments; monitoring screenshots go under `monitoring/`.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Largest accepted upload in bytes. Default: 50 MiB.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,

    /// Monitoring uploads older than this many days are purged with their samples.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Seconds between retention sweeps.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_upload_size: default_max_upload_size(),
            retention_days: default_retention_days(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

impl StorageConfig {
    pub fn monitoring_dir(&self) -> PathBuf {
        self.upload_dir.join("monitoring")
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_max_upload_size() -> usize {
    50 * 1024 * 1024
}

fn default_retention_days() -> i64 {
    30
}

fn default_purge_interval_secs() -> u64 {
    86_400
}
