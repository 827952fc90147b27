use chrono::{Duration as ChronoDuration, Utc};
use std::{io::ErrorKind, path::Path, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::StorageConfig;
use crate::db::Db;
use crate::error::CimsError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub uploads: usize,
    pub samples: u64,
    pub files: usize,
}

/// Delete monitoring uploads older than `retention_days`, their samples and stored files.
pub async fn purge_expired_uploads(db: &Db, retention_days: i64) -> Result<PurgeReport, CimsError> {
    let cutoff = Utc::now() - ChronoDuration::days(retention_days.max(0));
    let expired = db.monitoring_uploads_before(cutoff).await?;
    if expired.is_empty() {
        return Ok(PurgeReport::default());
    }

    let ids: Vec<i64> = expired.iter().map(|(id, _)| *id).collect();
    let samples = db.purge_monitoring_uploads(&ids).await?;

    let mut files = 0;
    for (_, path) in &expired {
        if remove_file_quietly(Path::new(path)).await {
            files += 1;
        }
    }

    let report = PurgeReport {
        uploads: ids.len(),
        samples,
        files,
    };
    info!(
        uploads = report.uploads,
        samples = report.samples,
        files = report.files,
        retention_days,
        "Expired monitoring uploads purged"
    );
    Ok(report)
}

/// Remove a stored file; missing files and IO errors are logged, never fatal.
pub async fn remove_file_quietly(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove stored file");
            false
        }
    }
}

/// Run [`purge_expired_uploads`] every `purge_interval_secs`, starting immediately.
pub fn spawn_retention_sweeper(db: Db, storage: &StorageConfig) -> JoinHandle<()> {
    let retention_days = storage.retention_days;
    let period = Duration::from_secs(storage.purge_interval_secs.max(60));

    tokio::spawn(async move {
        info!(retention_days, interval_secs = period.as_secs(), "Retention sweeper started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match purge_expired_uploads(&db, retention_days).await {
                Ok(report) if report == PurgeReport::default() => {
                    debug!("Retention sweep: nothing to purge");
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Retention sweep failed"),
            }
        }
    })
}
