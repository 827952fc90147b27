//! Database module: models, schema and queries for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `patch.rs`: create/patch payloads; `patch_impl.rs` writes them
//! - one file per resource family holding its queries as `impl Db` blocks

pub mod models;
pub mod patch;
pub mod schema;
pub mod seed;

mod alerts;
mod chat;
mod equipment;
mod inventory;
mod llm_keys;
mod metrics;
mod monitoring;
mod patch_impl;
mod users;

pub use alerts::AlertCreate;
pub use inventory::DeviceItemFilter;
pub use llm_keys::LlmKeyState;
pub use metrics::SampleFilter;
pub use monitoring::{ParseOutcome, UploadFilter};
pub use models::*;
pub use patch::{DbPatchable, ResourcePatch};
pub use schema::SQLITE_INIT;

use crate::error::CimsError;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{str::FromStr, time::Duration};
use tracing::info;

/// Cloneable handle to the SQLite pool. Every query lives on this type.
#[derive(Clone, Debug)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open (creating if missing) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, CimsError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;

        apply_schema(&pool).await?;

        info!("Database initialized");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply a partial update to an inventory record.
    pub async fn patch(&self, patch: ResourcePatch) -> Result<(), CimsError> {
        patch.apply_patch(&self.pool).await
    }
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), CimsError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
