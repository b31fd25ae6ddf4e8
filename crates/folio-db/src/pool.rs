//! # Database Handle
//!
//! Opens the local store and hands out repositories.
//!
//! ## Where the Store Lives
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sync.toml [storage] database_path  ──┐                                │
//! │  FOLIO_DB_PATH                      ──┼──► DbConfig::new(path)          │
//! │  <data dir>/folio/folio.db (default)──┘         │                       │
//! │                                                  │                       │
//! │  tests ──────────────────────────────► DbConfig::in_memory()            │
//! │                                                  │                       │
//! │                                                  ▼                       │
//! │                          Database::new(config) ── open + migrate         │
//! │                                                  │                       │
//! │            ┌──────────────┬──────────────┬──────┴───────┐               │
//! │            ▼              ▼              ▼              ▼               │
//! │       documents()    sync_logs()    settings()      users()            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A file store runs in WAL mode so the drain loop can write while a CLI
//! command reads. Writers that collide wait up to [`BUSY_TIMEOUT`] instead of
//! failing with `SQLITE_BUSY`.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::document::DocumentRepository;
use crate::repository::settings::SettingsRepository;
use crate::repository::sync_log::SyncLogRepository;
use crate::repository::user::UserRepository;

/// How long a write waits on a locked database file.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connections for a file store: the drain task, the probe callbacks and
/// one foreground command.
const FILE_POOL_SIZE: u32 = 4;

// =============================================================================
// Configuration
// =============================================================================

/// Where the local store is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbConfig {
    /// A SQLite file, created on first open.
    File(PathBuf),
    /// A private in-memory store that lives as long as the [`Database`].
    Memory,
}

impl DbConfig {
    /// A file store at `path` (usually `SyncConfig::database_path()`).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig::File(path.into())
    }

    /// An in-memory store for tests.
    pub fn in_memory() -> Self {
        DbConfig::Memory
    }

    /// The database file, if this is a file store.
    pub fn path(&self) -> Option<&Path> {
        match self {
            DbConfig::File(path) => Some(path),
            DbConfig::Memory => None,
        }
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = SqliteConnectOptions::new()
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        match self {
            DbConfig::File(path) => options
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
            DbConfig::Memory => options.in_memory(true),
        }
    }

    /// Every connection to `:memory:` is a different database, so the memory
    /// store is pinned to one connection that is never recycled.
    fn pool_options(&self) -> SqlitePoolOptions {
        match self {
            DbConfig::File(_) => SqlitePoolOptions::new()
                .max_connections(FILE_POOL_SIZE)
                .acquire_timeout(BUSY_TIMEOUT * 2),
            DbConfig::Memory => SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .test_before_acquire(false)
                .idle_timeout(None)
                .max_lifetime(None),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository access.
///
/// Cheap to clone; every clone shares the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the store and applies any pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        match config.path() {
            Some(path) => info!(path = %path.display(), "Opening local store"),
            None => info!("Opening in-memory local store"),
        }

        let pool = config
            .pool_options()
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        migrations::run_migrations(&pool).await?;

        Ok(Database { pool })
    }

    /// The underlying pool, for statements no repository covers.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the document repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let dirty = db.documents().list_dirty().await?;
    /// ```
    pub fn documents(&self) -> DocumentRepository {
        DocumentRepository::new(self.pool.clone())
    }

    /// Returns the sync log (audit) repository.
    pub fn sync_logs(&self) -> SyncLogRepository {
        SyncLogRepository::new(self.pool.clone())
    }

    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.pool.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    /// Closes the pool. Later repository calls fail with `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing local store");
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::NewDocument;

    #[tokio::test]
    async fn test_in_memory_store_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert_eq!(db.documents().count_dirty().await.unwrap(), 0);
        assert!(db.settings().get("last_sync").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_store_survives_across_calls() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.documents().insert(&NewDocument::pending("a.pdf")).await.unwrap();

        let clone = db.clone();
        assert_eq!(clone.documents().list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_persists_between_opens() {
        let path = std::env::temp_dir().join(format!("folio-pool-{}.db", uuid::Uuid::new_v4()));
        let config = DbConfig::new(path.clone());
        assert_eq!(config.path(), Some(path.as_path()));

        let db = Database::new(config.clone()).await.unwrap();
        db.documents().insert(&NewDocument::pending("a.pdf")).await.unwrap();
        db.close().await;

        let reopened = Database::new(config).await.unwrap();
        let docs = reopened.documents().list_all().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].filename, "a.pdf");
        reopened.close().await;

        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[tokio::test]
    async fn test_closed_store_rejects_queries() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;
        assert!(db.documents().count_dirty().await.is_err());
    }

    #[test]
    fn test_memory_config_has_no_path() {
        assert_eq!(DbConfig::in_memory().path(), None);
    }
}
