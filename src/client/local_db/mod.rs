//! # Local Database Module
//!
//! SQLite storage for the offline outbox. The database survives a full
//! restart of the application and is the only owner of persisted queue
//! state.
//!
//! ## Key Components
//!
//! - `LocalDatabase`: connection pool, schema management and sync metadata
//! - `schema.rs`: versioned, additive migrations
//! - `queue.rs`: outbox operations (`insert`, `get_all`, `remove`, `record_attempt`, ...)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use postsync::client::local_db::LocalDatabase;
//! use postsync::client::offline::Method;
//!
//! # async fn example() -> postsync::shared::error::Result<()> {
//! let db = LocalDatabase::open("/tmp/outbox.db").await?;
//! let id = db.insert("/posts", Method::Post, serde_json::json!({"title": "hi"})).await?;
//! let pending = db.get_all(None).await;
//! assert_eq!(pending[0].id, id);
//! # Ok(())
//! # }
//! ```

pub mod queue;
pub mod schema;

use crate::client::offline::retry::DEFAULT_MAX_ATTEMPTS;
use crate::shared::error::{Result, SyncError};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub use queue::OutboxStats;

/// Metadata key holding the RFC3339 time of the last completed drain
pub const LAST_SYNC_KEY: &str = "last_sync_time";

/// Local database connection manager
///
/// Cloning is cheap: clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
    max_attempts: u32,
}

impl LocalDatabase {
    /// Open or create the outbox database at `path`
    ///
    /// Creates the parent directory and the file if needed, enables WAL mode
    /// and applies pending migrations. Any failure to reach a usable file is
    /// reported as `StorageUnavailable`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SyncError::unavailable(format!("{}: {}", parent.display(), e))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .pragma("temp_store", "MEMORY");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| SyncError::unavailable(format!("{}: {}", path.display(), e)))?;

        tracing::debug!(path = %path.display(), "opened outbox database");
        Self::with_pool(pool).await
    }

    /// Open the database at the platform data directory
    pub async fn open_default() -> Result<Self> {
        Self::open(Self::default_path()).await
    }

    /// Open a private in-memory database
    ///
    /// Uses a single long-lived connection; the data disappears with the pool.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| SyncError::unavailable(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| SyncError::unavailable(e.to_string()))?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let db = Self {
            pool,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Set the attempt ceiling applied by `record_attempt`
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Attempt ceiling applied by `record_attempt`
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Get database file path
    ///
    /// Returns the platform-specific path for the outbox database file.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("postsync");
        path.push("outbox.db");
        path
    }

    /// Run database migrations
    ///
    /// Checks the current schema version and applies any pending migrations,
    /// each in its own transaction.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(schema::MIGRATIONS_TABLE)
            .execute(&self.pool)
            .await?;

        let current = self.schema_version().await?;
        for migration in schema::pending_migrations(current) {
            let mut tx = self.pool.begin().await?;
            for statement in migration.statements {
                sqlx::query(statement).execute(&mut *tx).await?;
            }
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(migration.version)
                .bind(chrono::Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::info!(
                version = migration.version,
                description = migration.description,
                "applied outbox migration"
            );
        }
        Ok(())
    }

    /// Highest applied schema version (0 for a fresh file)
    pub async fn schema_version(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COALESCE(MAX(version), 0) AS version FROM schema_migrations")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("version")?)
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every connection; later operations report `StorageUnavailable`
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Set sync metadata
    pub async fn set_sync_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_metadata (key, value, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get sync metadata
    pub async fn get_sync_metadata(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM sync_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    /// Get last sync timestamp
    pub async fn get_last_sync_time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self.get_sync_metadata(LAST_SYNC_KEY).await {
            Ok(Some(value)) => chrono::DateTime::parse_from_rfc3339(&value)
                .ok()
                .map(|t| t.with_timezone(&chrono::Utc)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "could not read last sync time");
                None
            }
        }
    }

    /// Set last sync timestamp
    pub async fn set_last_sync_time(&self, at: chrono::DateTime<chrono::Utc>) -> Result<()> {
        self.set_sync_metadata(LAST_SYNC_KEY, &at.to_rfc3339()).await
    }
}
