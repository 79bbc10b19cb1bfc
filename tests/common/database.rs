//! Outbox fixtures
//!
//! Provides in-memory and file-backed outboxes and wired contexts for
//! integration tests.

use postsync::client::api_client::Transport;
use postsync::client::offline::retry::BackoffStrategy;
use postsync::client::offline::Method;
use postsync::client::sync::SyncConfig;
use postsync::client::{Config, LocalDatabase, OperationId, SyncContext};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A file-backed outbox that lives as long as the fixture
pub struct TestOutbox {
    dir: TempDir,
}

impl TestOutbox {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("outbox.db")
    }

    /// Open (or reopen) the database file
    pub async fn open(&self) -> LocalDatabase {
        LocalDatabase::open(self.path())
            .await
            .expect("Failed to open outbox")
    }
}

/// Sync settings for tests: short timeouts, no backoff, no probing
pub fn test_sync_config(background_sync: bool) -> SyncConfig {
    let mut config = SyncConfig {
        delivery_timeout: Duration::from_millis(500),
        background_sync,
        reply_timeout: Duration::from_secs(1),
        ..SyncConfig::default()
    };
    config.retry.backoff = BackoffStrategy::None;
    config
}

/// A context over a fresh in-memory outbox
pub async fn memory_context(transport: Arc<dyn Transport>, config: SyncConfig) -> SyncContext {
    let db = LocalDatabase::in_memory()
        .await
        .expect("Failed to open in-memory outbox");
    SyncContext::with_database(db, Config::new(), config, transport)
}

/// Queue one post per title, oldest first
pub async fn seed_posts(db: &LocalDatabase, titles: &[&str]) -> Vec<OperationId> {
    let mut ids = Vec::with_capacity(titles.len());
    for title in titles {
        let id = db
            .insert(
                &format!("/posts/{title}"),
                Method::Post,
                serde_json::json!({ "title": title }),
            )
            .await
            .expect("Failed to seed operation");
        ids.push(id);
    }
    ids
}
