//! Restart durability tests
//!
//! Everything the outbox holds survives closing and reopening the file.

use crate::common::*;
use postsync::client::sync::SyncEngine;
use postsync::client::{LocalDatabase, OperationStatus};
use postsync::shared::event::SyncTrigger;
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn test_queue_survives_restart() {
    let outbox = TestOutbox::new();

    let (ids, before) = {
        let db = outbox.open().await;
        let ids = seed_posts(&db, &["a", "b"]).await;
        assert_ok!(db.record_attempt(ids[1], false, Some("timeout")).await);
        let before = db.get_all(None).await;
        db.close().await;
        (ids, before)
    };

    let db = outbox.open().await;
    let after = db.get_all(None).await;
    assert_eq!(after, before);
    assert_eq!(after[1].id, ids[1]);
    assert_eq!(after[1].attempts, 1);
    assert_eq!(after[1].last_error.as_deref(), Some("timeout"));
    assert_eq!(after[1].status, OperationStatus::Pending);
}

#[tokio::test]
async fn test_ids_are_never_reused_after_restart() {
    let outbox = TestOutbox::new();

    let last = {
        let db = outbox.open().await;
        let ids = seed_posts(&db, &["a", "b"]).await;
        assert_ok!(db.remove(ids[1]).await);
        db.close().await;
        ids[1]
    };

    let db = outbox.open().await;
    let next = seed_posts(&db, &["c"]).await[0];
    assert!(next > last, "{next} should be greater than {last}");
}

#[tokio::test]
async fn test_last_sync_time_survives_restart() {
    let outbox = TestOutbox::new();

    let finished = {
        let db = outbox.open().await;
        let engine = SyncEngine::new(Arc::new(db.clone()), Arc::new(ScriptedTransport::new()));
        engine.drain(SyncTrigger::Manual).await;
        let finished = engine.last_sync_at().await.unwrap();
        db.close().await;
        finished
    };

    let db = outbox.open().await;
    let stored = db.get_last_sync_time().await.unwrap();
    assert_eq!(stored.timestamp_millis(), finished.timestamp_millis());
}

#[tokio::test]
async fn test_reopen_does_not_reapply_migrations() {
    let outbox = TestOutbox::new();
    let version = {
        let db = outbox.open().await;
        let version = assert_ok!(db.schema_version().await);
        db.close().await;
        version
    };

    let db = assert_ok!(LocalDatabase::open(outbox.path()).await);
    assert_eq!(assert_ok!(db.schema_version().await), version);
}
