//! End-to-end drain scenarios
//!
//! Offline submission followed by an automatic drain, the attempt ceiling,
//! partial failure inside one drain, and overlapping triggers, from one
//! source or from several.

use crate::common::*;
use assert_matches::assert_matches;
use postsync::client::offline::Method;
use postsync::client::sync::{DrainOutcome, SyncEngine};
use postsync::client::{LocalDatabase, OperationId, OperationStatus};
use postsync::shared::error::SyncError;
use postsync::shared::event::{DrainReport, SyncTrigger};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Transitions = Arc<Mutex<Vec<(OperationId, OperationStatus, OperationStatus)>>>;

async fn engine_over(transport: Arc<ScriptedTransport>) -> (LocalDatabase, SyncEngine) {
    let db = assert_ok!(LocalDatabase::in_memory().await);
    let engine = SyncEngine::new(Arc::new(db.clone()), transport);
    (db, engine)
}

#[tokio::test]
async fn test_offline_item_is_delivered_when_connectivity_returns() {
    let transport = Arc::new(ScriptedTransport::new());
    let context = memory_context(transport.clone(), test_sync_config(false)).await;
    context.monitor().set_online(false);

    let transitions: Transitions = Arc::default();
    let recorded = Arc::clone(&transitions);
    context
        .engine()
        .on_item_status_changed(move |id, from, to| recorded.lock().unwrap().push((id, from, to)))
        .await;
    let _handles = context.start().await;

    let manager = context.manager();
    let outcome = assert_ok!(
        manager
            .enqueue_or_send("/posts", Method::Post, json!({ "title": "X" }))
            .await
    );
    assert!(outcome.is_queued());
    let id = outcome.id.unwrap();
    assert_eq!(transport.call_count(), 0);
    assert_eq!(manager.get_pending_count().await, 1);

    context.monitor().set_online(true);

    assert_eventually!(manager.get_pending_count().await == 0);
    assert_eventually!(transitions.lock().unwrap().len() == 2);
    assert_eq!(
        *transitions.lock().unwrap(),
        vec![
            (id, OperationStatus::Pending, OperationStatus::InFlight),
            (id, OperationStatus::InFlight, OperationStatus::Done),
        ]
    );
    assert_err!(
        context.database().get(id).await,
        SyncError::ItemNotFound { .. }
    );
    assert_eq!(transport.endpoints(), vec!["/posts"]);
}

#[tokio::test]
async fn test_item_fails_after_three_attempts_and_is_left_alone() {
    let transport = Arc::new(ScriptedTransport::new().reply("/posts/Y", Reply::NetworkError));
    let (db, engine) = engine_over(transport.clone()).await;
    let ids = seed_posts(&db, &["Y"]).await;

    for attempt in 1..=3u32 {
        let report = engine.drain(SyncTrigger::Manual).await.report().unwrap();
        assert_eq!(report.error_count, 1);
        let op = assert_ok!(db.get(ids[0]).await);
        assert_eq!(op.attempts, attempt);
    }

    let op = assert_ok!(db.get(ids[0]).await);
    assert_eq!(op.status, OperationStatus::Failed);
    assert_matches!(op.failure(), Some(SyncError::PermanentlyFailed { attempts: 3, .. }));
    assert_contains!(op.last_error.unwrap(), "connection refused");

    let report = engine.drain(SyncTrigger::Manual).await.report().unwrap();
    assert_eq!(report, DrainReport::default());
    assert_eq!(transport.call_count(), 3);
    assert_eq!(assert_ok!(db.get(ids[0]).await).attempts, 3);
}

#[tokio::test]
async fn test_one_failure_does_not_hold_back_the_rest() {
    let transport = Arc::new(ScriptedTransport::new().reply("/posts/Y", Reply::NetworkError));
    let (db, engine) = engine_over(transport.clone()).await;
    let ids = seed_posts(&db, &["X", "Y"]).await;

    let report = engine.drain(SyncTrigger::Manual).await.report().unwrap();
    assert_eq!(
        report,
        DrainReport {
            processed: 2,
            success_count: 1,
            error_count: 1,
        }
    );

    let remaining = db.get_all(None).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, ids[1]);
    assert_eq!(remaining[0].attempts, 1);
    assert_eq!(remaining[0].status, OperationStatus::Pending);
}

#[tokio::test]
async fn test_back_to_back_triggers_drain_once() {
    let transport =
        Arc::new(ScriptedTransport::new().with_delay(Duration::from_millis(50)));
    let (db, engine) = engine_over(transport.clone()).await;
    seed_posts(&db, &["a", "b", "c"]).await;

    let (first, second) = tokio::join!(
        engine.drain(SyncTrigger::ConnectivityRestored),
        engine.drain(SyncTrigger::Manual)
    );

    assert_matches!(first, DrainOutcome::Completed(report) if report.processed == 3);
    assert_eq!(second, DrainOutcome::Skipped);
    assert_matches!(second.into_result(), Err(SyncError::SyncAlreadyInProgress));
    assert_eq!(transport.call_count(), 3);
    assert_eq!(engine.metrics().await.skipped_drains, 1);
}

#[tokio::test]
async fn test_manual_sync_during_reconnect_drain_is_absorbed() {
    let transport =
        Arc::new(ScriptedTransport::new().with_delay(Duration::from_millis(200)));
    let context = memory_context(transport.clone(), test_sync_config(false)).await;
    context.monitor().set_online(false);
    let _handles = context.start().await;
    seed_posts(context.database(), &["a"]).await;

    context.monitor().set_online(true);
    assert_eventually!(transport.call_count() == 1);

    let manager = context.manager();
    assert_eq!(manager.request_manual_sync().await, DrainOutcome::Skipped);
    assert_eventually!(manager.get_pending_count().await == 0);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_drain_is_available_again_after_completion() {
    let transport = Arc::new(ScriptedTransport::new());
    let (db, engine) = engine_over(transport.clone()).await;

    seed_posts(&db, &["a"]).await;
    assert!(!engine.drain(SyncTrigger::Manual).await.is_skipped());
    assert!(!engine.is_draining());

    seed_posts(&db, &["b"]).await;
    assert!(!engine.drain(SyncTrigger::Manual).await.is_skipped());
    assert_eq!(transport.endpoints(), vec!["/posts/a", "/posts/b"]);
}

#[tokio::test]
async fn test_reset_item_is_attempted_again() {
    let transport = Arc::new(ScriptedTransport::new().reply("/posts/Y", Reply::NetworkError));
    let context = memory_context(transport.clone(), test_sync_config(false)).await;
    let manager = context.manager();
    let ids = seed_posts(context.database(), &["Y"]).await;

    for _ in 0..3 {
        manager.request_manual_sync().await;
    }
    assert_eq!(manager.failed_items().await.len(), 1);

    transport.set_reply("/posts/Y", Reply::Created);
    manager.request_manual_sync().await;
    assert_eq!(transport.call_count(), 3);

    assert_ok!(manager.retry_failed(ids[0]).await);
    let report = manager.request_manual_sync().await.report().unwrap();
    assert_eq!(report.success_count, 1);
    assert_eq!(context.database().count(None).await, 0);
}

#[tokio::test]
async fn test_removing_twice_reports_not_found() {
    let db = assert_ok!(LocalDatabase::in_memory().await);
    let ids = seed_posts(&db, &["a", "b"]).await;

    assert_ok!(db.remove(ids[0]).await);
    assert_matches!(db.remove(ids[0]).await, Err(SyncError::ItemNotFound { id }) if id == ids[0].0);

    let remaining = db.get_all(None).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, ids[1]);
}
