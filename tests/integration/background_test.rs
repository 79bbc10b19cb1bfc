//! Background context tests
//!
//! The background engine never touches the store: it drains through the
//! relay and the foreground applies every outcome.

use crate::common::*;
use postsync::client::offline::retry::BackoffStrategy;
use postsync::client::offline::Method;
use postsync::client::sync::relay::{self, ForegroundRelay, RemoteQueue};
use postsync::client::sync::{DrainOutcome, SyncEngine, SYNC_TAG};
use postsync::client::{LocalDatabase, OperationStatus};
use postsync::shared::event::SyncTrigger;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_wake_on_reconnect_drains_through_relay() {
    let transport = Arc::new(ScriptedTransport::new());
    let context = memory_context(transport.clone(), test_sync_config(true)).await;
    context.monitor().set_online(false);
    let _handles = context.start().await;

    let manager = context.manager();
    for title in ["one", "two"] {
        let outcome = assert_ok!(
            manager
                .enqueue_or_send("/posts", Method::Post, json!({ "title": title }))
                .await
        );
        assert!(outcome.is_queued());
    }
    assert_eq!(
        context.coordinator().pending_intents().await,
        vec![SYNC_TAG.to_string()]
    );

    context.monitor().set_online(true);

    assert_eventually!(manager.get_pending_count().await == 0);
    assert!(context.coordinator().pending_intents().await.is_empty());
    let titles: Vec<_> = transport
        .requests()
        .iter()
        .map(|request| request.payload["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("one"), json!("two")]);
    // The foreground engine stayed idle.
    assert_eq!(context.engine().metrics().await.total_drains, 0);
}

#[tokio::test]
async fn test_manual_sync_during_wake_is_absorbed() {
    let transport =
        Arc::new(ScriptedTransport::new().with_delay(Duration::from_millis(200)));
    let context = memory_context(transport.clone(), test_sync_config(true)).await;
    context.monitor().set_online(false);
    let _handles = context.start().await;

    let manager = context.manager();
    let outcome = assert_ok!(
        manager
            .enqueue_or_send("/posts", Method::Post, json!({ "title": "once" }))
            .await
    );
    assert!(outcome.is_queued());

    context.monitor().set_online(true);
    assert_eventually!(transport.call_count() == 1);

    assert_eq!(manager.request_manual_sync().await, DrainOutcome::Skipped);
    assert_eventually!(manager.get_pending_count().await == 0);
    assert_eq!(transport.call_count(), 1);
    assert_eq!(context.engine().metrics().await.skipped_drains, 1);
}

#[tokio::test]
async fn test_failed_wake_drain_schedules_follow_up() {
    let transport = Arc::new(ScriptedTransport::new().flaky("/posts/a"));
    let mut config = test_sync_config(true);
    config.retry.backoff = BackoffStrategy::Fixed {
        interval: Duration::from_millis(30),
    };
    let context = memory_context(transport.clone(), config).await;
    context.monitor().set_online(false);
    let _handles = context.start().await;

    let manager = context.manager();
    let outcome = assert_ok!(
        manager
            .enqueue_or_send("/posts/a", Method::Post, json!({ "title": "a" }))
            .await
    );
    assert!(outcome.is_queued());

    context.monitor().set_online(true);

    assert_eventually!(manager.get_pending_count().await == 0);
    assert_eq!(transport.endpoints(), vec!["/posts/a", "/posts/a"]);
    // The follow-up ran on the foreground engine.
    assert_eventually!(context.engine().metrics().await.total_drains == 1);
}

#[tokio::test]
async fn test_background_failures_are_recorded_by_foreground() {
    let transport = Arc::new(ScriptedTransport::new().reply("/posts/b", Reply::NetworkError));
    let db = assert_ok!(LocalDatabase::in_memory().await);
    let ids = seed_posts(&db, &["a", "b"]).await;

    let (foreground, background) = relay::connect();
    let relay_task = ForegroundRelay::new(db.clone(), foreground).spawn();
    let engine = SyncEngine::new(Arc::new(RemoteQueue::new(background, 3)), transport.clone());

    for _ in 0..3 {
        let report = engine.drain(SyncTrigger::BackgroundWake).await.report().unwrap();
        assert_eq!(report.error_count, 1);
    }

    assert_eventually!(matches!(
        db.get(ids[1]).await,
        Ok(op) if op.status == OperationStatus::Failed && op.attempts == 3
    ));
    assert!(db.get(ids[0]).await.is_err());
    assert_eq!(transport.endpoints(), vec!["/posts/a", "/posts/b", "/posts/b", "/posts/b"]);

    // A failed item is no longer handed to the background.
    let report = engine.drain(SyncTrigger::BackgroundWake).await.report().unwrap();
    assert_eq!(report.processed, 0);
    relay_task.abort();
}

#[tokio::test]
async fn test_permanent_rejection_gives_up_across_relay() {
    let transport = Arc::new(ScriptedTransport::new().reply("/posts/bad", Reply::Status(422)));
    let db = assert_ok!(LocalDatabase::in_memory().await);
    let ids = seed_posts(&db, &["bad"]).await;

    let (foreground, background) = relay::connect();
    let relay_task = ForegroundRelay::new(db.clone(), foreground).spawn();
    let mut config = test_sync_config(true);
    config.retry.give_up_on_permanent = true;
    let engine = SyncEngine::new(Arc::new(RemoteQueue::new(background, 3)), transport)
        .with_policy(config.retry);

    engine.drain(SyncTrigger::BackgroundWake).await;

    assert_eventually!(matches!(
        db.get(ids[0]).await,
        Ok(op) if op.status == OperationStatus::Failed && op.attempts == 1
    ));
    relay_task.abort();
}

#[tokio::test]
async fn test_background_drain_fails_cleanly_without_foreground() {
    let transport = Arc::new(ScriptedTransport::new());
    let (foreground, background) = relay::connect();
    drop(foreground);
    let engine = SyncEngine::new(Arc::new(RemoteQueue::new(background, 3)), transport.clone());

    let report = engine.drain(SyncTrigger::BackgroundWake).await.report().unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(transport.call_count(), 0);
}
