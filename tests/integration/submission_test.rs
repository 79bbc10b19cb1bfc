//! Foreground submission tests
//!
//! `enqueue_or_send`, failed-item actions and the post service.

use crate::common::*;
use assert_matches::assert_matches;
use postsync::client::offline::Method;
use postsync::client::post_service::POSTS_ENDPOINT;
use postsync::client::sync::SYNC_TAG;
use postsync::client::OperationStatus;
use postsync::shared::error::SyncError;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_online_write_is_sent_immediately() {
    let transport = Arc::new(ScriptedTransport::new());
    let context = memory_context(transport.clone(), test_sync_config(true)).await;
    let manager = context.manager();

    let outcome = assert_ok!(
        manager
            .enqueue_or_send("/posts", Method::Post, json!({ "title": "now" }))
            .await
    );

    assert!(outcome.accepted && outcome.immediate);
    assert_eq!(outcome.response, Some(json!({ "ok": true })));
    assert_eq!(manager.get_pending_count().await, 0);
    assert_eq!(transport.call_count(), 1);
    assert!(context.coordinator().pending_intents().await.is_empty());
}

#[tokio::test]
async fn test_failed_immediate_attempt_queues_without_counting() {
    let transport = Arc::new(ScriptedTransport::new().reply("/posts", Reply::Status(503)));
    let context = memory_context(transport.clone(), test_sync_config(true)).await;
    let manager = context.manager();

    let outcome = assert_ok!(
        manager
            .enqueue_or_send("/posts", Method::Post, json!({ "title": "later" }))
            .await
    );

    assert!(outcome.is_queued());
    let op = assert_ok!(context.database().get(outcome.id.unwrap()).await);
    assert_eq!(op.attempts, 0);
    assert_eq!(op.status, OperationStatus::Pending);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_offline_write_is_queued_and_registers_intent() {
    let transport = Arc::new(ScriptedTransport::new());
    let context = memory_context(transport.clone(), test_sync_config(true)).await;
    context.monitor().set_online(false);
    let manager = context.manager();

    let outcome = assert_ok!(
        manager
            .enqueue_or_send("/posts", Method::Put, json!({ "title": "queued" }))
            .await
    );

    assert!(outcome.is_queued());
    assert_contains!(outcome.user_message(), "Saved locally");
    assert_eq!(transport.call_count(), 0);
    assert_eq!(
        context.coordinator().pending_intents().await,
        vec![SYNC_TAG.to_string()]
    );

    let op = assert_ok!(context.database().get(outcome.id.unwrap()).await);
    assert_eq!(op.method, Method::Put);
    assert_eq!(op.payload, json!({ "title": "queued" }));
}

#[tokio::test]
async fn test_unsupported_background_still_queues() {
    let context = memory_context(Arc::new(ScriptedTransport::new()), test_sync_config(false)).await;
    context.monitor().set_online(false);

    let outcome = assert_ok!(
        context
            .manager()
            .enqueue_or_send("/posts", Method::Post, json!({}))
            .await
    );
    assert!(outcome.is_queued());
    assert!(context.coordinator().pending_intents().await.is_empty());
}

#[tokio::test]
async fn test_empty_endpoint_is_rejected() {
    let context = memory_context(Arc::new(ScriptedTransport::unreachable()), test_sync_config(false)).await;
    context.monitor().set_online(false);

    let result = context
        .manager()
        .enqueue_or_send("  ", Method::Post, json!({}))
        .await;
    assert_err!(result, SyncError::ValidationError { .. });
}

#[tokio::test]
async fn test_closed_store_is_reported() {
    let context = memory_context(Arc::new(ScriptedTransport::new()), test_sync_config(false)).await;
    context.monitor().set_online(false);
    context.database().close().await;

    let result = context
        .manager()
        .enqueue_or_send("/posts", Method::Post, json!({}))
        .await;
    assert_err!(result, SyncError::StorageUnavailable { .. });
}

#[tokio::test]
async fn test_failed_item_actions() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .reply("/posts/a", Reply::NetworkError)
            .reply("/posts/b", Reply::NetworkError),
    );
    let context = memory_context(transport, test_sync_config(false)).await;
    let manager = context.manager();
    let ids = seed_posts(context.database(), &["a", "b", "c"]).await;

    // "c" is delivered on the first drain
    for _ in 0..3 {
        manager.request_manual_sync().await;
    }
    let failed: Vec<_> = manager.failed_items().await.iter().map(|op| op.id).collect();
    assert_eq!(failed, vec![ids[0], ids[1]]);

    let status = manager.sync_status().await;
    assert_eq!(status.pending_operations, 0);
    assert_eq!(status.failed_operations, 2);
    assert!(status.last_sync.is_some());
    assert!(!status.is_syncing);

    assert_ok!(manager.retry_failed(ids[0]).await);
    assert_matches!(
        manager.retry_failed(ids[0]).await,
        Err(SyncError::InvalidStatus { .. })
    );
    assert_matches!(
        manager.discard_failed(ids[0]).await,
        Err(SyncError::InvalidStatus { .. })
    );
    assert_eq!(manager.pending_items().await.len(), 1);

    assert_ok!(manager.discard_failed(ids[1]).await);
    assert_err!(context.database().get(ids[1]).await, SyncError::ItemNotFound { .. });
    assert_matches!(
        manager.discard_failed(ids[1]).await,
        Err(SyncError::ItemNotFound { .. })
    );
}

#[tokio::test]
async fn test_retry_and_purge_all_failed() {
    let transport = Arc::new(ScriptedTransport::unreachable());
    let context = memory_context(transport, test_sync_config(false)).await;
    let manager = context.manager();
    seed_posts(context.database(), &["a", "b"]).await;

    for _ in 0..3 {
        manager.request_manual_sync().await;
    }
    assert_eq!(manager.failed_items().await.len(), 2);

    assert_eq!(assert_ok!(manager.retry_all_failed().await), 2);
    assert_eq!(manager.get_pending_count().await, 2);

    for _ in 0..3 {
        manager.request_manual_sync().await;
    }
    assert_eq!(assert_ok!(manager.purge_failed().await), 2);
    assert_eq!(context.database().count(None).await, 0);
}

#[tokio::test]
async fn test_post_is_published_when_online() {
    let transport = Arc::new(ScriptedTransport::new());
    let context = memory_context(transport.clone(), test_sync_config(false)).await;
    let service = context.post_service();

    let outcome = assert_ok!(service.send_post("  Hello ", "First post").await);

    assert!(outcome.success);
    assert!(!outcome.offline);
    assert_eq!(outcome.local_id, None);
    let request = transport.requests().remove(0);
    assert_eq!(request.endpoint, POSTS_ENDPOINT);
    assert_eq!(request.payload["title"], "Hello");
    assert_eq!(request.payload["author"], "Usuario");
}

#[tokio::test]
async fn test_post_is_saved_when_offline() {
    let transport = Arc::new(ScriptedTransport::new());
    let context = memory_context(transport.clone(), test_sync_config(false)).await;
    context.monitor().set_online(false);
    let service = context.post_service();

    let outcome = assert_ok!(service.send_post("Hello", "Saved for later").await);

    assert!(!outcome.success);
    assert!(outcome.offline);
    assert_contains!(outcome.message, "Saved locally");
    let pending = service.pending_posts().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(Some(pending[0].id), outcome.local_id);
    assert_eq!(pending[0].payload["content"], "Saved for later");
    assert!(pending[0].payload["timestamp"].is_string());
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_blank_post_is_rejected_before_queuing() {
    let transport = Arc::new(ScriptedTransport::new());
    let context = memory_context(transport.clone(), test_sync_config(false)).await;
    let service = context.post_service();

    assert_matches!(
        service.send_post("   ", "body").await,
        Err(SyncError::ValidationError { field, .. }) if field == "title"
    );
    assert_matches!(
        service.send_post("title", "").await,
        Err(SyncError::ValidationError { field, .. }) if field == "content"
    );
    assert_eq!(transport.call_count(), 0);
    assert_eq!(context.database().count(None).await, 0);
}
