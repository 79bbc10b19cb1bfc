//! # Foreground/Background Relay
//!
//! The background context has no access to the store. It drains through
//! [`RemoteQueue`], which turns every store interaction into a
//! [`CoordinatorMessage`]; the foreground answers through [`ForegroundRelay`],
//! the only side that touches the database.
//!
//! Messages travel as JSON text over an ordered channel pair, so outcomes
//! reported by the background are applied in the order they were sent.
//! Every `REQUEST_PENDING` carries a fresh id; a `DELIVER_PENDING` for an
//! older request (one that timed out) is dropped, never taken as current.
//! Replaying `ITEM_SYNCED` or `ITEM_ATTEMPT_FAILED` for a removed operation
//! is harmless: the foreground tolerates `ItemNotFound`.

use crate::client::local_db::LocalDatabase;
use crate::client::offline::queue::{OperationStatus, PendingOperation};
use crate::client::sync::engine::QueueBackend;
use crate::shared::error::{Result, SyncError};
use crate::shared::message::CoordinatorMessage;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Default wait for the foreground to answer `REQUEST_PENDING`
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// One end of the message channel
#[derive(Debug)]
pub struct Port {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl Port {
    /// Serialize and send a message
    pub fn post(&self, message: &CoordinatorMessage) -> Result<()> {
        let raw = message.encode()?;
        self.tx
            .send(raw)
            .map_err(|_| SyncError::channel_closed(format!("could not post {}", message.kind())))
    }

    /// Next raw message, `None` once the other end is gone
    pub async fn recv_raw(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }
}

/// Two connected ports: `(foreground, background)`
pub fn connect() -> (Port, Port) {
    let (to_background, from_foreground) = mpsc::unbounded_channel();
    let (to_foreground, from_background) = mpsc::unbounded_channel();
    (
        Port {
            tx: to_background,
            rx: Mutex::new(from_background),
        },
        Port {
            tx: to_foreground,
            rx: Mutex::new(from_foreground),
        },
    )
}

/// Foreground side: applies background requests to the store
#[derive(Debug)]
pub struct ForegroundRelay {
    db: LocalDatabase,
    port: Port,
}

impl ForegroundRelay {
    pub fn new(db: LocalDatabase, port: Port) -> Self {
        Self { db, port }
    }

    /// Apply one raw message; returns the reply to send, if any
    pub async fn handle(&self, raw: &str) -> Result<Option<CoordinatorMessage>> {
        match CoordinatorMessage::decode(raw)? {
            CoordinatorMessage::RequestPending { request_id } => {
                let items = self.db.get_all(Some(OperationStatus::Pending)).await;
                tracing::debug!(
                    request_id,
                    count = items.len(),
                    "sending pending operations to background"
                );
                Ok(Some(CoordinatorMessage::DeliverPending { request_id, items }))
            }
            CoordinatorMessage::ItemSynced { id } => {
                match self.db.remove(id).await {
                    Err(e) if e.is_not_found() => {
                        tracing::debug!(id = %id, "synced operation was already removed");
                    }
                    other => other?,
                }
                Ok(None)
            }
            CoordinatorMessage::ItemAttemptFailed {
                id,
                error,
                permanent,
            } => {
                let recorded = if permanent {
                    self.db.record_permanent_failure(id, &error).await
                } else {
                    self.db.record_attempt(id, false, Some(&error)).await
                };
                match recorded {
                    Err(e) if e.is_not_found() => {
                        tracing::debug!(id = %id, "failed operation no longer exists");
                    }
                    other => {
                        other?;
                    }
                }
                Ok(None)
            }
            CoordinatorMessage::DeliverPending { .. } => Err(SyncError::unknown_message(
                "DELIVER_PENDING is only sent by the foreground",
            )),
        }
    }

    /// Serve the background until its port is dropped
    pub async fn run(self) {
        while let Some(raw) = self.port.recv_raw().await {
            match self.handle(&raw).await {
                Ok(Some(reply)) => {
                    if let Err(e) = self.port.post(&reply) {
                        tracing::warn!(error = %e, "background went away");
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "rejected background message"),
            }
        }
        tracing::debug!("foreground relay stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Background side: a [`QueueBackend`] that talks to the foreground
#[derive(Debug)]
pub struct RemoteQueue {
    port: Port,
    max_attempts: u32,
    reply_timeout: Duration,
    next_request_id: AtomicU64,
}

impl RemoteQueue {
    pub fn new(port: Port, max_attempts: u32) -> Self {
        Self {
            port,
            max_attempts: max_attempts.max(1),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            next_request_id: AtomicU64::new(1),
        }
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    async fn request_pending(&self) -> Result<Vec<PendingOperation>> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        self.port
            .post(&CoordinatorMessage::RequestPending { request_id })?;

        let deadline = tokio::time::Instant::now() + self.reply_timeout;
        loop {
            let raw = match tokio::time::timeout_at(deadline, self.port.recv_raw()).await {
                Ok(Some(raw)) => raw,
                Ok(None) => return Err(SyncError::channel_closed("foreground went away")),
                Err(_) => {
                    return Err(SyncError::channel_closed(
                        "foreground did not answer REQUEST_PENDING",
                    ))
                }
            };
            match CoordinatorMessage::decode(&raw) {
                Ok(CoordinatorMessage::DeliverPending {
                    request_id: answered,
                    ..
                }) if answered != request_id => {
                    tracing::debug!(answered, request_id, "dropping stale pending reply");
                }
                Ok(CoordinatorMessage::DeliverPending { items, .. }) => {
                    return Ok(items
                        .into_iter()
                        .filter(PendingOperation::is_retry_eligible)
                        .collect());
                }
                Ok(other) => {
                    tracing::warn!(kind = other.kind(), "unexpected message from foreground");
                }
                Err(e) => tracing::warn!(error = %e, "rejected foreground message"),
            }
        }
    }
}

impl QueueBackend for RemoteQueue {
    fn pending(&self) -> BoxFuture<'_, Result<Vec<PendingOperation>>> {
        self.request_pending().boxed()
    }

    fn mark_delivered<'a>(&'a self, op: &'a PendingOperation) -> BoxFuture<'a, Result<()>> {
        let result = self.port.post(&CoordinatorMessage::ItemSynced { id: op.id });
        async move { result }.boxed()
    }

    fn mark_failed<'a>(
        &'a self,
        op: &'a PendingOperation,
        error: &'a str,
        give_up: bool,
    ) -> BoxFuture<'a, Result<OperationStatus>> {
        let result = self
            .port
            .post(&CoordinatorMessage::ItemAttemptFailed {
                id: op.id,
                error: error.to_string(),
                permanent: give_up,
            })
            .map(|()| {
                // Mirrors the store's ceiling rule.
                if give_up || op.attempts.saturating_add(1) >= self.max_attempts {
                    OperationStatus::Failed
                } else {
                    OperationStatus::Pending
                }
            });
        async move { result }.boxed()
    }

    fn record_last_sync(&self, _at: DateTime<Utc>) -> BoxFuture<'_, Result<()>> {
        // The foreground records its own drains.
        async { Ok(()) }.boxed()
    }
}
