//! # Sync Engine
//!
//! Drains the outbox: every `pending` operation is delivered in creation
//! order, one at a time, and its outcome is written back through the
//! [`QueueBackend`].
//!
//! ## Drain algorithm
//!
//! 1. A drain requested while another one runs returns [`DrainOutcome::Skipped`]
//!    and attempts nothing. Engines built with [`SyncEngine::sharing_drains_with`]
//!    count as one for this check.
//! 2. Pending operations are fetched oldest first.
//! 3. Each operation is delivered with a timeout. A delivered operation is
//!    removed; a failed one has the attempt recorded, which may move it to
//!    `failed`. One failure never stops the rest of the drain.
//! 4. The drain time is recorded and a [`DrainReport`] returned.
//!
//! `in_flight` is only reported to observers; it is never stored, and
//! `attempts` only grows once an attempt has resolved.

use crate::client::api_client::{deliver_with_timeout, DeliveryRequest, Transport};
use crate::client::local_db::LocalDatabase;
use crate::client::offline::queue::{OperationId, OperationStatus, PendingOperation};
use crate::client::offline::retry::RetryPolicy;
use crate::client::sync::metrics::SyncMetrics;
use crate::shared::error::{Result, SyncError};
use crate::shared::event::{DrainReport, SyncEvent, SyncTrigger};
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

/// Default upper bound for one delivery attempt
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

const EVENT_CAPACITY: usize = 256;

/// Where the engine reads pending work from and writes outcomes to
///
/// The local store implements it directly; the background context uses a
/// message-passing proxy instead.
pub trait QueueBackend: Send + Sync {
    /// Pending operations, oldest first
    fn pending(&self) -> BoxFuture<'_, Result<Vec<PendingOperation>>>;

    /// The operation was delivered
    fn mark_delivered<'a>(&'a self, op: &'a PendingOperation) -> BoxFuture<'a, Result<()>>;

    /// The operation's attempt failed; returns the status it now has
    fn mark_failed<'a>(
        &'a self,
        op: &'a PendingOperation,
        error: &'a str,
        give_up: bool,
    ) -> BoxFuture<'a, Result<OperationStatus>>;

    /// Persist the end time of a drain
    fn record_last_sync(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<()>>;
}

impl QueueBackend for LocalDatabase {
    fn pending(&self) -> BoxFuture<'_, Result<Vec<PendingOperation>>> {
        self.try_get_all(Some(OperationStatus::Pending)).boxed()
    }

    fn mark_delivered<'a>(&'a self, op: &'a PendingOperation) -> BoxFuture<'a, Result<()>> {
        async move {
            match self.remove(op.id).await {
                Err(e) if e.is_not_found() => {
                    tracing::debug!(id = %op.id, "delivered operation was already removed");
                    Ok(())
                }
                other => other,
            }
        }
        .boxed()
    }

    fn mark_failed<'a>(
        &'a self,
        op: &'a PendingOperation,
        error: &'a str,
        give_up: bool,
    ) -> BoxFuture<'a, Result<OperationStatus>> {
        async move {
            let updated = if give_up {
                self.record_permanent_failure(op.id, error).await?
            } else {
                self.record_attempt(op.id, false, Some(error)).await?
            };
            Ok(updated.status)
        }
        .boxed()
    }

    fn record_last_sync(&self, at: DateTime<Utc>) -> BoxFuture<'_, Result<()>> {
        self.set_last_sync_time(at).boxed()
    }
}

/// Result of asking for a drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The drain ran
    Completed(DrainReport),
    /// Another drain was already running; nothing was attempted
    Skipped,
}

impl DrainOutcome {
    pub fn report(&self) -> Option<DrainReport> {
        match self {
            DrainOutcome::Completed(report) => Some(*report),
            DrainOutcome::Skipped => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DrainOutcome::Skipped)
    }

    /// The report, or `SyncAlreadyInProgress` for a skipped drain
    pub fn into_result(self) -> Result<DrainReport> {
        match self {
            DrainOutcome::Completed(report) => Ok(report),
            DrainOutcome::Skipped => Err(SyncError::SyncAlreadyInProgress),
        }
    }
}

type StatusListener = Arc<dyn Fn(OperationId, OperationStatus, OperationStatus) + Send + Sync>;
type DrainListener = Arc<dyn Fn(SyncTrigger, DrainReport) + Send + Sync>;

/// Resets the in-progress flag however the drain ends
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Outbox drain coordinator
pub struct SyncEngine {
    queue: Arc<dyn QueueBackend>,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    delivery_timeout: Duration,
    draining: Arc<AtomicBool>,
    last_sync_at: RwLock<Option<DateTime<Utc>>>,
    metrics: RwLock<SyncMetrics>,
    status_listeners: RwLock<Vec<StatusListener>>,
    drain_listeners: RwLock<Vec<DrainListener>>,
    events: broadcast::Sender<SyncEvent>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("policy", &self.policy)
            .field("delivery_timeout", &self.delivery_timeout)
            .field("draining", &self.is_draining())
            .finish()
    }
}

impl SyncEngine {
    pub fn new(queue: Arc<dyn QueueBackend>, transport: Arc<dyn Transport>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            queue,
            transport,
            policy: RetryPolicy::default(),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            draining: Arc::new(AtomicBool::new(false)),
            last_sync_at: RwLock::new(None),
            metrics: RwLock::new(SyncMetrics::new()),
            status_listeners: RwLock::new(Vec::new()),
            drain_listeners: RwLock::new(Vec::new()),
            events,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Share the in-progress guard and the event stream of `other`
    ///
    /// A drain on either engine then skips while the other one runs, and
    /// subscribers of either see both engines' events.
    pub fn sharing_drains_with(mut self, other: &SyncEngine) -> Self {
        self.draining = Arc::clone(&other.draining);
        self.events = other.events.clone();
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether a drain is running
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// End time of the last completed drain
    pub async fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        *self.last_sync_at.read().await
    }

    pub async fn metrics(&self) -> SyncMetrics {
        self.metrics.read().await.clone()
    }

    /// Whether retry-eligible operations are waiting
    pub async fn has_pending(&self) -> bool {
        matches!(self.queue.pending().await, Ok(items) if !items.is_empty())
    }

    /// Receive every event this engine emits
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Run `listener` on every status transition
    pub async fn on_item_status_changed<F>(&self, listener: F)
    where
        F: Fn(OperationId, OperationStatus, OperationStatus) + Send + Sync + 'static,
    {
        self.status_listeners.write().await.push(Arc::new(listener));
    }

    /// Run `listener` after every completed drain
    pub async fn on_drain_complete<F>(&self, listener: F)
    where
        F: Fn(SyncTrigger, DrainReport) + Send + Sync + 'static,
    {
        self.drain_listeners.write().await.push(Arc::new(listener));
    }

    /// Deliver every pending operation, unless a drain is already running
    pub async fn drain(&self, trigger: SyncTrigger) -> DrainOutcome {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(%trigger, "drain already in progress, skipping");
            self.metrics.write().await.record_drain_skipped();
            let _ = self.events.send(SyncEvent::DrainSkipped { trigger });
            return DrainOutcome::Skipped;
        }
        let _guard = DrainGuard(self.draining.as_ref());

        self.metrics.write().await.record_drain_start();
        let report = self.run_drain(trigger).await;
        let finished_at = Utc::now();

        *self.last_sync_at.write().await = Some(finished_at);
        if let Err(e) = self.queue.record_last_sync(finished_at).await {
            tracing::warn!(error = %e, "could not persist last sync time");
        }
        self.metrics.write().await.record_drain_complete(&report);

        tracing::info!(
            %trigger,
            processed = report.processed,
            succeeded = report.success_count,
            failed = report.error_count,
            "drain complete"
        );

        let listeners = self.drain_listeners.read().await.clone();
        for listener in listeners {
            listener(trigger, report);
        }
        let _ = self.events.send(SyncEvent::DrainComplete {
            trigger,
            report,
            finished_at,
        });

        DrainOutcome::Completed(report)
    }

    async fn run_drain(&self, trigger: SyncTrigger) -> DrainReport {
        let mut report = DrainReport::default();

        let operations = match self.queue.pending().await {
            Ok(operations) => operations,
            Err(e) => {
                tracing::error!(%trigger, error = %e, "could not read pending operations");
                return report;
            }
        };
        if operations.is_empty() {
            tracing::debug!(%trigger, "nothing to sync");
            return report;
        }
        tracing::info!(%trigger, count = operations.len(), "draining outbox");

        for op in &operations {
            report.processed += 1;
            if self.process(op).await {
                report.success_count += 1;
            } else {
                report.error_count += 1;
            }
        }
        report
    }

    /// Deliver one operation; returns whether it was delivered
    async fn process(&self, op: &PendingOperation) -> bool {
        self.emit_status(op.id, OperationStatus::Pending, OperationStatus::InFlight)
            .await;

        let request = DeliveryRequest::from(op);
        match deliver_with_timeout(self.transport.as_ref(), &request, self.delivery_timeout).await
        {
            Ok(response) => {
                tracing::info!(
                    id = %op.id,
                    endpoint = %op.endpoint,
                    status = response.status,
                    "operation delivered"
                );
                let next = match self.queue.mark_delivered(op).await {
                    Ok(()) => OperationStatus::Done,
                    Err(e) => {
                        // Stays pending; the idempotency key covers the replay.
                        tracing::error!(id = %op.id, error = %e, "could not remove delivered operation");
                        OperationStatus::Pending
                    }
                };
                self.emit_status(op.id, OperationStatus::InFlight, next).await;
                true
            }
            Err(delivery_error) => {
                let give_up = self.policy.give_up_on_permanent && delivery_error.is_permanent();
                let message = delivery_error.to_string();
                tracing::warn!(
                    id = %op.id,
                    endpoint = %op.endpoint,
                    attempt = op.attempts + 1,
                    error = %message,
                    "delivery failed"
                );

                let next = match self.queue.mark_failed(op, &message, give_up).await {
                    Ok(status) => status,
                    Err(e) => {
                        tracing::error!(id = %op.id, error = %e, "could not record failed attempt");
                        OperationStatus::Pending
                    }
                };
                if next == OperationStatus::Failed {
                    tracing::warn!(id = %op.id, "operation permanently failed, needs user action");
                }
                self.emit_status(op.id, OperationStatus::InFlight, next).await;
                false
            }
        }
    }

    async fn emit_status(&self, id: OperationId, from: OperationStatus, to: OperationStatus) {
        let listeners = self.status_listeners.read().await.clone();
        for listener in listeners {
            listener(id, from, to);
        }
        let _ = self.events.send(SyncEvent::status_changed(id, from, to));
    }
}
