//! # Offline Submission
//!
//! Provides offline-first writes: a write is delivered at once when the
//! backend is reachable, and otherwise queued durably and synchronized
//! later.
//!
//! ## Key Components
//!
//! - `queue.rs`: queued operation types and their lifecycle
//! - `retry.rs`: attempt ceiling and backoff strategies
//! - `OfflineManager`: the foreground surface (`enqueue_or_send`,
//!   `get_pending_count`, `request_manual_sync`, failed-item actions)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use postsync::client::{Config, HttpTransport, SyncContext};
//! use postsync::client::offline::Method;
//! use std::sync::Arc;
//!
//! # async fn example() -> postsync::shared::error::Result<()> {
//! let config = Config::new();
//! let transport = Arc::new(HttpTransport::new(config.clone()));
//! let context = SyncContext::open(config, transport).await?;
//! let manager = context.manager();
//!
//! let outcome = manager
//!     .enqueue_or_send("/posts", Method::Post, serde_json::json!({"title": "hi"}))
//!     .await?;
//! println!("{}", outcome.user_message());
//! # Ok(())
//! # }
//! ```

pub mod queue;
pub mod retry;

// Re-export main types
pub use queue::{Method, OperationId, OperationStatus, PendingOperation};
pub use retry::{BackoffStrategy, RetryPolicy, DEFAULT_MAX_ATTEMPTS};

use crate::client::api_client::{deliver_with_timeout, DeliveryRequest, DeliveryResponse, Transport};
use crate::client::local_db::LocalDatabase;
use crate::client::sync::background::{BackgroundCoordinator, SYNC_TAG};
use crate::client::sync::{ConnectivityMonitor, DrainOutcome, SyncEngine, SyncStatus};
use crate::shared::error::{Result, SyncError};
use crate::shared::event::SyncTrigger;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// What happened to a submitted write
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    /// The write was either delivered or durably queued
    pub accepted: bool,
    /// Outbox id when the write was queued
    pub id: Option<OperationId>,
    /// The write reached the backend right away
    pub immediate: bool,
    /// Response body of an immediate delivery
    pub response: Option<serde_json::Value>,
    /// Why the write could not be accepted
    pub error: Option<String>,
}

impl SubmitOutcome {
    fn sent(response: DeliveryResponse) -> Self {
        Self {
            accepted: true,
            id: None,
            immediate: true,
            response: response.body,
            error: None,
        }
    }

    fn queued(id: OperationId) -> Self {
        Self {
            accepted: true,
            id: Some(id),
            immediate: false,
            response: None,
            error: None,
        }
    }

    fn rejected(error: impl Into<String>) -> Self {
        Self {
            accepted: false,
            id: None,
            immediate: false,
            response: None,
            error: Some(error.into()),
        }
    }

    /// Whether the write is waiting in the outbox
    pub fn is_queued(&self) -> bool {
        self.accepted && !self.immediate
    }

    /// Message for the user; a queued write never reads as sent
    pub fn user_message(&self) -> String {
        if self.immediate {
            "Sent successfully.".to_string()
        } else if self.accepted {
            "Saved locally. It will be sent automatically when the connection returns."
                .to_string()
        } else {
            format!(
                "Could not save the write: {}",
                self.error.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

/// Foreground entry point to the offline machinery
#[derive(Debug, Clone)]
pub struct OfflineManager {
    db: LocalDatabase,
    transport: Arc<dyn Transport>,
    monitor: ConnectivityMonitor,
    engine: Arc<SyncEngine>,
    coordinator: Arc<BackgroundCoordinator>,
    delivery_timeout: Duration,
}

impl OfflineManager {
    pub fn new(
        db: LocalDatabase,
        transport: Arc<dyn Transport>,
        monitor: ConnectivityMonitor,
        engine: Arc<SyncEngine>,
        coordinator: Arc<BackgroundCoordinator>,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            db,
            transport,
            monitor,
            engine,
            coordinator,
            delivery_timeout,
        }
    }

    /// Check if the backend is currently reachable
    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    /// Deliver now when online, otherwise queue
    ///
    /// A failed immediate attempt also queues the write; that attempt is not
    /// counted against the ceiling. Only a store that cannot be used at all
    /// returns `Err`.
    pub async fn enqueue_or_send(
        &self,
        endpoint: &str,
        method: Method,
        payload: serde_json::Value,
    ) -> Result<SubmitOutcome> {
        if self.monitor.is_online() {
            let request = DeliveryRequest::new(endpoint, method, payload.clone());
            match deliver_with_timeout(self.transport.as_ref(), &request, self.delivery_timeout)
                .await
            {
                Ok(response) => {
                    tracing::info!(endpoint, method = %method, "delivered immediately");
                    return Ok(SubmitOutcome::sent(response));
                }
                Err(e) => {
                    tracing::warn!(endpoint, error = %e, "immediate delivery failed, queuing");
                }
            }
        } else {
            tracing::info!(endpoint, "offline, queuing write");
        }

        let id = match self.db.insert(endpoint, method, payload.clone()).await {
            Ok(id) => id,
            Err(e @ SyncError::StorageUnavailable { .. }) => return Err(e),
            Err(e @ SyncError::ValidationError { .. }) => return Err(e),
            Err(first) => {
                tracing::warn!(error = %first, "queuing failed, retrying once");
                match self.db.insert(endpoint, method, payload).await {
                    Ok(id) => id,
                    Err(e @ SyncError::StorageUnavailable { .. }) => return Err(e),
                    Err(e) => {
                        tracing::error!(error = %e, endpoint, "write could not be queued");
                        return Ok(SubmitOutcome::rejected(e.to_string()));
                    }
                }
            }
        };

        self.coordinator.register_sync_intent(SYNC_TAG).await;
        Ok(SubmitOutcome::queued(id))
    }

    /// Operations waiting for delivery
    pub async fn get_pending_count(&self) -> u64 {
        self.db.count(Some(OperationStatus::Pending)).await
    }

    /// Drain now
    pub async fn request_manual_sync(&self) -> DrainOutcome {
        self.engine.drain(SyncTrigger::Manual).await
    }

    /// Operations that reached the ceiling, oldest first
    pub async fn failed_items(&self) -> Vec<PendingOperation> {
        self.db.get_all(Some(OperationStatus::Failed)).await
    }

    /// Operations waiting for delivery, oldest first
    pub async fn pending_items(&self) -> Vec<PendingOperation> {
        self.db.get_all(Some(OperationStatus::Pending)).await
    }

    /// Put a failed operation back in the queue
    pub async fn retry_failed(&self, id: OperationId) -> Result<()> {
        let op = self.db.get(id).await?;
        if op.status != OperationStatus::Failed {
            return Err(SyncError::invalid_status(format!(
                "operation {} is {}, not failed",
                id, op.status
            )));
        }
        self.db.set_status(id, OperationStatus::Pending).await?;
        tracing::info!(id = %id, "failed operation queued for retry");
        Ok(())
    }

    /// Put every failed operation back in the queue
    pub async fn retry_all_failed(&self) -> Result<usize> {
        let failed = self.db.try_get_all(Some(OperationStatus::Failed)).await?;
        for op in &failed {
            self.db.set_status(op.id, OperationStatus::Pending).await?;
        }
        Ok(failed.len())
    }

    /// Drop one failed operation
    pub async fn discard_failed(&self, id: OperationId) -> Result<()> {
        let op = self.db.get(id).await?;
        if op.status != OperationStatus::Failed {
            return Err(SyncError::invalid_status(format!(
                "operation {} is {}, only failed operations can be discarded",
                id, op.status
            )));
        }
        self.db.remove(id).await?;
        tracing::info!(id = %id, "failed operation discarded");
        Ok(())
    }

    /// Drop every failed operation
    pub async fn purge_failed(&self) -> Result<u64> {
        self.db.clear(Some(OperationStatus::Failed)).await
    }

    /// Snapshot for the UI
    pub async fn sync_status(&self) -> SyncStatus {
        let stats = self.db.get_stats().await;
        let last_sync = match self.engine.last_sync_at().await {
            Some(at) => Some(at),
            None => self.db.get_last_sync_time().await,
        };
        SyncStatus {
            online: self.monitor.is_online(),
            is_syncing: self.engine.is_draining(),
            pending_operations: stats.pending,
            failed_operations: stats.failed,
            background_sync_supported: self.coordinator.is_supported(),
            last_sync,
        }
    }

    pub fn database(&self) -> &LocalDatabase {
        &self.db
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }
}
