//! # Background Sync
//!
//! Drains the outbox whenever connectivity returns, the user asks for it,
//! or the background context is woken.
//!
//! ## Architecture
//!
//! - **Network Monitor**: cached online flag and transition notifications
//! - **Engine**: the drain algorithm, with at most one drain in flight
//! - **Scheduler**: backoff for follow-up drains after failures
//! - **Background Coordinator**: best-effort wake of an independent context
//! - **Relay**: message passing between that context and the store owner
//! - **Sync State / Metrics**: what the UI and operators see
//!
//! ## Usage
//!
//! ```rust,no_run
//! use postsync::client::sync::{spawn_sync_runtime, ConnectivityMonitor, SyncConfig, SyncEngine};
//! use postsync::client::sync::background::BackgroundCoordinator;
//! use postsync::client::{HttpTransport, LocalDatabase, Config};
//! use std::sync::Arc;
//!
//! # async fn example() -> postsync::shared::error::Result<()> {
//! let db = LocalDatabase::open_default().await?;
//! let transport = Arc::new(HttpTransport::new(Config::new()));
//! let engine = Arc::new(SyncEngine::new(Arc::new(db), transport));
//! let monitor = ConnectivityMonitor::new(true);
//! let coordinator = Arc::new(BackgroundCoordinator::unsupported());
//!
//! let runtime = spawn_sync_runtime(engine, monitor, coordinator, SyncConfig::default());
//! # runtime.abort();
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod engine;
pub mod metrics;
pub mod network_monitor;
pub mod relay;
pub mod scheduler;
pub mod sync_state;

pub use background::{BackgroundCoordinator, WakeSignal, SYNC_TAG};
pub use engine::{DrainOutcome, QueueBackend, SyncEngine, DEFAULT_DELIVERY_TIMEOUT};
pub use metrics::SyncMetrics;
pub use network_monitor::ConnectivityMonitor;
pub use relay::{ForegroundRelay, RemoteQueue};
pub use scheduler::SyncScheduler;
pub use sync_state::SyncStatus;

use crate::client::offline::retry::RetryPolicy;
use crate::shared::config::AppConfig;
use crate::shared::event::{SyncEvent, SyncTrigger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Configuration for the sync machinery
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Drain automatically when connectivity returns
    pub auto_sync: bool,
    /// Ceiling, backoff and permanent-failure handling
    pub retry: RetryPolicy,
    /// Upper bound for one delivery attempt
    pub delivery_timeout: Duration,
    /// Health probe interval; `None` leaves connectivity to the host
    pub probe_interval: Option<Duration>,
    /// Whether the host can wake a background context
    pub background_sync: bool,
    /// Wait for the foreground to answer the background
    pub reply_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            retry: RetryPolicy::default(),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            probe_interval: None,
            background_sync: true,
            reply_timeout: relay::DEFAULT_REPLY_TIMEOUT,
        }
    }
}

impl SyncConfig {
    /// Take engine knobs from the application configuration
    pub fn from_app(app: &AppConfig) -> Self {
        let mut config = Self::default();
        if let Some(max_attempts) = app.max_attempts {
            config.retry.max_attempts = max_attempts;
        }
        if let Some(timeout_ms) = app.delivery_timeout_ms {
            config.delivery_timeout = Duration::from_millis(timeout_ms);
        }
        config.probe_interval = app.probe_interval_secs.map(Duration::from_secs);
        if let Some(auto_sync) = app.auto_sync {
            config.auto_sync = auto_sync;
        }
        config
    }
}

/// Drive the engine from connectivity changes and the backoff schedule
///
/// On an offline to online transition registered background intents are
/// woken first; when none were woken the engine drains directly. After a
/// drain that leaves pending operations behind a follow-up drain is
/// scheduled while the monitor reports online.
pub fn spawn_sync_runtime(
    engine: Arc<SyncEngine>,
    monitor: ConnectivityMonitor,
    coordinator: Arc<BackgroundCoordinator>,
    config: SyncConfig,
) -> JoinHandle<()> {
    // Subscribe before spawning so transitions right after the call are seen.
    let mut online_rx = monitor.subscribe();
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        let mut scheduler = SyncScheduler::new(config.retry.backoff.clone());

        loop {
            let next_drain_at = scheduler.next_drain_at();
            tokio::select! {
                changed = online_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let online = *online_rx.borrow_and_update();
                    if !online {
                        scheduler.reset();
                        continue;
                    }
                    if !config.auto_sync {
                        continue;
                    }
                    if coordinator.on_connectivity_restored().await == 0 {
                        engine.drain(SyncTrigger::ConnectivityRestored).await;
                    }
                }
                event = events.recv() => {
                    match event {
                        Ok(SyncEvent::DrainComplete { report, .. }) => {
                            let retry_eligible = monitor.is_online() && engine.has_pending().await;
                            scheduler.record_drain(&report, retry_eligible);
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "sync runtime lagged behind engine events");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                _ = sleep_until(next_drain_at) => {
                    if scheduler.take_due() && monitor.is_online() {
                        engine.drain(SyncTrigger::Scheduled).await;
                    }
                }
            }
        }
        tracing::debug!("sync runtime stopped");
    })
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
