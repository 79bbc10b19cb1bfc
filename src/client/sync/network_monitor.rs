//! # Network Monitor
//!
//! Single source of truth for "is the backend reachable".
//!
//! ## Features
//!
//! - **Connectivity Detection**: cached online/offline flag, O(1) to read
//! - **Change Notifications**: callbacks run once per transition, never for a repeated state
//! - **Async Subscription**: a `watch` receiver for the sync runtime
//! - **Health Probing**: optional loop feeding transport health checks into the flag
//!
//! The monitor performs no network I/O of its own. Platform connectivity
//! events, the probe loop or tests call [`ConnectivityMonitor::set_online`].

use crate::client::api_client::Transport;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

type ChangeListener = Arc<dyn Fn(bool) + Send + Sync>;

struct MonitorInner {
    state: watch::Sender<bool>,
    listeners: RwLock<Vec<ChangeListener>>,
}

/// Connectivity monitor
///
/// Cloning is cheap: clones observe and update the same state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .finish()
    }
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self {
            inner: Arc::new(MonitorInner {
                state,
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Current cached state
    pub fn is_online(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Register a callback run on every transition
    pub fn on_change<F>(&self, listener: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let mut listeners = match self.inner.listeners.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        listeners.push(Arc::new(listener));
    }

    /// Receiver that observes every transition
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }

    /// Feed a connectivity observation
    ///
    /// Returns whether the state changed. Listeners only run on a change.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.inner.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if !changed {
            return false;
        }

        if online {
            tracing::info!("connectivity restored");
        } else {
            tracing::info!("connectivity lost, queuing writes locally");
        }

        // Snapshot so a listener may register further listeners.
        let listeners: Vec<ChangeListener> = match self.inner.listeners.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for listener in listeners {
            listener(online);
        }
        true
    }

    /// Periodically probe the backend and feed the result into the monitor
    pub fn spawn_probe(&self, transport: Arc<dyn Transport>, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = transport.health_check().await;
                tracing::trace!(reachable, "health probe");
                monitor.set_online(reachable);
            }
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
