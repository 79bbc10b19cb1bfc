//! # Background Coordinator
//!
//! Stands in for the platform facility that wakes an inactive background
//! context when connectivity returns.
//!
//! ## Features
//!
//! - **Sync intents**: the foreground registers a tag after queuing work
//! - **Wake signals**: handlers registered by the background context run when
//!   a registered tag is woken
//! - **Graceful absence**: on a host without the facility registration
//!   reports `false` and the connectivity monitor remains the only trigger
//!
//! ## Usage
//!
//! ```rust,no_run
//! use postsync::client::sync::background::{BackgroundCoordinator, SYNC_TAG};
//! use futures_util::FutureExt;
//!
//! # async fn example() {
//! let coordinator = BackgroundCoordinator::new(true);
//! coordinator
//!     .on_wake_signal(|signal| async move { println!("woken by {}", signal.tag) }.boxed())
//!     .await;
//! coordinator.register_sync_intent(SYNC_TAG).await;
//! coordinator.on_connectivity_restored().await;
//! # }
//! ```

use futures_util::future::BoxFuture;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Tag registered after queuing a post
pub const SYNC_TAG: &str = "pending-posts-sync";

/// Delivered to wake handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeSignal {
    /// Tag the intent was registered under
    pub tag: String,
}

type WakeHandler = Arc<dyn Fn(WakeSignal) -> BoxFuture<'static, ()> + Send + Sync>;

/// Best-effort background wake facility
pub struct BackgroundCoordinator {
    supported: bool,
    intents: RwLock<BTreeSet<String>>,
    handlers: RwLock<Vec<WakeHandler>>,
}

impl std::fmt::Debug for BackgroundCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundCoordinator")
            .field("supported", &self.supported)
            .finish()
    }
}

impl BackgroundCoordinator {
    /// Create a coordinator; `supported` says whether the host can wake us
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            intents: RwLock::new(BTreeSet::new()),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// A coordinator for hosts without the facility
    pub fn unsupported() -> Self {
        Self::new(false)
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Ask to be woken when connectivity is next restored
    ///
    /// Returns `false` when the host cannot do this.
    pub async fn register_sync_intent(&self, tag: &str) -> bool {
        if !self.supported {
            tracing::debug!(tag, "background sync not supported, relying on connectivity trigger");
            return false;
        }
        let inserted = self.intents.write().await.insert(tag.to_string());
        if inserted {
            tracing::info!(tag, "registered background sync intent");
        }
        true
    }

    /// Tags waiting for a wake
    pub async fn pending_intents(&self) -> Vec<String> {
        self.intents.read().await.iter().cloned().collect()
    }

    /// Register a handler run for every wake signal
    pub async fn on_wake_signal<F>(&self, handler: F)
    where
        F: Fn(WakeSignal) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        self.handlers.write().await.push(Arc::new(handler));
    }

    /// Wake the background context for `tag`
    ///
    /// Consumes the intent registered under `tag`, if any. Returns the
    /// number of handlers run.
    pub async fn wake(&self, tag: &str) -> usize {
        if !self.supported {
            return 0;
        }
        self.intents.write().await.remove(tag);

        let handlers = self.handlers.read().await.clone();
        if handlers.is_empty() {
            tracing::warn!(tag, "wake signal with no background handler registered");
            return 0;
        }
        tracing::debug!(tag, handlers = handlers.len(), "delivering wake signal");
        for handler in &handlers {
            handler(WakeSignal {
                tag: tag.to_string(),
            })
            .await;
        }
        handlers.len()
    }

    /// Wake every registered intent
    ///
    /// Returns the number of intents woken; zero means the caller has to
    /// drain through another path.
    pub async fn on_connectivity_restored(&self) -> usize {
        if !self.supported {
            return 0;
        }
        let tags: Vec<String> = std::mem::take(&mut *self.intents.write().await)
            .into_iter()
            .collect();
        let mut woken = 0;
        for tag in tags {
            if self.wake(&tag).await > 0 {
                woken += 1;
            }
        }
        woken
    }
}
