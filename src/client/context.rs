//! # Sync Context
//!
//! Built once at startup and handed to every component that needs the
//! store, the monitor, the engine or the coordinator. Tests build as many
//! isolated contexts as they like.
//!
//! ```text
//!  OfflineManager ──insert──▶ LocalDatabase ◀──relay── ForegroundRelay
//!        │                        ▲                        ▲  │
//!   manual sync              drain │                  JSON │  │ JSON
//!        ▼                        │                        │  ▼
//!    SyncEngine ◀── runtime ◀── ConnectivityMonitor    RemoteQueue
//!                      │                                    ▲
//!                      └── BackgroundCoordinator ── wake ──▶ background SyncEngine
//! ```

use crate::client::api_client::Transport;
use crate::client::config::Config;
use crate::client::local_db::LocalDatabase;
use crate::client::offline::OfflineManager;
use crate::client::post_service::PostService;
use crate::client::sync::background::BackgroundCoordinator;
use crate::client::sync::relay::{self, ForegroundRelay, RemoteQueue};
use crate::client::sync::{spawn_sync_runtime, ConnectivityMonitor, SyncConfig, SyncEngine};
use crate::shared::error::Result;
use crate::shared::event::SyncTrigger;
use futures_util::FutureExt;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Everything the offline machinery needs, wired together
#[derive(Debug, Clone)]
pub struct SyncContext {
    config: Config,
    sync_config: SyncConfig,
    db: LocalDatabase,
    monitor: ConnectivityMonitor,
    transport: Arc<dyn Transport>,
    engine: Arc<SyncEngine>,
    coordinator: Arc<BackgroundCoordinator>,
}

impl SyncContext {
    /// Open the configured database (or the platform default) and wire it up
    pub async fn open(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let db = match &config.app().database_path {
            Some(path) => LocalDatabase::open(path).await?,
            None => LocalDatabase::open_default().await?,
        };
        let sync_config = SyncConfig::from_app(config.app());
        Ok(Self::with_database(db, config, sync_config, transport))
    }

    /// Wire up an already opened database
    pub fn with_database(
        db: LocalDatabase,
        config: Config,
        sync_config: SyncConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let db = db.with_max_attempts(sync_config.retry.max_attempts);
        let engine = Arc::new(
            SyncEngine::new(Arc::new(db.clone()), Arc::clone(&transport))
                .with_policy(sync_config.retry.clone())
                .with_delivery_timeout(sync_config.delivery_timeout),
        );
        let coordinator = Arc::new(BackgroundCoordinator::new(sync_config.background_sync));

        Self {
            config,
            sync_config,
            db,
            monitor: ConnectivityMonitor::new(true),
            transport,
            engine,
            coordinator,
        }
    }

    /// Foreground surface
    pub fn manager(&self) -> OfflineManager {
        OfflineManager::new(
            self.db.clone(),
            Arc::clone(&self.transport),
            self.monitor.clone(),
            Arc::clone(&self.engine),
            Arc::clone(&self.coordinator),
            self.sync_config.delivery_timeout,
        )
    }

    pub fn post_service(&self) -> PostService {
        PostService::new(self.manager(), self.config.author())
    }

    /// Start the background machinery
    ///
    /// Spawns the sync runtime, the optional health probe and, when the
    /// host supports it, a background context that drains through the
    /// relay when woken. The background engine shares the foreground
    /// engine's drain guard and events, so every trigger source funnels
    /// into one drain at a time.
    pub async fn start(&self) -> SyncHandles {
        let mut handles = SyncHandles::default();

        if self.coordinator.is_supported() {
            let (foreground, background) = relay::connect();
            handles.push(ForegroundRelay::new(self.db.clone(), foreground).spawn());

            let queue = RemoteQueue::new(background, self.sync_config.retry.max_attempts)
                .with_reply_timeout(self.sync_config.reply_timeout);
            let background_engine = Arc::new(
                SyncEngine::new(Arc::new(queue), Arc::clone(&self.transport))
                    .with_policy(self.sync_config.retry.clone())
                    .with_delivery_timeout(self.sync_config.delivery_timeout)
                    .sharing_drains_with(&self.engine),
            );
            self.coordinator
                .on_wake_signal(move |signal| {
                    let engine = Arc::clone(&background_engine);
                    async move {
                        tracing::info!(tag = %signal.tag, "background context woken");
                        engine.drain(SyncTrigger::BackgroundWake).await;
                    }
                    .boxed()
                })
                .await;
        }

        handles.push(spawn_sync_runtime(
            Arc::clone(&self.engine),
            self.monitor.clone(),
            Arc::clone(&self.coordinator),
            self.sync_config.clone(),
        ));

        if let Some(interval) = self.sync_config.probe_interval {
            handles.push(self.monitor.spawn_probe(Arc::clone(&self.transport), interval));
        }

        tracing::info!(
            background_sync = self.coordinator.is_supported(),
            auto_sync = self.sync_config.auto_sync,
            "sync machinery started"
        );
        handles
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sync_config(&self) -> &SyncConfig {
        &self.sync_config
    }

    pub fn database(&self) -> &LocalDatabase {
        &self.db
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn coordinator(&self) -> &Arc<BackgroundCoordinator> {
        &self.coordinator
    }
}

/// Tasks spawned by [`SyncContext::start`]; aborted on drop
#[derive(Debug, Default)]
pub struct SyncHandles {
    tasks: Vec<JoinHandle<()>>,
}

impl SyncHandles {
    fn push(&mut self, handle: JoinHandle<()>) {
        self.tasks.push(handle);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop every task
    pub fn shutdown(&mut self) {
        for handle in self.tasks.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for SyncHandles {
    fn drop(&mut self) {
        self.shutdown();
    }
}
