//! Client Module
//!
//! The offline durability and synchronization engine.
//!
//! # Architecture
//!
//! - **`local_db`** - SQLite outbox (the durable store)
//! - **`offline`** - operation types, retry policy and the foreground `OfflineManager`
//! - **`sync`** - connectivity monitor, sync engine and background coordinator
//! - **`api_client`** - network transport seam and its `reqwest` implementation
//! - **`post_service`** - post creation on top of `OfflineManager`
//! - **`context`** - the composition root built once at startup
//!
//! # Module Structure
//!
//! ```text
//! client/
//! ├── mod.rs          - Module exports and documentation
//! ├── config.rs       - Server URL, token and author
//! ├── api_client.rs   - Transport trait and HTTP transport
//! ├── context.rs      - SyncContext
//! ├── post_service.rs - Post submission
//! ├── local_db/       - Durable store
//! ├── offline/        - Queue types, retry policy, OfflineManager
//! └── sync/           - Engine, monitor, coordinator, relay
//! ```

pub mod api_client;
pub mod config;
pub mod context;
pub mod local_db;
pub mod offline;
pub mod post_service;
pub mod sync;

// Re-export commonly used types
pub use api_client::{DeliveryError, DeliveryRequest, DeliveryResponse, HttpTransport, Transport};
pub use config::Config;
pub use context::{SyncContext, SyncHandles};
pub use local_db::LocalDatabase;
pub use offline::{
    Method, OfflineManager, OperationId, OperationStatus, PendingOperation, SubmitOutcome,
};
pub use post_service::{PostOutcome, PostService};
pub use sync::{ConnectivityMonitor, DrainOutcome, SyncConfig, SyncEngine};
