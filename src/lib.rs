//! postsync - offline-first post submission and background sync
//!
//! Writes made while the backend is unreachable are saved to a durable
//! local outbox and delivered later, when connectivity returns, when the
//! user asks for it, or when a background context is woken.
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared by every context
//!   - Errors, configuration, sync events
//!   - The JSON messages exchanged between the foreground and the
//!     background context
//!
//! - **`client`** - The offline machinery
//!   - `local_db`: SQLite outbox
//!   - `sync`: connectivity monitor, drain engine, background coordinator
//!   - `offline`: the foreground surface (`OfflineManager`)
//!   - `post_service`: post creation on top of it
//!
//! # Usage
//!
//! ```rust,no_run
//! use postsync::client::{Config, HttpTransport, SyncContext};
//! use std::sync::Arc;
//!
//! # async fn example() -> postsync::shared::error::Result<()> {
//! let config = Config::new();
//! let transport = Arc::new(HttpTransport::new(config.clone()));
//! let context = SyncContext::open(config, transport).await?;
//! let _handles = context.start().await;
//!
//! let outcome = context.post_service().send_post("Hello", "First post").await?;
//! println!("{}", outcome.message);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod shared;
