//! Shared Module
//!
//! Types used on both sides of the foreground/background boundary: the error
//! taxonomy, the coordinator message protocol, sync events and application
//! configuration.

/// Coordinator message protocol
pub mod message;

/// Sync event types
pub mod event;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::{Result, SyncError};
pub use event::{DrainReport, SyncEvent, SyncTrigger};
pub use message::CoordinatorMessage;
