//! Shared Error Types
//!
//! This module defines the error taxonomy used by the outbox store, the sync
//! engine and the background coordinator.
//!
//! # Error Categories
//!
//! - `StorageUnavailable` - the local database cannot be opened or was closed
//! - `ItemNotFound` - an operation id that does not exist in the outbox
//! - `DeliveryFailed` - network, timeout or non-success response during an attempt
//! - `SyncAlreadyInProgress` - a drain was requested while another one is running
//! - `PermanentlyFailed` - the attempt ceiling was reached
//!
//! # Usage
//!
//! ```rust
//! use postsync::shared::error::SyncError;
//!
//! let error = SyncError::not_found(42);
//! assert!(error.is_not_found());
//! ```
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync` and can be safely shared across task boundaries.
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised by the offline outbox and its synchronization machinery
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The durable store is not available on this host
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        /// Human-readable error message
        message: String,
    },

    /// The store could not execute a statement
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable error message
        message: String,
    },

    /// The referenced operation does not exist
    #[error("Operation {id} not found")]
    ItemNotFound {
        /// The missing operation id
        id: i64,
    },

    /// A delivery attempt did not succeed
    #[error("Delivery failed: {message}")]
    DeliveryFailed {
        /// Human-readable error message
        message: String,
    },

    /// A drain was requested while another drain is running
    #[error("Synchronization already in progress")]
    SyncAlreadyInProgress,

    /// The operation reached the attempt ceiling
    #[error("Operation {id} permanently failed after {attempts} attempts")]
    PermanentlyFailed {
        /// The failed operation id
        id: i64,
        /// Attempts made
        attempts: u32,
    },

    /// A status value that cannot be written to the store
    #[error("Invalid status: {message}")]
    InvalidStatus {
        /// Human-readable error message
        message: String,
    },

    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },

    /// A coordinator message of a kind this build does not understand
    #[error("Unknown coordinator message: {message}")]
    UnknownMessage {
        /// Human-readable error message
        message: String,
    },

    /// The other side of a coordinator channel went away
    #[error("Channel closed: {message}")]
    ChannelClosed {
        /// Human-readable error message
        message: String,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable error message
        message: String,
    },
}

impl SyncError {
    /// Create a new storage-unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(id: i64) -> Self {
        Self::ItemNotFound { id }
    }

    /// Create a new delivery error
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            message: message.into(),
        }
    }

    /// Create a new invalid-status error
    pub fn invalid_status(message: impl Into<String>) -> Self {
        Self::InvalidStatus {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new unknown-message error
    pub fn unknown_message(message: impl Into<String>) -> Self {
        Self::UnknownMessage {
            message: message.into(),
        }
    }

    /// Create a new channel-closed error
    pub fn channel_closed(message: impl Into<String>) -> Self {
        Self::ChannelClosed {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error reports a missing operation
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ItemNotFound { .. })
    }

    /// Whether this error reports an unusable store
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::Io(_)
            | sqlx::Error::Configuration(_) => Self::unavailable(err.to_string()),
            other => Self::storage(other.to_string()),
        }
    }
}
