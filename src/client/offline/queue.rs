//! # Outbox Operation Types
//!
//! Types describing a queued write operation and its lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! pending   --(attempt starts)-->                    in_flight
//! in_flight --(attempt succeeds)-->                  done (then deleted)
//! in_flight --(attempt fails, attempts < ceiling)--> pending
//! in_flight --(attempt fails, attempts == ceiling)-> failed
//! failed    --(manual retry requested)-->            pending
//! ```
//!
//! `in_flight` only ever exists in memory while a drain is delivering the
//! item. `done` is never stored: a delivered operation is deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::shared::error::SyncError;

/// Store-assigned identifier of a queued operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub i64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OperationId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A write operation waiting for delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    /// Identifier, assigned on insert and never reused
    pub id: OperationId,
    /// Target endpoint, relative to the API base URL or absolute
    pub endpoint: String,
    /// Write verb
    pub method: Method,
    /// Body delivered verbatim
    pub payload: serde_json::Value,
    /// When the operation was first queued
    pub created_at: DateTime<Utc>,
    /// When the last resolved attempt finished
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Resolved delivery attempts so far
    pub attempts: u32,
    /// Lifecycle status
    pub status: OperationStatus,
    /// Error message of the last failed attempt
    pub last_error: Option<String>,
    /// Sent as `Idempotency-Key` so the destination can discard replays
    pub idempotency_key: Uuid,
}

impl PendingOperation {
    /// Whether a drain may pick this operation up
    pub fn is_retry_eligible(&self) -> bool {
        self.status == OperationStatus::Pending
    }

    /// The user-facing error for an operation that gave up
    pub fn failure(&self) -> Option<SyncError> {
        (self.status == OperationStatus::Failed).then(|| SyncError::PermanentlyFailed {
            id: self.id.0,
            attempts: self.attempts,
        })
    }
}

/// Operation execution status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Waiting to be delivered
    Pending,
    /// Being delivered by the current drain
    InFlight,
    /// Gave up after reaching the attempt ceiling
    Failed,
    /// Delivered; the row is deleted
    Done,
}

impl OperationStatus {
    /// Name used in the database and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::InFlight => "in_flight",
            OperationStatus::Failed => "failed",
            OperationStatus::Done => "done",
        }
    }

    /// Whether the status may be written to the store
    pub fn is_durable(&self) -> bool {
        matches!(self, OperationStatus::Pending | OperationStatus::Failed)
    }

    /// Whether `self -> next` is an edge of the lifecycle
    pub fn can_transition_to(&self, next: OperationStatus) -> bool {
        use OperationStatus::*;
        matches!(
            (self, next),
            (Pending, InFlight)
                | (InFlight, Done)
                | (InFlight, Pending)
                | (InFlight, Failed)
                | (Failed, Pending)
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OperationStatus::Pending),
            "in_flight" => Ok(OperationStatus::InFlight),
            "failed" => Ok(OperationStatus::Failed),
            "done" => Ok(OperationStatus::Done),
            other => Err(SyncError::invalid_status(format!("unknown status '{}'", other))),
        }
    }
}

/// Write verb of a queued operation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Create
    #[default]
    Post,
    /// Replace
    Put,
    /// Partial update
    Patch,
    /// Delete
    Delete,
}

impl Method {
    /// HTTP verb
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(SyncError::validation("method", format!("unsupported method '{}'", other))),
        }
    }
}
