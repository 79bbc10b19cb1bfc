//! Sync Event System
//!
//! Typed notifications emitted by the sync engine. Observers either register
//! callbacks on the engine or subscribe to its broadcast channel; both receive
//! the same `SyncEvent` values.
use crate::client::offline::queue::{OperationId, OperationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What asked for a drain
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    /// The connectivity monitor reported an offline to online transition
    ConnectivityRestored,
    /// The user asked to sync now
    Manual,
    /// The platform woke the background context
    BackgroundWake,
    /// A backoff timer fired after a drain that left failures
    Scheduled,
}

impl fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncTrigger::ConnectivityRestored => "connectivity_restored",
            SyncTrigger::Manual => "manual",
            SyncTrigger::BackgroundWake => "background_wake",
            SyncTrigger::Scheduled => "scheduled",
        };
        f.write_str(name)
    }
}

/// Counts from one completed drain
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    /// Items attempted
    pub processed: usize,
    /// Items delivered and removed
    pub success_count: usize,
    /// Items whose attempt failed
    pub error_count: usize,
}

impl DrainReport {
    /// Whether every attempted item was delivered
    pub fn is_clean(&self) -> bool {
        self.error_count == 0
    }
}

/// Event emitted by the sync engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncEvent {
    /// An operation moved along its lifecycle
    ItemStatusChanged {
        id: OperationId,
        from: OperationStatus,
        to: OperationStatus,
    },
    /// A drain ran to completion
    DrainComplete {
        trigger: SyncTrigger,
        report: DrainReport,
        finished_at: DateTime<Utc>,
    },
    /// A drain was requested while another one was running
    DrainSkipped { trigger: SyncTrigger },
}

impl SyncEvent {
    /// Create a status change event
    pub fn status_changed(id: OperationId, from: OperationStatus, to: OperationStatus) -> Self {
        Self::ItemStatusChanged { id, from, to }
    }

    /// Create a drain completion event stamped now
    pub fn drain_complete(trigger: SyncTrigger, report: DrainReport) -> Self {
        Self::DrainComplete {
            trigger,
            report,
            finished_at: Utc::now(),
        }
    }
}
