//! # Sync State
//!
//! Snapshot of the outbox and connectivity shown to the user.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Whether the backend is currently reachable
    pub online: bool,
    /// Whether a drain is running right now
    pub is_syncing: bool,
    /// Operations waiting for delivery
    pub pending_operations: u64,
    /// Operations that need the user to retry or discard them
    pub failed_operations: u64,
    /// Whether the background context can be woken by the platform
    pub background_sync_supported: bool,
    /// When the last drain finished
    pub last_sync: Option<DateTime<Utc>>,
}

impl SyncStatus {
    /// Whether anything still has to be delivered or decided
    pub fn has_outstanding_work(&self) -> bool {
        self.pending_operations > 0 || self.failed_operations > 0
    }

    /// Human-readable last sync time
    pub fn last_sync_label(&self) -> String {
        match self.last_sync {
            Some(at) => at.to_rfc3339(),
            None => "never".to_string(),
        }
    }
}
