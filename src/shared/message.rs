//! Coordinator Message Protocol
//!
//! Messages exchanged between the foreground context, which owns the outbox
//! store, and the background context, which drains it. Each message is a
//! tagged union serialized as `{"type": ..., "payload": ...}`:
//!
//! | `type`                | direction             | payload            |
//! |-----------------------|-----------------------|--------------------|
//! | `REQUEST_PENDING`     | background → foreground | `{request_id}`   |
//! | `DELIVER_PENDING`     | foreground → background | `{request_id, items: [...]}` |
//! | `ITEM_SYNCED`         | background → foreground | `{id}`           |
//! | `ITEM_ATTEMPT_FAILED` | background → foreground | `{id, error, permanent}` |
//!
//! Kinds outside this table are rejected with `SyncError::UnknownMessage`.
//! A `DELIVER_PENDING` answers the `REQUEST_PENDING` with the same
//! `request_id`; the background discards replies to requests it gave up on.
use crate::client::offline::queue::{OperationId, PendingOperation};
use crate::shared::error::{Result, SyncError};
use serde::{Deserialize, Serialize};

const KNOWN_KINDS: [&str; 4] = [
    "REQUEST_PENDING",
    "DELIVER_PENDING",
    "ITEM_SYNCED",
    "ITEM_ATTEMPT_FAILED",
];

/// A message crossing the foreground/background boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorMessage {
    /// Ask the store owner for the current pending items
    RequestPending {
        #[serde(default)]
        request_id: u64,
    },
    /// Pending items, in creation order; may be empty
    DeliverPending {
        #[serde(default)]
        request_id: u64,
        items: Vec<PendingOperation>,
    },
    /// The item was delivered and can be removed
    ItemSynced { id: OperationId },
    /// The item's attempt failed and must be recorded
    ///
    /// `permanent` asks the store owner to give up on the item at once.
    ItemAttemptFailed {
        id: OperationId,
        error: String,
        #[serde(default)]
        permanent: bool,
    },
}

impl CoordinatorMessage {
    /// Wire name of this message kind
    pub fn kind(&self) -> &'static str {
        match self {
            CoordinatorMessage::RequestPending { .. } => KNOWN_KINDS[0],
            CoordinatorMessage::DeliverPending { .. } => KNOWN_KINDS[1],
            CoordinatorMessage::ItemSynced { .. } => KNOWN_KINDS[2],
            CoordinatorMessage::ItemAttemptFailed { .. } => KNOWN_KINDS[3],
        }
    }

    /// Serialize to the JSON wire form
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the JSON wire form
    ///
    /// Well-formed messages of an unknown kind report `UnknownMessage`; a
    /// known kind with a malformed payload reports `Serialization`.
    pub fn decode(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| SyncError::unknown_message("missing 'type' field"))?;
        if !KNOWN_KINDS.contains(&kind) {
            return Err(SyncError::unknown_message(kind.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }
}
