//! # Post Service
//!
//! Post creation on top of [`OfflineManager`]: the post is published right
//! away when the backend answers and saved to the outbox otherwise.

use crate::client::offline::{Method, OfflineManager, OperationId, PendingOperation, SubmitOutcome};
use crate::shared::error::{Result, SyncError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Endpoint posts are created at
pub const POSTS_ENDPOINT: &str = "/posts";

/// Body of a created post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub author: String,
    /// RFC3339 creation time
    pub timestamp: String,
}

/// Result of `send_post`, ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostOutcome {
    /// Published right away
    pub success: bool,
    /// Saved to the outbox instead
    pub offline: bool,
    /// Outbox id when saved locally
    pub local_id: Option<OperationId>,
    pub message: String,
}

impl From<SubmitOutcome> for PostOutcome {
    fn from(outcome: SubmitOutcome) -> Self {
        let message = if outcome.immediate {
            "Post published successfully.".to_string()
        } else {
            outcome.user_message()
        };
        Self {
            success: outcome.immediate,
            offline: outcome.is_queued(),
            local_id: outcome.id,
            message,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostService {
    manager: OfflineManager,
    author: String,
}

impl PostService {
    pub fn new(manager: OfflineManager, author: impl Into<String>) -> Self {
        Self {
            manager,
            author: author.into(),
        }
    }

    /// Build the post body; empty titles and contents are rejected
    pub fn build_post(&self, title: &str, content: &str) -> Result<NewPost> {
        let title = title.trim();
        let content = content.trim();
        if title.is_empty() {
            return Err(SyncError::validation("title", "Title cannot be empty"));
        }
        if content.is_empty() {
            return Err(SyncError::validation("content", "Content cannot be empty"));
        }
        Ok(NewPost {
            title: title.to_string(),
            content: content.to_string(),
            author: self.author.clone(),
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    /// Publish a post, or save it for later when the backend is unreachable
    pub async fn send_post(&self, title: &str, content: &str) -> Result<PostOutcome> {
        let post = self.build_post(title, content)?;
        let payload = json!(post);
        let outcome = self
            .manager
            .enqueue_or_send(POSTS_ENDPOINT, Method::Post, payload)
            .await?;

        if outcome.is_queued() {
            tracing::info!(id = ?outcome.id, "post saved for background sync");
        }
        Ok(outcome.into())
    }

    /// Posts still waiting in the outbox
    pub async fn pending_posts(&self) -> Vec<PendingOperation> {
        self.manager.database().get_by_endpoint(POSTS_ENDPOINT).await
    }

    pub fn author(&self) -> &str {
        &self.author
    }
}
