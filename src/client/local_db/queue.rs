//! # Outbox Operations
//!
//! Durable storage of pending write operations. Each mutating call runs in
//! its own transaction so that no partial write is ever visible, including
//! to a second execution context holding another connection to the file.
//!
//! Reads through [`LocalDatabase::get_all`] and [`LocalDatabase::count`]
//! degrade to empty results when storage fails; writes always report.

use crate::client::local_db::LocalDatabase;
use crate::client::offline::queue::{Method, OperationId, OperationStatus, PendingOperation};
use crate::shared::error::{Result, SyncError};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, endpoint, method, payload, created_at, last_attempt_at,
    attempts, status, last_error, idempotency_key";

/// Counts of stored operations by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboxStats {
    /// Operations waiting for delivery
    pub pending: u64,
    /// Operations that reached the attempt ceiling
    pub failed: u64,
}

impl OutboxStats {
    /// All stored operations
    pub fn total(&self) -> u64 {
        self.pending + self.failed
    }
}

impl LocalDatabase {
    /// Queue a new operation
    ///
    /// The operation starts `pending` with zero attempts. Returns the id
    /// assigned by the store.
    pub async fn insert(
        &self,
        endpoint: &str,
        method: Method,
        payload: serde_json::Value,
    ) -> Result<OperationId> {
        if endpoint.trim().is_empty() {
            return Err(SyncError::validation("endpoint", "Endpoint cannot be empty"));
        }
        let payload = serde_json::to_string(&payload)?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO pending_operations
                (endpoint, method, payload, created_at, attempts, status, idempotency_key)
             VALUES (?, ?, ?, ?, 0, 'pending', ?)",
        )
        .bind(endpoint)
        .bind(method.as_str())
        .bind(&payload)
        .bind(Utc::now().timestamp_millis())
        .bind(Uuid::new_v4().to_string())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        let id = OperationId(result.last_insert_rowid());
        tracing::info!(id = %id, endpoint, method = %method, "queued operation");
        Ok(id)
    }

    /// Fetch one operation
    pub async fn get(&self, id: OperationId) -> Result<PendingOperation> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM pending_operations WHERE id = ?",
            SELECT_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_operation(&row),
            None => Err(SyncError::not_found(id.0)),
        }
    }

    /// All operations, optionally filtered by status, oldest first
    pub async fn try_get_all(&self, filter: Option<OperationStatus>) -> Result<Vec<PendingOperation>> {
        let rows = match filter {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {} FROM pending_operations WHERE status = ?
                     ORDER BY created_at ASC, id ASC",
                    SELECT_COLUMNS
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM pending_operations ORDER BY created_at ASC, id ASC",
                    SELECT_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(row_to_operation).collect()
    }

    /// All operations, optionally filtered by status, oldest first
    ///
    /// Returns an empty list when the store cannot be read.
    pub async fn get_all(&self, filter: Option<OperationStatus>) -> Vec<PendingOperation> {
        match self.try_get_all(filter).await {
            Ok(operations) => operations,
            Err(e) => {
                tracing::warn!(error = %e, "outbox read failed, returning no operations");
                Vec::new()
            }
        }
    }

    /// Operations targeting `endpoint`, oldest first
    pub async fn get_by_endpoint(&self, endpoint: &str) -> Vec<PendingOperation> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM pending_operations WHERE endpoint = ?
             ORDER BY created_at ASC, id ASC",
            SELECT_COLUMNS
        ))
        .bind(endpoint)
        .fetch_all(&self.pool)
        .await;

        let decoded = rows
            .map_err(SyncError::from)
            .and_then(|rows| rows.iter().map(row_to_operation).collect::<Result<Vec<_>>>());
        match decoded {
            Ok(operations) => operations,
            Err(e) => {
                tracing::warn!(error = %e, endpoint, "outbox read failed, returning no operations");
                Vec::new()
            }
        }
    }

    /// Number of operations, optionally filtered by status
    ///
    /// Returns 0 when the store cannot be read.
    pub async fn count(&self, filter: Option<OperationStatus>) -> u64 {
        let result: std::result::Result<(i64,), sqlx::Error> = match filter {
            Some(status) => {
                sqlx::query_as("SELECT COUNT(*) FROM pending_operations WHERE status = ?")
                    .bind(status.as_str())
                    .fetch_one(&self.pool)
                    .await
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM pending_operations")
                    .fetch_one(&self.pool)
                    .await
            }
        };
        match result {
            Ok((count,)) => count.max(0) as u64,
            Err(e) => {
                tracing::warn!(error = %e, "outbox count failed");
                0
            }
        }
    }

    /// Counts by status
    pub async fn get_stats(&self) -> OutboxStats {
        OutboxStats {
            pending: self.count(Some(OperationStatus::Pending)).await,
            failed: self.count(Some(OperationStatus::Failed)).await,
        }
    }

    /// Delete an operation
    ///
    /// Reports `ItemNotFound` when the id does not exist, including when it
    /// was already removed.
    pub async fn remove(&self, id: OperationId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM pending_operations WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::not_found(id.0));
        }
        tracing::debug!(id = %id, "removed operation");
        Ok(())
    }

    /// Record a resolved delivery attempt
    ///
    /// Increments `attempts` and stamps `last_attempt_at` in one statement.
    /// A failed attempt leaves the operation `pending`, or `failed` once the
    /// new count reaches the ceiling. A successful attempt keeps the status;
    /// the caller removes the operation. Returns the updated operation.
    pub async fn record_attempt(
        &self,
        id: OperationId,
        succeeded: bool,
        error: Option<&str>,
    ) -> Result<PendingOperation> {
        self.apply_attempt(id, succeeded, error, false).await
    }

    /// Record a failed attempt and give up on the operation
    ///
    /// Same write as a failed [`record_attempt`](Self::record_attempt), but
    /// the operation moves to `failed` whatever its attempt count.
    pub async fn record_permanent_failure(
        &self,
        id: OperationId,
        error: &str,
    ) -> Result<PendingOperation> {
        self.apply_attempt(id, false, Some(error), true).await
    }

    async fn apply_attempt(
        &self,
        id: OperationId,
        succeeded: bool,
        error: Option<&str>,
        give_up: bool,
    ) -> Result<PendingOperation> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "UPDATE pending_operations SET
                attempts = attempts + 1,
                last_attempt_at = ?,
                last_error = CASE WHEN ? THEN NULL ELSE ? END,
                status = CASE
                    WHEN ? THEN status
                    WHEN ? THEN 'failed'
                    WHEN attempts + 1 >= ? THEN 'failed'
                    ELSE 'pending'
                END
             WHERE id = ?
             RETURNING {}",
            SELECT_COLUMNS
        ))
        .bind(Utc::now().timestamp_millis())
        .bind(succeeded)
        .bind(error)
        .bind(succeeded)
        .bind(give_up)
        .bind(i64::from(self.max_attempts))
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        let operation = match row {
            Some(row) => row_to_operation(&row)?,
            None => return Err(SyncError::not_found(id.0)),
        };

        if operation.status == OperationStatus::Failed {
            tracing::warn!(
                id = %id,
                attempts = operation.attempts,
                "operation reached the attempt ceiling"
            );
        }
        Ok(operation)
    }

    /// Override the stored status
    ///
    /// Only `pending` and `failed` are stored. Resetting `failed` to
    /// `pending` is how a manual retry is requested.
    pub async fn set_status(&self, id: OperationId, status: OperationStatus) -> Result<()> {
        if !status.is_durable() {
            return Err(SyncError::invalid_status(format!(
                "'{}' cannot be stored",
                status
            )));
        }

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE pending_operations SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::not_found(id.0));
        }
        tracing::debug!(id = %id, status = %status, "status overridden");
        Ok(())
    }

    /// Remove every operation, or only those with `filter` status
    ///
    /// Returns the number of operations removed.
    pub async fn clear(&self, filter: Option<OperationStatus>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let result = match filter {
            Some(status) => {
                sqlx::query("DELETE FROM pending_operations WHERE status = ?")
                    .bind(status.as_str())
                    .execute(&mut *tx)
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM pending_operations")
                    .execute(&mut *tx)
                    .await?
            }
        };
        tx.commit().await?;

        tracing::info!(removed = result.rows_affected(), filter = ?filter, "cleared outbox");
        Ok(result.rows_affected())
    }
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| SyncError::storage(format!("timestamp out of range: {}", millis)))
}

fn row_to_operation(row: &SqliteRow) -> Result<PendingOperation> {
    let method: String = row.try_get("method")?;
    let status: String = row.try_get("status")?;
    let payload: String = row.try_get("payload")?;
    let created_at: i64 = row.try_get("created_at")?;
    let last_attempt_at: Option<i64> = row.try_get("last_attempt_at")?;
    let attempts: i64 = row.try_get("attempts")?;
    let idempotency_key: Option<String> = row.try_get("idempotency_key")?;

    let idempotency_key = match idempotency_key {
        Some(key) => Uuid::parse_str(&key)
            .map_err(|e| SyncError::storage(format!("bad idempotency key '{}': {}", key, e)))?,
        None => Uuid::nil(),
    };

    Ok(PendingOperation {
        id: OperationId(row.try_get("id")?),
        endpoint: row.try_get("endpoint")?,
        method: method.parse()?,
        payload: serde_json::from_str(&payload)?,
        created_at: millis_to_datetime(created_at)?,
        last_attempt_at: last_attempt_at.map(millis_to_datetime).transpose()?,
        attempts: u32::try_from(attempts).unwrap_or(0),
        status: status.parse()?,
        last_error: row.try_get("last_error")?,
        idempotency_key,
    })
}
