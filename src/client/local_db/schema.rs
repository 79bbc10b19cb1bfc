//! Database Schema Definitions
//!
//! The outbox schema is versioned explicitly. Every migration is additive:
//! columns and indices are added, existing columns are never dropped or
//! retyped, and a migration that introduces a required value backfills the
//! existing rows in the same transaction.

/// A single schema migration
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Version recorded in `schema_migrations` once applied
    pub version: i64,
    /// Short description for logs
    pub description: &'static str,
    /// Statements executed in order inside one transaction
    pub statements: &'static [&'static str],
}

/// Bookkeeping table, created before any migration runs
pub const MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
)";

/// All migrations, oldest first
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "pending operations and sync metadata",
        statements: &[
            "CREATE TABLE IF NOT EXISTS pending_operations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                endpoint TEXT NOT NULL,
                method TEXT NOT NULL DEFAULT 'POST',
                payload TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                last_attempt_at INTEGER,
                attempts INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending'
            )",
            "CREATE INDEX IF NOT EXISTS idx_pending_operations_created_at
                ON pending_operations (created_at)",
            "CREATE INDEX IF NOT EXISTS idx_pending_operations_endpoint
                ON pending_operations (endpoint)",
            "CREATE TABLE IF NOT EXISTS sync_metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        ],
    },
    Migration {
        version: 2,
        description: "last error and idempotency key",
        statements: &[
            "ALTER TABLE pending_operations ADD COLUMN last_error TEXT",
            "ALTER TABLE pending_operations ADD COLUMN idempotency_key TEXT",
            "UPDATE pending_operations
                SET idempotency_key = lower(hex(randomblob(16)))
                WHERE idempotency_key IS NULL",
            "CREATE INDEX IF NOT EXISTS idx_pending_operations_status
                ON pending_operations (status)",
        ],
    },
];

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

/// Check if database needs migration
pub fn needs_migration(current_version: i64) -> bool {
    current_version < CURRENT_SCHEMA_VERSION
}

/// Get pending migrations
pub fn pending_migrations(current_version: i64) -> Vec<&'static Migration> {
    MIGRATIONS
        .iter()
        .filter(|m| m.version > current_version)
        .collect()
}
