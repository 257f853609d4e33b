//! Storage error types for concepta-storage.
//!
//! [`StorageError`] covers the failure modes of persisting order records:
//! database access, schema migration, JSON snapshots, and records that
//! contradict what is already stored.

use thiserror::Error;

/// Errors produced by order store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record contradicts a stored one. Nothing from the batch was written.
    #[error("order record conflict for '{logical_key}' at {signature}: {reason}")]
    Conflict {
        signature: String,
        logical_key: String,
        reason: String,
    },
}
