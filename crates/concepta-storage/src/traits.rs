//! The [`OrderStore`] trait: persistence contract for order records.
//!
//! A compilation reads every record once at start and appends the new ones
//! once at the end, and only if it succeeded. Backends are swappable without
//! touching the pipeline.

use concepta_core::order::OrderRecord;

use crate::error::StorageError;

/// Persistent backing for the order repository.
pub trait OrderStore {
    /// All stored records, in insertion order.
    fn load_records(&self) -> Result<Vec<OrderRecord>, StorageError>;

    /// Appends `records` atomically.
    ///
    /// Re-appending a record that is already stored unchanged is a no-op. A
    /// record that gives a stored `(signature, logical_key)` another number,
    /// or reuses a number within its signature, is a
    /// [`StorageError::Conflict`] and nothing from the batch is written.
    fn append_records(&mut self, records: &[OrderRecord]) -> Result<(), StorageError>;
}
