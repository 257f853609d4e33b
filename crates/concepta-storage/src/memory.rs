//! In-memory implementation of [`OrderStore`].
//!
//! Holds records in an `IndexMap` keyed by `(signature, logical_key)`, so
//! loading returns them in the order they were first appended. Useful for
//! tests and one-shot compilations; a JSON snapshot can carry the state
//! between processes.

use indexmap::IndexMap;

use concepta_core::order::OrderRecord;

use crate::error::StorageError;
use crate::traits::OrderStore;

type Records = IndexMap<(String, String), u32>;

/// Order records kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStore {
    records: Records,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        InMemoryOrderStore::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serializes all records as a JSON array.
    pub fn to_json(&self) -> Result<String, StorageError> {
        let records = self.load_records()?;
        Ok(serde_json::to_string_pretty(&records)?)
    }

    /// Restores a store from [`to_json`](Self::to_json) output.
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        let records: Vec<OrderRecord> = serde_json::from_str(json)?;
        let mut store = InMemoryOrderStore::new();
        store.append_records(&records)?;
        Ok(store)
    }

    /// Checks one record against the stored ones and the batch so far.
    ///
    /// Returns `false` for a record that is already present with the same
    /// sequence, either stored or earlier in the batch.
    fn check(&self, record: &OrderRecord, batch: &Records) -> Result<bool, StorageError> {
        let conflict = |reason: String| StorageError::Conflict {
            signature: record.signature.clone(),
            logical_key: record.logical_key.clone(),
            reason,
        };

        let key = (record.signature.clone(), record.logical_key.clone());
        if let Some(&stored) = self.records.get(&key).or_else(|| batch.get(&key)) {
            if stored != record.sequence {
                return Err(conflict(format!(
                    "stored sequence {} differs from {}",
                    stored, record.sequence
                )));
            }
            return Ok(false);
        }

        let taken = self
            .records
            .iter()
            .chain(batch.iter())
            .find(|((sig, _), seq)| *sig == record.signature && **seq == record.sequence)
            .map(|((_, logical_key), _)| logical_key.clone());
        if let Some(other) = taken {
            return Err(conflict(format!(
                "sequence {} is already assigned to '{}'",
                record.sequence, other
            )));
        }
        Ok(true)
    }
}

impl OrderStore for InMemoryOrderStore {
    fn load_records(&self) -> Result<Vec<OrderRecord>, StorageError> {
        Ok(self
            .records
            .iter()
            .map(|((signature, logical_key), sequence)| OrderRecord {
                signature: signature.clone(),
                logical_key: logical_key.clone(),
                sequence: *sequence,
            })
            .collect())
    }

    fn append_records(&mut self, records: &[OrderRecord]) -> Result<(), StorageError> {
        // Validate the whole batch before touching the map.
        let mut batch = Records::new();
        for record in records {
            if self.check(record, &batch)? {
                batch.insert(
                    (record.signature.clone(), record.logical_key.clone()),
                    record.sequence,
                );
            }
        }

        self.records.extend(batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, sequence: u32) -> OrderRecord {
        OrderRecord {
            signature: "sig".into(),
            logical_key: key.into(),
            sequence,
        }
    }

    #[test]
    fn append_then_load_preserves_order() {
        let mut store = InMemoryOrderStore::new();
        store.append_records(&[record("b", 1), record("a", 2)]).unwrap();

        let loaded = store.load_records().unwrap();
        assert_eq!(loaded, vec![record("b", 1), record("a", 2)]);
    }

    #[test]
    fn identical_reappend_is_noop() {
        let mut store = InMemoryOrderStore::new();
        store.append_records(&[record("a", 1)]).unwrap();
        store.append_records(&[record("a", 1)]).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn conflicting_batch_writes_nothing() {
        let mut store = InMemoryOrderStore::new();
        store.append_records(&[record("a", 1)]).unwrap();

        let err = store
            .append_records(&[record("b", 2), record("a", 5)])
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { ref logical_key, .. } if logical_key == "a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn reused_sequence_is_a_conflict() {
        let mut store = InMemoryOrderStore::new();
        store.append_records(&[record("a", 1)]).unwrap();
        assert!(store.append_records(&[record("b", 1)]).is_err());

        let mut fresh = InMemoryOrderStore::new();
        assert!(fresh.append_records(&[record("x", 3), record("y", 3)]).is_err());
        assert!(fresh.is_empty());
    }

    #[test]
    fn batch_repeating_a_key_with_another_sequence_is_a_conflict() {
        let mut store = InMemoryOrderStore::new();
        let err = store
            .append_records(&[record("a", 1), record("a", 2)])
            .unwrap_err();
        assert!(err.to_string().contains("stored sequence 1 differs from 2"));
        assert!(store.is_empty());

        store.append_records(&[record("a", 1), record("a", 1)]).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn json_snapshot_roundtrip() {
        let mut store = InMemoryOrderStore::new();
        store.append_records(&[record("a", 1), record("b", 2)]).unwrap();

        let restored = InMemoryOrderStore::from_json(&store.to_json().unwrap()).unwrap();
        assert_eq!(restored.load_records().unwrap(), store.load_records().unwrap());
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        let err = InMemoryOrderStore::from_json("{not json").unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }
}
