//! SQLite implementation of [`OrderStore`].
//!
//! [`SqliteOrderStore`] keeps order records in one table with WAL mode and
//! automatic schema migrations. Every append runs in a single transaction:
//! either the whole batch lands or none of it does.

use rusqlite::{params, Connection, OptionalExtension};

use concepta_core::order::OrderRecord;

use crate::error::StorageError;
use crate::traits::OrderStore;

/// SQLite-backed order store.
pub struct SqliteOrderStore {
    conn: Connection,
}

impl SqliteOrderStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteOrderStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteOrderStore { conn })
    }
}

impl OrderStore for SqliteOrderStore {
    fn load_records(&self) -> Result<Vec<OrderRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT signature, logical_key, sequence FROM order_records ORDER BY rowid",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(OrderRecord {
                signature: row.get(0)?,
                logical_key: row.get(1)?,
                sequence: row.get(2)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn append_records(&mut self, records: &[OrderRecord]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;

        for record in records {
            let conflict = |reason: String| StorageError::Conflict {
                signature: record.signature.clone(),
                logical_key: record.logical_key.clone(),
                reason,
            };

            let stored: Option<u32> = tx
                .query_row(
                    "SELECT sequence FROM order_records WHERE signature = ?1 AND logical_key = ?2",
                    params![record.signature, record.logical_key],
                    |row| row.get(0),
                )
                .optional()?;
            match stored {
                Some(sequence) if sequence == record.sequence => continue,
                Some(sequence) => {
                    return Err(conflict(format!(
                        "stored sequence {} differs from {}",
                        sequence, record.sequence
                    )));
                }
                None => {}
            }

            let holder: Option<String> = tx
                .query_row(
                    "SELECT logical_key FROM order_records WHERE signature = ?1 AND sequence = ?2",
                    params![record.signature, record.sequence],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(other) = holder {
                return Err(conflict(format!(
                    "sequence {} is already assigned to '{}'",
                    record.sequence, other
                )));
            }

            tx.execute(
                "INSERT INTO order_records (signature, logical_key, sequence) VALUES (?1, ?2, ?3)",
                params![record.signature, record.logical_key, record.sequence],
            )?;
            inserted += 1;
        }

        // Dropping `tx` on an early return rolls the batch back.
        tx.commit()?;
        tracing::debug!(inserted, "appended order records");
        Ok(())
    }
}
