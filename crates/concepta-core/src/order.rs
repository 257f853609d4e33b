//! Order repository: stable sequence numbers for synthesized identities.
//!
//! A macro that invents a new identity (an index name, a generated
//! discriminator) asks the repository for a sequence number at its
//! *production site*: the rule plus the source concept it is expanding.
//! The site is hashed with blake3 into a signature. Within a signature each
//! logical key gets a number once, and the same number forever after:
//!
//! - known `(signature, logical key)`: the recorded number is reused,
//! - unknown: the next number for that signature (`max + 1`, starting at 1)
//!   is assigned and queued as pending.
//!
//! The repository only lives in memory. Loading prior records and flushing
//! the pending ones is done by the caller through a store backend.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One persisted assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Hex blake3 hash of the production site.
    pub signature: String,
    pub logical_key: String,
    pub sequence: u32,
}

/// The `(rule, source concept)` pair at which an identity is synthesized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionSite {
    pub rule: String,
    /// Description of the source concept, e.g. `Entity Book`.
    pub source: String,
}

impl ProductionSite {
    pub fn new(rule: impl Into<String>, source: impl Into<String>) -> Self {
        ProductionSite {
            rule: rule.into(),
            source: source.into(),
        }
    }

    /// Hex blake3 of the rule name and source description.
    pub fn signature(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.rule.as_bytes());
        // Separator so ("ab", "c") and ("a", "bc") differ.
        hasher.update(&[0]);
        hasher.update(self.source.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

/// In-memory view of all order records for one compilation.
#[derive(Debug, Clone, Default)]
pub struct OrderRepository {
    assigned: IndexMap<(String, String), u32>,
    highest: HashMap<String, u32>,
    pending: Vec<OrderRecord>,
}

impl OrderRepository {
    pub fn new() -> Self {
        OrderRepository::default()
    }

    /// Builds a repository from previously persisted records.
    pub fn from_records(records: impl IntoIterator<Item = OrderRecord>) -> Self {
        let mut repo = OrderRepository::new();
        for record in records {
            repo.remember(record);
        }
        repo
    }

    fn remember(&mut self, record: OrderRecord) {
        let highest = self.highest.entry(record.signature.clone()).or_insert(0);
        *highest = (*highest).max(record.sequence);
        self.assigned
            .insert((record.signature, record.logical_key), record.sequence);
    }

    /// The sequence number for `logical_key` at `site`, assigning one if new.
    pub fn sequence(&mut self, site: &ProductionSite, logical_key: &str) -> u32 {
        let signature = site.signature();
        let lookup = (signature, logical_key.to_string());
        if let Some(&sequence) = self.assigned.get(&lookup) {
            return sequence;
        }

        let sequence = self.highest.get(&lookup.0).copied().unwrap_or(0) + 1;
        let record = OrderRecord {
            signature: lookup.0,
            logical_key: lookup.1,
            sequence,
        };
        tracing::debug!(
            rule = %site.rule,
            source = %site.source,
            logical_key,
            sequence,
            "assigned new order record"
        );
        self.pending.push(record.clone());
        self.remember(record);
        sequence
    }

    /// Peeks at a recorded number without assigning.
    pub fn get(&self, site: &ProductionSite, logical_key: &str) -> Option<u32> {
        self.assigned
            .get(&(site.signature(), logical_key.to_string()))
            .copied()
    }

    /// Records assigned during this compilation and not yet flushed.
    pub fn pending(&self) -> &[OrderRecord] {
        &self.pending
    }

    /// Drains the pending records, e.g. after a successful flush.
    pub fn take_pending(&mut self) -> Vec<OrderRecord> {
        std::mem::take(&mut self.pending)
    }

    /// Every known record (loaded and assigned), in first-seen order.
    pub fn records(&self) -> Vec<OrderRecord> {
        self.assigned
            .iter()
            .map(|((signature, logical_key), sequence)| OrderRecord {
                signature: signature.clone(),
                logical_key: logical_key.clone(),
                sequence: *sequence,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}
