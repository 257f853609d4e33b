//! Stable ID newtype for concepts in the graph arena.
//!
//! A [`ConceptId`] is an index into the [`ConceptGraph`](crate::graph::ConceptGraph)
//! arena. Ids are handed out in insertion order and never reused, so
//! comparing two ids compares their insertion order.

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Stable concept identifier. Maps to a petgraph `NodeIndex<u32>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConceptId(pub u32);

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Bridge between ConceptId and petgraph's NodeIndex<u32>.

impl From<NodeIndex<u32>> for ConceptId {
    fn from(idx: NodeIndex<u32>) -> Self {
        ConceptId(idx.index() as u32)
    }
}

impl From<ConceptId> for NodeIndex<u32> {
    fn from(id: ConceptId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concept_id_to_node_index_roundtrip() {
        let idx = NodeIndex::<u32>::new(42);
        let id = ConceptId::from(idx);
        assert_eq!(id.0, 42);

        let back: NodeIndex<u32> = id.into();
        assert_eq!(back.index(), 42);
    }

    #[test]
    fn concept_id_display() {
        assert_eq!(format!("{}", ConceptId(7)), "7");
    }

    #[test]
    fn ids_order_by_insertion() {
        assert!(ConceptId(1) < ConceptId(2));
    }

    #[test]
    fn serializes_as_plain_number() {
        let json = serde_json::to_string(&ConceptId(3)).unwrap();
        assert_eq!(json, "3");
    }
}
