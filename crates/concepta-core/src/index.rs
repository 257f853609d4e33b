//! Derived, cached views over a [`ConceptGraph`].
//!
//! An index is any type that can be built from a graph. The graph caches one
//! instance per index type (see [`ConceptGraph::index`]). Indices that can
//! absorb a single insertion are updated in place; the rest are rebuilt.

use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::concept::Concept;
use crate::concept_type::ConceptType;
use crate::graph::ConceptGraph;
use crate::id::ConceptId;

/// A view computed from the whole graph.
pub trait ConceptIndex: Send + Sync + 'static {
    fn build(graph: &ConceptGraph) -> Self;

    /// Updates the index for the just-inserted concept `id`. Returning
    /// `false` drops the cached copy so the next use rebuilds it.
    fn concept_added(&mut self, _graph: &ConceptGraph, _id: ConceptId) -> bool {
        false
    }
}

/// Concepts grouped by type, in insertion order.
#[derive(Debug, Default)]
pub struct ByType {
    by_type: IndexMap<ConceptType, Vec<ConceptId>>,
}

impl ByType {
    pub fn get(&self, concept_type: &ConceptType) -> &[ConceptId] {
        self.by_type
            .get(concept_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Types present in the graph, in order of first appearance.
    pub fn types(&self) -> impl Iterator<Item = &ConceptType> {
        self.by_type.keys()
    }
}

impl ConceptIndex for ByType {
    fn build(graph: &ConceptGraph) -> Self {
        let mut by_type: IndexMap<ConceptType, Vec<ConceptId>> = IndexMap::new();
        for (id, concept) in graph.iter() {
            by_type.entry(concept.concept_type.clone()).or_default().push(id);
        }
        ByType { by_type }
    }

    fn concept_added(&mut self, graph: &ConceptGraph, id: ConceptId) -> bool {
        let Some(concept) = graph.get(id) else {
            return false;
        };
        self.by_type.entry(concept.concept_type.clone()).or_default().push(id);
        true
    }
}

/// Reverse references: for each concept, the concepts that reference it.
#[derive(Debug, Default)]
pub struct Referrers {
    referrers: HashMap<ConceptId, SmallVec<[ConceptId; 4]>>,
}

impl Referrers {
    /// Concepts referencing `id`, in insertion order.
    pub fn get(&self, id: ConceptId) -> &[ConceptId] {
        self.referrers
            .get(&id)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    fn record(&mut self, id: ConceptId, concept: &Concept) {
        for (_, _, target) in concept.references() {
            let list = self.referrers.entry(target).or_default();
            if list.last() != Some(&id) {
                list.push(id);
            }
        }
    }

    /// Referrers of `id` having the given type.
    pub fn of_type<'a>(
        &'a self,
        graph: &'a ConceptGraph,
        id: ConceptId,
        concept_type: &'a ConceptType,
    ) -> impl Iterator<Item = ConceptId> + 'a {
        self.get(id).iter().copied().filter(move |referrer| {
            graph
                .get(*referrer)
                .is_some_and(|c| &c.concept_type == concept_type)
        })
    }
}

impl ConceptIndex for Referrers {
    fn build(graph: &ConceptGraph) -> Self {
        let mut index = Referrers::default();
        for (id, concept) in graph.iter() {
            index.record(id, concept);
        }
        index
    }

    fn concept_added(&mut self, graph: &ConceptGraph, id: ConceptId) -> bool {
        match graph.get(id) {
            Some(concept) => {
                self.record(id, concept);
                true
            }
            None => false,
        }
    }
}
