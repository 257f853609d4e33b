//! Dependency-respecting emission order.
//!
//! Every reference edge in the graph (key, property, declared) means "the
//! referencing concept depends on the referenced one". The order is a
//! topological sort over those edges; among concepts that are ready at the
//! same time the one inserted first wins, which makes the order a pure
//! function of the graph.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use concepta_core::error::CoreError;
use concepta_core::graph::ConceptGraph;
use concepta_core::id::ConceptId;

/// Topological order of all concepts, dependencies first.
///
/// A cycle is a [`CoreError::DependencyCycle`] naming its members in
/// insertion order.
pub fn dependency_order(graph: &ConceptGraph) -> Result<Vec<ConceptId>, CoreError> {
    let mut waiting: HashMap<ConceptId, usize> = HashMap::with_capacity(graph.len());
    let mut ready: BinaryHeap<Reverse<ConceptId>> = BinaryHeap::new();

    for (id, _) in graph.iter() {
        let deps = graph.dependencies(id).len();
        if deps == 0 {
            ready.push(Reverse(id));
        } else {
            waiting.insert(id, deps);
        }
    }

    let mut order = Vec::with_capacity(graph.len());
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id);
        for dependent in graph.dependents(id) {
            if let Some(count) = waiting.get_mut(&dependent) {
                *count -= 1;
                if *count == 0 {
                    waiting.remove(&dependent);
                    ready.push(Reverse(dependent));
                }
            }
        }
    }

    if !waiting.is_empty() {
        return Err(cycle_error(graph, &waiting));
    }

    tracing::debug!(concepts = order.len(), "computed dependency order");
    Ok(order)
}

/// Position of each concept in `order`.
pub fn ranks(order: &[ConceptId]) -> HashMap<ConceptId, usize> {
    order.iter().enumerate().map(|(rank, id)| (*id, rank)).collect()
}

/// Finds the earliest cycle among the concepts that could not be ordered.
fn cycle_error(graph: &ConceptGraph, stuck: &HashMap<ConceptId, usize>) -> CoreError {
    let mut members: Vec<ConceptId> = stuck.keys().copied().collect();
    members.sort();

    let mut sub: DiGraph<ConceptId, ()> = DiGraph::new();
    let nodes: HashMap<ConceptId, NodeIndex> =
        members.iter().map(|id| (*id, sub.add_node(*id))).collect();
    for id in &members {
        for dep in graph.dependencies(*id) {
            if let (Some(from), Some(to)) = (nodes.get(id), nodes.get(&dep)) {
                sub.add_edge(*from, *to, ());
            }
        }
    }

    // Stuck concepts that merely depend on a cycle form singleton components.
    let cycle = tarjan_scc(&sub)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            let mut ids: Vec<ConceptId> = component.iter().map(|n| sub[*n]).collect();
            ids.sort();
            ids
        })
        .min()
        .unwrap_or(members);

    CoreError::DependencyCycle {
        members: cycle.into_iter().map(|id| graph.describe(id)).collect(),
    }
}
