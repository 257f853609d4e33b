//! Referential integrity of the whole graph.
//!
//! Runs before any registered check: every reference must resolve and every
//! key must render without looping back on itself.

use std::collections::HashSet;

use concepta_core::concept::ReferenceKind;
use concepta_core::error::CoreError;
use concepta_core::graph::ConceptGraph;

use super::diagnostics::SemanticError;

/// Collects every dangling reference and key cycle in `graph`.
pub fn check_integrity(graph: &ConceptGraph) -> Vec<SemanticError> {
    let mut errors = Vec::new();
    let mut reported_cycles: HashSet<Vec<String>> = HashSet::new();

    for (id, concept) in graph.iter() {
        for (kind, property, target) in concept.references() {
            if graph.contains(target) {
                continue;
            }
            let property = match (kind, property) {
                (ReferenceKind::Declared, _) | (_, None) => "depends_on".to_string(),
                (_, Some(name)) => name.to_string(),
            };
            errors.push(SemanticError::DanglingReference {
                concept: graph.describe(id),
                property,
                target,
            });
        }

        if let Err(CoreError::DependencyCycle { members }) = graph.key_text(id) {
            // Every member of a cycle finds it; report each cycle once.
            let mut sorted = members.clone();
            sorted.sort();
            if reported_cycles.insert(sorted) {
                errors.push(SemanticError::KeyCycle { members });
            }
        }
    }

    errors
}
