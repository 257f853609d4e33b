//! Semantic validation of the fixpoint concept graph.
//!
//! [`validate_graph`] runs the built-in integrity check and then every
//! registered [`SemanticCheck`] against every concept of its type. It does
//! NOT stop at the first failure: all errors are collected into one
//! [`ValidationReport`].
//!
//! Checks are pure; they read the graph but never modify it.

pub mod diagnostics;
pub mod integrity;

pub use diagnostics::{SemanticError, ValidationReport, Violation};
pub use integrity::check_integrity;

use std::sync::Arc;

use concepta_core::concept_type::ConceptType;
use concepta_core::graph::ConceptGraph;
use concepta_core::id::ConceptId;

/// A semantics check for one concept type.
///
/// Receives the whole read-only graph so it can relate the checked concept to
/// any other.
pub trait SemanticCheck: Send + Sync {
    fn name(&self) -> &str;

    fn concept_type(&self) -> ConceptType;

    fn check(&self, id: ConceptId, graph: &ConceptGraph) -> Result<(), Violation>;
}

/// Validates `graph` and reports ALL errors at once.
pub fn validate_graph(
    graph: &ConceptGraph,
    checks: &[Arc<dyn SemanticCheck>],
) -> Result<(), ValidationReport> {
    let mut errors = check_integrity(graph);

    for check in checks {
        for id in graph.of_type(&check.concept_type()) {
            if let Err(violation) = check.check(id, graph) {
                let mut concepts = Vec::with_capacity(violation.concepts.len() + 1);
                if !violation.concepts.contains(&id) {
                    concepts.push(graph.describe(id));
                }
                concepts.extend(violation.concepts.iter().map(|c| graph.describe(*c)));
                errors.push(SemanticError::InvariantViolated {
                    check: check.name().to_string(),
                    invariant: violation.invariant,
                    concepts,
                    message: violation.message,
                });
            }
        }
    }

    if errors.is_empty() {
        tracing::info!(concepts = graph.len(), checks = checks.len(), "validation passed");
        Ok(())
    } else {
        tracing::info!(errors = errors.len(), "validation failed");
        Err(ValidationReport { errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concepta_core::concept::ConceptSpec;

    /// Entities must not be named "Forbidden".
    struct NoForbidden;

    impl SemanticCheck for NoForbidden {
        fn name(&self) -> &str {
            "NoForbidden"
        }
        fn concept_type(&self) -> ConceptType {
            "Entity".into()
        }
        fn check(&self, id: ConceptId, graph: &ConceptGraph) -> Result<(), Violation> {
            let concept = graph.concept(id)?;
            if concept.text("name") == Some("Forbidden") {
                return Err(Violation::new("allowed name", "name 'Forbidden' is reserved"));
            }
            Ok(())
        }
    }

    /// Always fails, to check that every error is collected.
    struct AlwaysFails;

    impl SemanticCheck for AlwaysFails {
        fn name(&self) -> &str {
            "AlwaysFails"
        }
        fn concept_type(&self) -> ConceptType {
            "Entity".into()
        }
        fn check(&self, id: ConceptId, _graph: &ConceptGraph) -> Result<(), Violation> {
            Err(Violation::new("never", "always fails").concept(id))
        }
    }

    fn graph(names: &[&str]) -> ConceptGraph {
        let mut graph = ConceptGraph::new();
        for name in names {
            graph.add(&ConceptSpec::new("Entity").key("name", *name)).unwrap();
        }
        graph
    }

    #[test]
    fn passing_checks_return_ok() {
        let checks: Vec<Arc<dyn SemanticCheck>> = vec![Arc::new(NoForbidden)];
        assert!(validate_graph(&graph(&["Book", "Author"]), &checks).is_ok());
    }

    #[test]
    fn violation_names_concept_and_invariant() {
        let checks: Vec<Arc<dyn SemanticCheck>> = vec![Arc::new(NoForbidden)];
        let report = validate_graph(&graph(&["Book", "Forbidden"]), &checks).unwrap_err();

        assert_eq!(
            report.errors,
            vec![SemanticError::InvariantViolated {
                check: "NoForbidden".into(),
                invariant: "allowed name".into(),
                concepts: vec!["Entity Forbidden".into()],
                message: "name 'Forbidden' is reserved".into(),
            }]
        );
    }

    #[test]
    fn all_errors_are_collected() {
        let checks: Vec<Arc<dyn SemanticCheck>> = vec![Arc::new(NoForbidden), Arc::new(AlwaysFails)];
        let report = validate_graph(&graph(&["Forbidden", "Book", "Author"]), &checks).unwrap_err();

        // One from NoForbidden, three from AlwaysFails.
        assert_eq!(report.len(), 4);
        let checks_fired: Vec<&str> = report
            .errors
            .iter()
            .filter_map(|e| match e {
                SemanticError::InvariantViolated { check, .. } => Some(check.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            checks_fired,
            vec!["NoForbidden", "AlwaysFails", "AlwaysFails", "AlwaysFails"]
        );
    }

    #[test]
    fn explicit_concepts_are_not_duplicated() {
        let checks: Vec<Arc<dyn SemanticCheck>> = vec![Arc::new(AlwaysFails)];
        let report = validate_graph(&graph(&["Book"]), &checks).unwrap_err();
        match &report.errors[0] {
            SemanticError::InvariantViolated { concepts, .. } => {
                assert_eq!(concepts, &vec!["Entity Book".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
