//! Semantic diagnostics with the implicated concepts spelled out.
//!
//! [`SemanticError`] carries concept descriptions (`"<Type> <key text>"`)
//! rather than ids, so a report can be printed or serialized without the
//! graph at hand.

use concepta_core::error::CoreError;
use concepta_core::id::ConceptId;
use serde::{Deserialize, Serialize};

/// A failed semantic check, as returned by [`SemanticCheck::check`](super::SemanticCheck::check).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Short name of the violated invariant.
    pub invariant: String,
    /// Offending concepts, most relevant first.
    pub concepts: Vec<ConceptId>,
    pub message: String,
}

impl Violation {
    pub fn new(invariant: impl Into<String>, message: impl Into<String>) -> Self {
        Violation {
            invariant: invariant.into(),
            concepts: Vec::new(),
            message: message.into(),
        }
    }

    /// Adds an implicated concept (builder style).
    pub fn concept(mut self, id: ConceptId) -> Self {
        self.concepts.push(id);
        self
    }
}

impl From<CoreError> for Violation {
    fn from(err: CoreError) -> Self {
        Violation::new("graph access", err.to_string())
    }
}

/// A semantic validation error on the fixpoint graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SemanticError {
    /// A reference points at a concept missing from the graph.
    #[error("dangling reference: {concept} property '{property}' points at missing ConceptId({target})")]
    DanglingReference {
        /// The referencing concept.
        concept: String,
        /// Property holding the reference (`depends_on` for declared ones).
        property: String,
        /// The id that does not resolve.
        target: ConceptId,
    },

    /// Key composition loops back on itself.
    #[error("key cycle: {}", .members.join(", "))]
    KeyCycle {
        /// Concepts on the cycle.
        members: Vec<String>,
    },

    /// A registered semantic check rejected a concept.
    #[error("{check}: {invariant} violated by {}: {message}", .concepts.join(", "))]
    InvariantViolated {
        /// Name of the check that fired.
        check: String,
        /// Name of the violated invariant.
        invariant: String,
        /// Descriptions of the offending concepts.
        concepts: Vec<String>,
        /// Explanation naming the conflicting values.
        message: String,
    },
}

/// All semantic errors found in one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("validation failed with {} error(s)", .errors.len())]
pub struct ValidationReport {
    pub errors: Vec<SemanticError>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// One error per line, for terminal output.
    pub fn render(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("error: {}", e))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
