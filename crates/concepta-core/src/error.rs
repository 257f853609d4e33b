//! Core error types for concepta-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the concept graph and the macro expansion pass. Every
//! variant names the implicated concepts by their description
//! (`"<Type> <key text>"`) so that diagnostics need no further graph queries.

use crate::concept_type::ConceptType;
use crate::id::ConceptId;
use thiserror::Error;

/// Core errors produced by the concepta-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A concept's type is not in the closed set of registered types.
    #[error("unknown concept type: '{concept_type}'")]
    UnknownConceptType { concept_type: ConceptType },

    /// A concept with the same type and key already exists with different content.
    #[error("duplicate key: {concept} is already defined with different content ({detail})")]
    DuplicateKey { concept: String, detail: String },

    /// Key composition or dependency edges form a cycle.
    #[error("dependency cycle between: {}", .members.join(", "))]
    DependencyCycle { members: Vec<String> },

    /// A reference names a concept that is not in the graph.
    #[error("unresolved reference in {concept}: {reference} does not exist")]
    UnresolvedReference { concept: String, reference: String },

    /// A ConceptId does not address a concept in the arena.
    #[error("concept not found: ConceptId({id})")]
    ConceptNotFound { id: ConceptId },

    /// The expansion iteration budget was exhausted before a fixpoint.
    #[error(
        "macro expansion did not reach a fixpoint after {iterations} iteration(s): rule '{rule}' keeps producing concepts ({})",
        .chain.join(" <- ")
    )]
    ExpansionNonTermination {
        rule: String,
        iterations: usize,
        chain: Vec<String>,
    },

    /// A macro rule reported a fault.
    #[error("macro rule '{rule}' failed on {concept}: {message}")]
    MacroFailed {
        rule: String,
        concept: String,
        message: String,
    },

    /// The compilation was cancelled at an interruption point.
    #[error("compilation cancelled")]
    Cancelled,
}
