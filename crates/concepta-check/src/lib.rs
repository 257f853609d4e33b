//! Validation of the expanded concept graph.
//!
//! - [`semantics::validate_graph`] collects every violation into a
//!   [`ValidationReport`] instead of failing fast.
//! - [`semantics::check_integrity`] is the built-in referential integrity
//!   check that always runs first.

pub mod semantics;

pub use semantics::{
    check_integrity, validate_graph, SemanticCheck, SemanticError, ValidationReport, Violation,
};
