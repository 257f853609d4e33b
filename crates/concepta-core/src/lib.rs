//! Concept graph and macro expansion engine.
//!
//! # Modules
//!
//! - [`concept`] -- Concept records and their unresolved spec form
//! - [`graph`] -- The concept arena with key deduplication and cached indices
//! - [`expand`] -- Fixpoint macro expansion
//! - [`order`] -- Stable sequence numbers for synthesized identities

pub mod cancel;
pub mod concept;
pub mod concept_type;
pub mod error;
pub mod expand;
pub mod graph;
pub mod id;
pub mod index;
pub mod order;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use concept::{Concept, ConceptSpec, KeyRef, Literal, Reference, ReferenceKind, SpecValue, Value};
pub use concept_type::{ConceptType, TypeRegistry};
pub use error::CoreError;
pub use expand::{
    expand, ExpansionContext, ExpansionOptions, ExpansionReport, MacroRule, RuleError,
    DEFAULT_MAX_ITERATIONS,
};
pub use graph::{AddOutcome, ConceptGraph, Origin, ReferenceEdge};
pub use id::ConceptId;
pub use index::{ByType, ConceptIndex, Referrers};
pub use order::{OrderRecord, OrderRepository, ProductionSite};
