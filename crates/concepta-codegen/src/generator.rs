//! The code generator capability.

use concepta_core::concept_type::ConceptType;
use concepta_core::graph::ConceptGraph;
use concepta_core::id::ConceptId;

use crate::emitter::{DestinationId, DestinationWriter};
use crate::error::GeneratorError;

/// Contributes text for concepts of one type.
///
/// A generator handles one destination per concept: [`destination`] names
/// it, and [`generate`] receives a writer bound to that destination only.
/// Generators for the same destination run in dependency order, so a
/// generator may rely on tags declared by the concepts it depends on.
///
/// [`destination`]: CodeGenerator::destination
/// [`generate`]: CodeGenerator::generate
pub trait CodeGenerator: Send + Sync {
    fn name(&self) -> &str;

    fn concept_type(&self) -> ConceptType;

    fn destination(&self, id: ConceptId, graph: &ConceptGraph) -> Result<DestinationId, GeneratorError>;

    fn generate(&self, id: ConceptId, writer: &mut DestinationWriter<'_>) -> Result<(), GeneratorError>;
}
