//! Semantic checks of the standard library.

use concepta_check::{SemanticCheck, Violation};
use concepta_core::concept_type::ConceptType;
use concepta_core::graph::ConceptGraph;
use concepta_core::id::ConceptId;

use crate::concepts::{follow, member_type, KEEP_SYNCHRONIZED, PROPERTY, PROPERTY_TYPES};

/// `KeepSynchronized` must watch the same data structure it reads changed
/// items from: `update_on_change.depends_on == read_changed.data_structure`.
pub struct KeepSynchronizedSources;

impl SemanticCheck for KeepSynchronizedSources {
    fn name(&self) -> &str {
        "KeepSynchronizedSources"
    }

    fn concept_type(&self) -> ConceptType {
        KEEP_SYNCHRONIZED.into()
    }

    fn check(&self, id: ConceptId, graph: &ConceptGraph) -> Result<(), Violation> {
        let update_on_change = follow(graph, id, "update_on_change")?;
        let read_changed = follow(graph, id, "read_changed")?;
        let depends_on = follow(graph, update_on_change, "depends_on")?;
        let data_structure = follow(graph, read_changed, "data_structure")?;

        if depends_on == data_structure {
            return Ok(());
        }
        Err(Violation::new(
            "UpdateOnChange.DependsOn == ReadChanged.DataStructure",
            format!(
                "UpdateOnChange.DependsOn is '{}', ReadChanged.DataStructure is '{}'",
                graph.label(depends_on),
                graph.label(data_structure)
            ),
        )
        .concept(update_on_change)
        .concept(read_changed))
    }
}

/// Property types must be known to the generators.
pub struct KnownPropertyType;

impl SemanticCheck for KnownPropertyType {
    fn name(&self) -> &str {
        "KnownPropertyType"
    }

    fn concept_type(&self) -> ConceptType {
        PROPERTY.into()
    }

    fn check(&self, id: ConceptId, graph: &ConceptGraph) -> Result<(), Violation> {
        let property_type = graph.concept(id)?.text("type").unwrap_or_default();
        if member_type(property_type).is_some() {
            return Ok(());
        }
        let known: Vec<&str> = PROPERTY_TYPES.iter().map(|(name, _)| *name).collect();
        Err(Violation::new(
            "known property type",
            format!(
                "type '{}' is not one of {}",
                property_type,
                known.join(", ")
            ),
        ))
    }
}
