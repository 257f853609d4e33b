//! Concept types of the standard library and constructors for their specs.
//!
//! | type                    | key                                           | properties               |
//! |-------------------------|-----------------------------------------------|--------------------------|
//! | `Entity`                | `name`                                        |                          |
//! | `Property`              | `owner` (Entity), `name`                      | `type`, `unique`         |
//! | `Persisted`             | `data_structure` (Entity)                     |                          |
//! | `PropertyPersisted`     | `property` (Property)                         |                          |
//! | `UniqueIndex`           | `property` (Property)                         | `index_name`             |
//! | `ChangesOnChangedItems` | `data_structure` (Entity), `depends_on` (Entity) |                       |
//! | `ReadChangedItems`      | `data_structure` (Entity)                     |                          |
//! | `KeepSynchronized`      | `persisted`, `update_on_change`, `read_changed` | `filter_save_expression` |

use concepta_core::concept::{ConceptSpec, KeyRef, Reference};
use concepta_core::graph::ConceptGraph;
use concepta_core::id::ConceptId;
use concepta_core::CoreError;

pub const ENTITY: &str = "Entity";
pub const PROPERTY: &str = "Property";
pub const PERSISTED: &str = "Persisted";
pub const PROPERTY_PERSISTED: &str = "PropertyPersisted";
pub const UNIQUE_INDEX: &str = "UniqueIndex";
pub const CHANGES_ON_CHANGED_ITEMS: &str = "ChangesOnChangedItems";
pub const READ_CHANGED_ITEMS: &str = "ReadChangedItems";
pub const KEEP_SYNCHRONIZED: &str = "KeepSynchronized";

/// Property types and the member type they generate.
pub const PROPERTY_TYPES: &[(&str, &str)] = &[
    ("string", "string"),
    ("int", "int"),
    ("bool", "bool"),
    ("decimal", "decimal"),
    ("datetime", "DateTime"),
    ("guid", "Guid"),
];

/// Generated member type for a property type name.
pub fn member_type(property_type: &str) -> Option<&'static str> {
    PROPERTY_TYPES
        .iter()
        .find(|(name, _)| *name == property_type)
        .map(|(_, member)| *member)
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

pub fn entity_ref(name: &str) -> KeyRef {
    Reference::key(ENTITY).with("name", name)
}

pub fn property_ref(owner: &str, name: &str) -> KeyRef {
    Reference::key(PROPERTY)
        .with("owner", entity_ref(owner))
        .with("name", name)
}

pub fn persisted_ref(entity: &str) -> KeyRef {
    Reference::key(PERSISTED).with("data_structure", entity_ref(entity))
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

pub fn entity(name: &str) -> ConceptSpec {
    ConceptSpec::new(ENTITY).key("name", name)
}

pub fn property(owner: &str, name: &str, property_type: &str) -> ConceptSpec {
    ConceptSpec::new(PROPERTY)
        .key("owner", entity_ref(owner))
        .key("name", name)
        .property("type", property_type)
}

/// A property that must be unique within its entity.
pub fn unique_property(owner: &str, name: &str, property_type: &str) -> ConceptSpec {
    property(owner, name, property_type).property("unique", true)
}

/// Declares `entity` persisted explicitly, so that other input concepts can
/// reference its `Persisted` before expansion derives it.
pub fn persisted(entity: &str) -> ConceptSpec {
    ConceptSpec::new(PERSISTED).key("data_structure", entity_ref(entity))
}

pub fn changes_on_changed_items(data_structure: &str, depends_on: &str) -> ConceptSpec {
    ConceptSpec::new(CHANGES_ON_CHANGED_ITEMS)
        .key("data_structure", entity_ref(data_structure))
        .key("depends_on", entity_ref(depends_on))
}

pub fn read_changed_items(data_structure: &str) -> ConceptSpec {
    ConceptSpec::new(READ_CHANGED_ITEMS).key("data_structure", entity_ref(data_structure))
}

/// Keeps `persisted` in sync when `depends_on` changes, reading changed items
/// of `read_changed`.
///
/// Only meaningful when `depends_on == read_changed`; anything else is
/// rejected by validation.
pub fn keep_synchronized(
    persisted: &str,
    update_on_change: (&str, &str),
    read_changed: &str,
    filter_save_expression: Option<&str>,
) -> ConceptSpec {
    let (data_structure, depends_on) = update_on_change;
    let spec = ConceptSpec::new(KEEP_SYNCHRONIZED)
        .key("persisted", persisted_ref(persisted))
        .key(
            "update_on_change",
            Reference::key(CHANGES_ON_CHANGED_ITEMS)
                .with("data_structure", entity_ref(data_structure))
                .with("depends_on", entity_ref(depends_on)),
        )
        .key(
            "read_changed",
            Reference::key(READ_CHANGED_ITEMS).with("data_structure", entity_ref(read_changed)),
        );
    match filter_save_expression {
        Some(filter) => spec.property("filter_save_expression", filter),
        None => spec,
    }
}

// ---------------------------------------------------------------------------
// Graph helpers shared by rules, checks and generators
// ---------------------------------------------------------------------------

/// Follows reference property `name` of `id`.
pub(crate) fn follow(graph: &ConceptGraph, id: ConceptId, name: &str) -> Result<ConceptId, CoreError> {
    let concept = graph.concept(id)?;
    concept
        .reference(name)
        .ok_or_else(|| CoreError::UnresolvedReference {
            concept: graph.describe(id),
            reference: name.to_string(),
        })
}

/// Reads string property `name` of `id`.
pub(crate) fn text(graph: &ConceptGraph, id: ConceptId, name: &str) -> Result<String, CoreError> {
    let concept = graph.concept(id)?;
    concept
        .text(name)
        .map(str::to_string)
        .ok_or_else(|| CoreError::UnresolvedReference {
            concept: graph.describe(id),
            reference: name.to_string(),
        })
}

/// The entity a `Property` belongs to.
pub(crate) fn property_owner(graph: &ConceptGraph, property: ConceptId) -> Result<ConceptId, CoreError> {
    follow(graph, property, "owner")
}
