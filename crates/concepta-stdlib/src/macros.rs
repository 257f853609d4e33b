//! Macro rules of the standard library.
//!
//! - [`EntityPersistence`]: every entity gets a `Persisted` data structure.
//! - [`PersistedProperties`] and [`PropertyPersistence`]: every property of
//!   a persisted entity gets a `PropertyPersisted`, whichever of the two
//!   appears first. Both produce the identical concept, so the second one
//!   is absorbed by deduplication.
//! - [`UniqueIndexes`]: unique persisted properties get a `UniqueIndex` whose
//!   name carries a stable per-entity sequence number.

use concepta_core::concept::ConceptSpec;
use concepta_core::concept_type::ConceptType;
use concepta_core::expand::{ExpansionContext, MacroRule, RuleError};
use concepta_core::graph::ConceptGraph;
use concepta_core::id::ConceptId;
use concepta_core::index::Referrers;

use crate::concepts::{
    follow, property_owner, text, ENTITY, PERSISTED, PROPERTY, PROPERTY_PERSISTED, UNIQUE_INDEX,
};

fn property_persisted(property: ConceptId, persisted: ConceptId) -> ConceptSpec {
    ConceptSpec::new(PROPERTY_PERSISTED)
        .key("property", property)
        .depends_on(persisted)
}

/// The `Persisted` concept of `entity`, if there is one.
fn persisted_of(graph: &ConceptGraph, entity: ConceptId) -> Option<ConceptId> {
    let persisted: ConceptType = PERSISTED.into();
    let found = graph
        .index::<Referrers>()
        .of_type(graph, entity, &persisted)
        .find(|id| graph.get(*id).and_then(|c| c.reference("data_structure")) == Some(entity));
    found
}

/// Entity -> Persisted(data_structure = entity).
pub struct EntityPersistence;

impl MacroRule for EntityPersistence {
    fn name(&self) -> &str {
        "EntityPersistence"
    }

    fn concept_type(&self) -> ConceptType {
        ENTITY.into()
    }

    fn expand(&self, ctx: &mut ExpansionContext<'_>) -> Result<Vec<ConceptSpec>, RuleError> {
        Ok(vec![ConceptSpec::new(PERSISTED).key("data_structure", ctx.source())])
    }
}

/// Persisted -> PropertyPersisted for each property of the data structure.
pub struct PersistedProperties;

impl MacroRule for PersistedProperties {
    fn name(&self) -> &str {
        "PersistedProperties"
    }

    fn concept_type(&self) -> ConceptType {
        PERSISTED.into()
    }

    fn expand(&self, ctx: &mut ExpansionContext<'_>) -> Result<Vec<ConceptSpec>, RuleError> {
        let graph = ctx.graph();
        let persisted = ctx.source();
        let entity = follow(graph, persisted, "data_structure")?;
        let property_type: ConceptType = PROPERTY.into();

        let specs = graph
            .index::<Referrers>()
            .of_type(graph, entity, &property_type)
            .filter(|p| property_owner(graph, *p).ok() == Some(entity))
            .map(|p| property_persisted(p, persisted))
            .collect();
        Ok(specs)
    }
}

/// Property -> PropertyPersisted when its owner is already persisted.
pub struct PropertyPersistence;

impl MacroRule for PropertyPersistence {
    fn name(&self) -> &str {
        "PropertyPersistence"
    }

    fn concept_type(&self) -> ConceptType {
        PROPERTY.into()
    }

    fn expand(&self, ctx: &mut ExpansionContext<'_>) -> Result<Vec<ConceptSpec>, RuleError> {
        let graph = ctx.graph();
        let owner = property_owner(graph, ctx.source())?;
        Ok(persisted_of(graph, owner)
            .map(|persisted| property_persisted(ctx.source(), persisted))
            .into_iter()
            .collect())
    }
}

/// PropertyPersisted of a unique property -> UniqueIndex named
/// `IX_<Entity>_<n>`, with `n` stable per entity across runs.
pub struct UniqueIndexes;

impl MacroRule for UniqueIndexes {
    fn name(&self) -> &str {
        "UniqueIndexes"
    }

    fn concept_type(&self) -> ConceptType {
        PROPERTY_PERSISTED.into()
    }

    fn expand(&self, ctx: &mut ExpansionContext<'_>) -> Result<Vec<ConceptSpec>, RuleError> {
        let graph = ctx.graph();
        let property = follow(graph, ctx.source(), "property")?;
        if !graph.concept(property)?.flag("unique") {
            return Ok(vec![]);
        }
        let owner = property_owner(graph, property)?;
        let entity_name = text(graph, owner, "name")?;
        let property_name = text(graph, property, "name")?;

        let sequence = ctx.sequence_at(owner, &property_name);
        Ok(vec![ConceptSpec::new(UNIQUE_INDEX)
            .key("property", property)
            .property("index_name", format!("IX_{entity_name}_{sequence}"))
            .depends_on(ctx.source())])
    }
}
