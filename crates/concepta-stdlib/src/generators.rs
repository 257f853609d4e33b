//! Code generators of the standard library.
//!
//! Every entity produces two destinations:
//!
//! - `<Entity>`: the entity class. Its template declares `properties` and
//!   `storage`; the `Persisted` fragment at `storage` declares `compare` and
//!   `clone`, which `PropertyPersisted` fills.
//! - `<Entity>.Mapping`: the storage mapping. Its template (from `Persisted`)
//!   declares `columns` and `indexes`.
//!
//! Generators on a destination only touch tags declared by concepts they
//! depend on, so dependency order alone makes emission well-formed.

use concepta_codegen::{CodeGenerator, DestinationId, DestinationWriter, GeneratorError};
use concepta_core::concept_type::ConceptType;
use concepta_core::graph::ConceptGraph;
use concepta_core::id::ConceptId;

use crate::concepts::{
    follow, member_type, property_owner, text, ENTITY, KEEP_SYNCHRONIZED, PERSISTED, PROPERTY,
    PROPERTY_PERSISTED, UNIQUE_INDEX,
};

fn class_destination(graph: &ConceptGraph, entity: ConceptId) -> Result<DestinationId, GeneratorError> {
    Ok(DestinationId::new(text(graph, entity, "name")?))
}

fn mapping_destination(graph: &ConceptGraph, entity: ConceptId) -> Result<DestinationId, GeneratorError> {
    Ok(DestinationId::new(format!("{}.Mapping", text(graph, entity, "name")?)))
}

/// Name and member type of a `Property`.
fn member(graph: &ConceptGraph, property: ConceptId) -> Result<(String, &'static str), GeneratorError> {
    let name = text(graph, property, "name")?;
    let property_type = text(graph, property, "type")?;
    let member = member_type(&property_type)
        .ok_or_else(|| GeneratorError::Failed(format!("no member type for '{property_type}'")))?;
    Ok((name, member))
}

// ---------------------------------------------------------------------------
// Entity class
// ---------------------------------------------------------------------------

/// Opens `<Entity>` with the class skeleton.
pub struct EntityClass;

impl CodeGenerator for EntityClass {
    fn name(&self) -> &str {
        "EntityClass"
    }

    fn concept_type(&self) -> ConceptType {
        ENTITY.into()
    }

    fn destination(&self, id: ConceptId, graph: &ConceptGraph) -> Result<DestinationId, GeneratorError> {
        class_destination(graph, id)
    }

    fn generate(&self, id: ConceptId, writer: &mut DestinationWriter<'_>) -> Result<(), GeneratorError> {
        let name = text(writer.graph(), id, "name")?;
        writer.set_template(format!(
            "public class {name}\n{{\n    public Guid ID {{ get; set; }}\n/*@properties*//*@storage*/}}\n"
        ))?;
        Ok(())
    }
}

/// One auto-property per `Property`.
pub struct PropertyMember;

impl CodeGenerator for PropertyMember {
    fn name(&self) -> &str {
        "PropertyMember"
    }

    fn concept_type(&self) -> ConceptType {
        PROPERTY.into()
    }

    fn destination(&self, id: ConceptId, graph: &ConceptGraph) -> Result<DestinationId, GeneratorError> {
        class_destination(graph, property_owner(graph, id)?)
    }

    fn generate(&self, id: ConceptId, writer: &mut DestinationWriter<'_>) -> Result<(), GeneratorError> {
        let (name, member) = member(writer.graph(), id)?;
        writer.insert_after("properties", format!("    public {member} {name} {{ get; set; }}\n"))?;
        Ok(())
    }
}

/// Content comparison and cloning for persisted entities.
pub struct PersistedStorage;

impl CodeGenerator for PersistedStorage {
    fn name(&self) -> &str {
        "PersistedStorage"
    }

    fn concept_type(&self) -> ConceptType {
        PERSISTED.into()
    }

    fn destination(&self, id: ConceptId, graph: &ConceptGraph) -> Result<DestinationId, GeneratorError> {
        class_destination(graph, follow(graph, id, "data_structure")?)
    }

    fn generate(&self, id: ConceptId, writer: &mut DestinationWriter<'_>) -> Result<(), GeneratorError> {
        let graph = writer.graph();
        let name = text(graph, follow(graph, id, "data_structure")?, "name")?;
        writer.insert_after(
            "storage",
            format!(
                "\n    public bool SameContent({name} other)\n    {{\n        bool same = true;\n/*@compare*/        return same;\n    }}\n\
                 \n    public {name} Clone()\n    {{\n        return new {name}\n        {{\n            ID = ID/*@clone*/\n        }};\n    }}\n"
            ),
        )?;
        Ok(())
    }
}

/// Adds a persisted property to the comparison and the clone.
pub struct PropertyPersistedCode;

impl CodeGenerator for PropertyPersistedCode {
    fn name(&self) -> &str {
        "PropertyPersistedCode"
    }

    fn concept_type(&self) -> ConceptType {
        PROPERTY_PERSISTED.into()
    }

    fn destination(&self, id: ConceptId, graph: &ConceptGraph) -> Result<DestinationId, GeneratorError> {
        let property = follow(graph, id, "property")?;
        class_destination(graph, property_owner(graph, property)?)
    }

    fn generate(&self, id: ConceptId, writer: &mut DestinationWriter<'_>) -> Result<(), GeneratorError> {
        let graph = writer.graph();
        let name = text(graph, follow(graph, id, "property")?, "name")?;
        writer.insert_after(
            "compare",
            format!("        if (same && {name} != other.{name}) same = false;\n"),
        )?;
        writer.insert_after("clone", format!(",\n            {name} = {name}"))?;
        Ok(())
    }
}

/// Recompute hook for a `KeepSynchronized` on the persisted entity.
pub struct KeepSynchronizedHook;

impl CodeGenerator for KeepSynchronizedHook {
    fn name(&self) -> &str {
        "KeepSynchronizedHook"
    }

    fn concept_type(&self) -> ConceptType {
        KEEP_SYNCHRONIZED.into()
    }

    fn destination(&self, id: ConceptId, graph: &ConceptGraph) -> Result<DestinationId, GeneratorError> {
        let persisted = follow(graph, id, "persisted")?;
        class_destination(graph, follow(graph, persisted, "data_structure")?)
    }

    fn generate(&self, id: ConceptId, writer: &mut DestinationWriter<'_>) -> Result<(), GeneratorError> {
        let graph = writer.graph();
        let update_on_change = follow(graph, id, "update_on_change")?;
        let source = text(graph, follow(graph, update_on_change, "depends_on")?, "name")?;
        let filter = match graph.concept(id)?.text("filter_save_expression") {
            Some(filter) => format!("        // filter: {filter}\n"),
            None => String::new(),
        };
        writer.insert_after(
            "storage",
            format!(
                "\n    public static void OnChanged{source}(IEnumerable<{source}> changed)\n    {{\n{filter}        Recompute(changed);\n    }}\n"
            ),
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Storage mapping
// ---------------------------------------------------------------------------

/// Opens `<Entity>.Mapping`.
pub struct PersistedMapping;

impl CodeGenerator for PersistedMapping {
    fn name(&self) -> &str {
        "PersistedMapping"
    }

    fn concept_type(&self) -> ConceptType {
        PERSISTED.into()
    }

    fn destination(&self, id: ConceptId, graph: &ConceptGraph) -> Result<DestinationId, GeneratorError> {
        mapping_destination(graph, follow(graph, id, "data_structure")?)
    }

    fn generate(&self, id: ConceptId, writer: &mut DestinationWriter<'_>) -> Result<(), GeneratorError> {
        let graph = writer.graph();
        let name = text(graph, follow(graph, id, "data_structure")?, "name")?;
        writer.set_template(format!(
            "public class {name}Mapping : ClassMap<{name}>\n{{\n    public {name}Mapping()\n    {{\n        Table(\"{name}\");\n        Id(x => x.ID);\n/*@columns*//*@indexes*/    }}\n}}\n"
        ))?;
        Ok(())
    }
}

/// One column per persisted property.
pub struct PropertyColumn;

impl CodeGenerator for PropertyColumn {
    fn name(&self) -> &str {
        "PropertyColumn"
    }

    fn concept_type(&self) -> ConceptType {
        PROPERTY_PERSISTED.into()
    }

    fn destination(&self, id: ConceptId, graph: &ConceptGraph) -> Result<DestinationId, GeneratorError> {
        let property = follow(graph, id, "property")?;
        mapping_destination(graph, property_owner(graph, property)?)
    }

    fn generate(&self, id: ConceptId, writer: &mut DestinationWriter<'_>) -> Result<(), GeneratorError> {
        let graph = writer.graph();
        let name = text(graph, follow(graph, id, "property")?, "name")?;
        writer.insert_after("columns", format!("        Map(x => x.{name}).Column(\"{name}\");\n"))?;
        Ok(())
    }
}

/// One unique index per `UniqueIndex`.
pub struct UniqueIndexMapping;

impl CodeGenerator for UniqueIndexMapping {
    fn name(&self) -> &str {
        "UniqueIndexMapping"
    }

    fn concept_type(&self) -> ConceptType {
        UNIQUE_INDEX.into()
    }

    fn destination(&self, id: ConceptId, graph: &ConceptGraph) -> Result<DestinationId, GeneratorError> {
        let property = follow(graph, id, "property")?;
        mapping_destination(graph, property_owner(graph, property)?)
    }

    fn generate(&self, id: ConceptId, writer: &mut DestinationWriter<'_>) -> Result<(), GeneratorError> {
        let graph = writer.graph();
        let property = text(graph, follow(graph, id, "property")?, "name")?;
        let index_name = text(graph, id, "index_name")?;
        writer.insert_after(
            "indexes",
            format!("        Index(\"{index_name}\", x => x.{property}).Unique();\n"),
        )?;
        Ok(())
    }
}
