//! End-to-end tests for the compile pipeline.
//!
//! Each test registers a small set of plugins, compiles a concept list with
//! `concepta_codegen::compile()`, and inspects the artifacts (or the
//! aggregated error). Covers:
//! - emission order across tags and destinations
//! - undefined tags and per-destination failure isolation
//! - dependency cycles and validation aborting before emission
//! - order records flushed only on success
//! - parallel and sequential emission agreeing
//! - determinism and ordering validity over random inputs (proptest)

use proptest::prelude::*;

use concepta_check::{SemanticCheck, Violation};
use concepta_codegen::ordering::{dependency_order, ranks};
use concepta_codegen::{
    compile, compile_with, CodeGenerator, CompileError, CompileOptions, DestinationId, DestinationWriter,
    EmitError, GeneratorError, PluginRegistry,
};
use concepta_core::concept::{ConceptSpec, Reference};
use concepta_core::concept_type::ConceptType;
use concepta_core::error::CoreError;
use concepta_core::expand::{ExpansionContext, MacroRule, RuleError};
use concepta_core::graph::ConceptGraph;
use concepta_core::id::ConceptId;
use concepta_storage::{InMemoryOrderStore, OrderStore};

// ---------------------------------------------------------------------------
// Test plugins
// ---------------------------------------------------------------------------

/// Entity -> Persisted, with a stable table number from the order repository.
struct Storage;

impl MacroRule for Storage {
    fn name(&self) -> &str {
        "Storage"
    }
    fn concept_type(&self) -> ConceptType {
        "Entity".into()
    }
    fn expand(&self, ctx: &mut ExpansionContext<'_>) -> Result<Vec<ConceptSpec>, RuleError> {
        let table = ctx.sequence("table");
        Ok(vec![ConceptSpec::new("Persisted")
            .key("data_structure", ctx.source())
            .property("table", i64::from(table))])
    }
}

/// Entity names must not be empty.
struct NamedEntity;

impl SemanticCheck for NamedEntity {
    fn name(&self) -> &str {
        "NamedEntity"
    }
    fn concept_type(&self) -> ConceptType {
        "Entity".into()
    }
    fn check(&self, id: ConceptId, graph: &ConceptGraph) -> Result<(), Violation> {
        match graph.concept(id)?.text("name") {
            Some(name) if !name.is_empty() => Ok(()),
            _ => Err(Violation::new("non-empty name", "entity name is empty")),
        }
    }
}

fn entity_name(graph: &ConceptGraph, id: ConceptId) -> Result<String, GeneratorError> {
    graph
        .concept(id)?
        .text("name")
        .map(str::to_string)
        .ok_or_else(|| GeneratorError::Failed("entity without name".into()))
}

/// Resolves the entity a concept belongs to through `property`.
fn owner_destination(graph: &ConceptGraph, id: ConceptId, property: &str) -> Result<DestinationId, GeneratorError> {
    let owner = graph
        .concept(id)?
        .reference(property)
        .ok_or_else(|| GeneratorError::Failed(format!("missing {property}")))?;
    Ok(DestinationId::new(entity_name(graph, owner)?))
}

struct EntityClass;

impl CodeGenerator for EntityClass {
    fn name(&self) -> &str {
        "EntityClass"
    }
    fn concept_type(&self) -> ConceptType {
        "Entity".into()
    }
    fn destination(&self, id: ConceptId, graph: &ConceptGraph) -> Result<DestinationId, GeneratorError> {
        Ok(DestinationId::new(entity_name(graph, id)?))
    }
    fn generate(&self, id: ConceptId, writer: &mut DestinationWriter<'_>) -> Result<(), GeneratorError> {
        let name = entity_name(writer.graph(), id)?;
        writer.set_template(format!("class {name} {{\n/*@properties*//*@storage*/}}\n"))?;
        Ok(())
    }
}

struct PropertyField;

impl CodeGenerator for PropertyField {
    fn name(&self) -> &str {
        "PropertyField"
    }
    fn concept_type(&self) -> ConceptType {
        "Property".into()
    }
    fn destination(&self, id: ConceptId, graph: &ConceptGraph) -> Result<DestinationId, GeneratorError> {
        owner_destination(graph, id, "owner")
    }
    fn generate(&self, id: ConceptId, writer: &mut DestinationWriter<'_>) -> Result<(), GeneratorError> {
        let concept = writer.graph().concept(id)?;
        let name = concept.text("name").unwrap_or_default().to_string();
        let ty = concept.text("type").unwrap_or("string").to_string();
        writer.insert_after("properties", format!("  {ty} {name};\n"))?;
        Ok(())
    }
}

struct PersistedStorage;

impl CodeGenerator for PersistedStorage {
    fn name(&self) -> &str {
        "PersistedStorage"
    }
    fn concept_type(&self) -> ConceptType {
        "Persisted".into()
    }
    fn destination(&self, id: ConceptId, graph: &ConceptGraph) -> Result<DestinationId, GeneratorError> {
        owner_destination(graph, id, "data_structure")
    }
    fn generate(&self, id: ConceptId, writer: &mut DestinationWriter<'_>) -> Result<(), GeneratorError> {
        let table = writer
            .graph()
            .concept(id)?
            .get("table")
            .and_then(|v| v.as_int())
            .unwrap_or_default();
        writer.insert_after("storage", format!("  // table {table}\n"))?;
        Ok(())
    }
}

/// Targets a tag nobody declares.
struct Validation;

impl CodeGenerator for Validation {
    fn name(&self) -> &str {
        "Validation"
    }
    fn concept_type(&self) -> ConceptType {
        "Rule".into()
    }
    fn destination(&self, id: ConceptId, graph: &ConceptGraph) -> Result<DestinationId, GeneratorError> {
        owner_destination(graph, id, "owner")
    }
    fn generate(&self, _id: ConceptId, writer: &mut DestinationWriter<'_>) -> Result<(), GeneratorError> {
        writer.insert_after("validation", "  check();\n")?;
        Ok(())
    }
}

fn registry() -> PluginRegistry {
    PluginRegistry::builder()
        .macro_rule(Storage)
        .check(NamedEntity)
        .generator(EntityClass)
        .generator(PropertyField)
        .generator(PersistedStorage)
        .generator(Validation)
        .build()
}

fn entity(name: &str) -> ConceptSpec {
    ConceptSpec::new("Entity").key("name", name)
}

fn property(owner: &str, name: &str, ty: &str) -> ConceptSpec {
    ConceptSpec::new("Property")
        .key("owner", Reference::key("Entity").with("name", owner))
        .key("name", name)
        .property("type", ty)
}

fn rule(owner: &str, name: &str) -> ConceptSpec {
    ConceptSpec::new("Rule")
        .key("owner", Reference::key("Entity").with("name", owner))
        .key("name", name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn property_fragment_precedes_storage_fragment() {
    let mut store = InMemoryOrderStore::new();
    let output = compile(
        &[entity("Book"), property("Book", "Title", "string")],
        &registry(),
        &mut store,
        &CompileOptions::default(),
    )
    .unwrap();

    assert_eq!(output.concepts, 3);
    assert_eq!(output.expansion.iterations, 2);
    assert_eq!(output.artifacts.len(), 1);
    assert_eq!(output.artifacts[0].destination.as_str(), "Book");
    assert_eq!(
        output.artifacts[0].text,
        "class Book {\n  string Title;\n  // table 1\n}\n"
    );
}

#[test]
fn artifacts_follow_first_contributor_order() {
    let mut store = InMemoryOrderStore::new();
    let output = compile(
        &[
            property("Book", "Title", "string"),
            entity("Book"),
            entity("Author"),
        ],
        &registry(),
        &mut store,
        &CompileOptions::default(),
    )
    .unwrap();

    let destinations: Vec<&str> = output
        .artifacts
        .iter()
        .map(|a| a.destination.as_str())
        .collect();
    assert_eq!(destinations, vec!["Book", "Author"]);
}

#[test]
fn undefined_tag_names_concept_and_tag() {
    let mut store = InMemoryOrderStore::new();
    let err = compile(
        &[entity("Book"), rule("Book", "NotEmpty")],
        &registry(),
        &mut store,
        &CompileOptions::default(),
    )
    .unwrap_err();

    match err {
        CompileError::Emission(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].destination, "Book");
            assert_eq!(failures[0].concept, "Rule Book.NotEmpty");
            assert_eq!(
                failures[0].error,
                GeneratorError::Emit(EmitError::UndefinedTag {
                    destination: "Book".into(),
                    tag: "validation".into(),
                    concept: "Rule Book.NotEmpty".into(),
                })
            );
        }
        other => panic!("expected emission failure, got {other:?}"),
    }
}

#[test]
fn failures_are_isolated_and_aggregated() {
    let mut store = InMemoryOrderStore::new();
    let err = compile(
        &[
            entity("Book"),
            entity("Author"),
            entity("Shelf"),
            rule("Book", "A"),
            rule("Shelf", "B"),
        ],
        &registry(),
        &mut store,
        &CompileOptions::default(),
    )
    .unwrap_err();

    match err {
        CompileError::Emission(failures) => {
            let failed: Vec<&str> = failures.iter().map(|f| f.destination.as_str()).collect();
            assert_eq!(failed, vec!["Book", "Shelf"]);
        }
        other => panic!("expected emission failure, got {other:?}"),
    }
    // Nothing is persisted when compilation fails.
    assert!(store.is_empty());
}

#[test]
fn successful_compile_flushes_order_records_once() {
    let mut store = InMemoryOrderStore::new();
    let input = [entity("Book"), entity("Author")];

    let first = compile(&input, &registry(), &mut store, &CompileOptions::default()).unwrap();
    assert_eq!(first.order_records_added, 2);
    assert_eq!(store.load_records().unwrap().len(), 2);

    let second = compile(&input, &registry(), &mut store, &CompileOptions::default()).unwrap();
    assert_eq!(second.order_records_added, 0);
    assert_eq!(first.artifacts, second.artifacts);
}

#[test]
fn failed_publish_flushes_nothing() {
    let mut store = InMemoryOrderStore::new();
    let input = [entity("Book"), entity("Author")];

    let err = compile_with(
        &input,
        &registry(),
        &mut store,
        &CompileOptions::default(),
        |artifacts| {
            assert!(!artifacts.is_empty());
            Err(CompileError::Publish("disk full".into()))
        },
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Publish(ref reason) if reason == "disk full"));
    assert!(store.is_empty());

    let retried = compile(&input, &registry(), &mut store, &CompileOptions::default()).unwrap();
    assert_eq!(retried.order_records_added, 2);
}

#[test]
fn validation_errors_stop_before_emission() {
    let mut store = InMemoryOrderStore::new();
    let err = compile(
        &[entity(""), entity("Book"), rule("Book", "A")],
        &registry(),
        &mut store,
        &CompileOptions::default(),
    )
    .unwrap_err();

    match err {
        CompileError::Validation(report) => assert_eq!(report.len(), 1),
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert!(store.is_empty());
}

#[test]
fn unknown_concept_type_is_rejected() {
    let mut store = InMemoryOrderStore::new();
    let err = compile(
        &[ConceptSpec::new("Widget").key("name", "W")],
        &registry(),
        &mut store,
        &CompileOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CompileError::Core(CoreError::UnknownConceptType { .. })
    ));
}

#[test]
fn cancelled_compile_writes_nothing() {
    let mut store = InMemoryOrderStore::new();
    let options = CompileOptions::default();
    options.cancellation.cancel();

    let err = compile(&[entity("Book")], &registry(), &mut store, &options).unwrap_err();
    assert!(matches!(err, CompileError::Core(CoreError::Cancelled)));
    assert!(store.is_empty());
}

#[test]
fn parallel_emission_matches_sequential() {
    let input: Vec<ConceptSpec> = (0..12)
        .flat_map(|i| {
            let name = format!("E{i}");
            vec![entity(&name), property(&name, "Id", "int"), property(&name, "Name", "string")]
        })
        .collect();

    let sequential = compile(
        &input,
        &registry(),
        &mut InMemoryOrderStore::new(),
        &CompileOptions::default(),
    )
    .unwrap();
    let parallel = compile(
        &input,
        &registry(),
        &mut InMemoryOrderStore::new(),
        &CompileOptions {
            parallel_emission: true,
            ..CompileOptions::default()
        },
    )
    .unwrap();

    assert_eq!(sequential.artifacts, parallel.artifacts);
    assert_eq!(sequential.artifacts.len(), 12);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// Random entities with properties, listed in a shuffled order.
fn model() -> impl Strategy<Value = Vec<ConceptSpec>> {
    prop::collection::vec(prop::collection::vec("[a-z]{1,6}", 0..4), 1..6)
        .prop_map(|entities| {
            let mut specs = Vec::new();
            for (i, props) in entities.iter().enumerate() {
                let owner = format!("E{i}");
                for (j, p) in props.iter().enumerate() {
                    specs.push(property(&owner, &format!("{p}{j}"), "string"));
                }
                specs.push(entity(&owner));
            }
            specs
        })
        .prop_shuffle()
}

proptest! {
    #[test]
    fn compilation_is_deterministic(input in model()) {
        let a = compile(&input, &registry(), &mut InMemoryOrderStore::new(), &CompileOptions::default()).unwrap();
        let b = compile(&input, &registry(), &mut InMemoryOrderStore::new(), &CompileOptions::default()).unwrap();
        prop_assert_eq!(a.artifacts, b.artifacts);
    }

    #[test]
    fn dependencies_precede_dependents(input in model()) {
        let mut graph = ConceptGraph::new();
        graph.add_all(&input).unwrap();
        let order = dependency_order(&graph).unwrap();
        prop_assert_eq!(order.len(), graph.len());

        let rank = ranks(&order);
        for (id, _) in graph.iter() {
            for dep in graph.dependencies(id) {
                prop_assert!(rank[&dep] < rank[&id]);
            }
        }
    }
}
