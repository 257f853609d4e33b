//! The standard library compiled end to end.
//!
//! Covers:
//! - generated class and mapping text (insta inline snapshots)
//! - KeepSynchronized source mismatch reported with both concepts
//! - stable unique-index names across runs backed by SQLite
//! - nothing persisted when compilation fails
//! - determinism over random models (proptest)

use proptest::prelude::*;

use concepta_codegen::{compile, CompileError, CompileOptions, CompileOutput};
use concepta_check::SemanticError;
use concepta_core::concept::ConceptSpec;
use concepta_storage::{InMemoryOrderStore, OrderStore, SqliteOrderStore};
use concepta_stdlib::concepts::{
    changes_on_changed_items, entity, keep_synchronized, persisted, property, read_changed_items,
    unique_property, PROPERTY_TYPES,
};
use concepta_stdlib::registry;

fn compile_fresh(input: &[ConceptSpec]) -> Result<CompileOutput, CompileError> {
    compile(
        input,
        &registry(),
        &mut InMemoryOrderStore::new(),
        &CompileOptions::default(),
    )
}

fn artifact<'a>(output: &'a CompileOutput, destination: &str) -> &'a str {
    output
        .artifacts
        .iter()
        .find(|a| a.destination.as_str() == destination)
        .map(|a| a.text.as_str())
        .unwrap_or_else(|| panic!("no artifact {destination}"))
}

fn book() -> Vec<ConceptSpec> {
    vec![
        entity("Book"),
        property("Book", "Title", "string"),
        unique_property("Book", "Isbn", "string"),
    ]
}

/// `Summary` is recomputed whenever `depends_on` changes, reading changed
/// items of `read_changed`.
fn summary(depends_on: &str, read_changed: &str) -> Vec<ConceptSpec> {
    vec![
        entity("Summary"),
        entity("Order"),
        entity("OrderItem"),
        property("Summary", "Total", "int"),
        persisted("Summary"),
        changes_on_changed_items("Summary", depends_on),
        read_changed_items(read_changed),
        keep_synchronized(
            "Summary",
            ("Summary", depends_on),
            read_changed,
            Some("item => item.Total > 0"),
        ),
    ]
}

#[test]
fn entity_class_collects_members_comparison_and_clone() {
    let output = compile_fresh(&book()).unwrap();

    insta::assert_snapshot!(artifact(&output, "Book"), @r###"
    public class Book
    {
        public Guid ID { get; set; }
        public string Title { get; set; }
        public string Isbn { get; set; }

        public bool SameContent(Book other)
        {
            bool same = true;
            if (same && Title != other.Title) same = false;
            if (same && Isbn != other.Isbn) same = false;
            return same;
        }

        public Book Clone()
        {
            return new Book
            {
                ID = ID,
                Title = Title,
                Isbn = Isbn
            };
        }
    }
    "###);
}

#[test]
fn mapping_lists_columns_then_indexes() {
    let output = compile_fresh(&book()).unwrap();

    insta::assert_snapshot!(artifact(&output, "Book.Mapping"), @r###"
    public class BookMapping : ClassMap<Book>
    {
        public BookMapping()
        {
            Table("Book");
            Id(x => x.ID);
            Map(x => x.Title).Column("Title");
            Map(x => x.Isbn).Column("Isbn");
            Index("IX_Book_1", x => x.Isbn).Unique();
        }
    }
    "###);
}

#[test]
fn expansion_report_counts_each_rule() {
    let output = compile_fresh(&book()).unwrap();

    insta::assert_json_snapshot!(output.expansion, @r###"
    {
      "initial_concepts": 3,
      "final_concepts": 7,
      "iterations": 2,
      "produced": {
        "EntityPersistence": 1,
        "PersistedProperties": 2,
        "PropertyPersistence": 0,
        "UniqueIndexes": 1
      }
    }
    "###);
}

#[test]
fn keep_synchronized_adds_recompute_hook() {
    let output = compile_fresh(&summary("Order", "Order")).unwrap();

    let destinations: Vec<&str> = output
        .artifacts
        .iter()
        .map(|a| a.destination.as_str())
        .collect();
    assert_eq!(
        destinations,
        vec!["Summary", "Order", "OrderItem", "Summary.Mapping", "Order.Mapping", "OrderItem.Mapping"]
    );

    insta::assert_snapshot!(artifact(&output, "Summary"), @r###"
    public class Summary
    {
        public Guid ID { get; set; }
        public int Total { get; set; }

        public bool SameContent(Summary other)
        {
            bool same = true;
            if (same && Total != other.Total) same = false;
            return same;
        }

        public Summary Clone()
        {
            return new Summary
            {
                ID = ID,
                Total = Total
            };
        }

        public static void OnChangedOrder(IEnumerable<Order> changed)
        {
            // filter: item => item.Total > 0
            Recompute(changed);
        }
    }
    "###);
}

#[test]
fn mismatched_keep_synchronized_names_both_sources() {
    let err = compile_fresh(&summary("Order", "OrderItem")).unwrap_err();

    let report = match err {
        CompileError::Validation(report) => report,
        other => panic!("expected validation failure, got {other:?}"),
    };
    assert_eq!(report.len(), 1);
    match &report.errors[0] {
        SemanticError::InvariantViolated {
            check,
            concepts,
            message,
            ..
        } => {
            assert_eq!(check, "KeepSynchronizedSources");
            assert_eq!(
                concepts,
                &vec![
                    "KeepSynchronized Summary.Summary.Order.OrderItem".to_string(),
                    "ChangesOnChangedItems Summary.Order".to_string(),
                    "ReadChangedItems OrderItem".to_string(),
                ]
            );
            assert_eq!(
                message,
                "UpdateOnChange.DependsOn is 'Order', ReadChanged.DataStructure is 'OrderItem'"
            );
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn unknown_property_type_fails_validation() {
    let err = compile_fresh(&[entity("Book"), property("Book", "Cover", "blob")]).unwrap_err();
    assert!(matches!(err, CompileError::Validation(report) if report.len() == 1));
}

#[test]
fn index_names_survive_new_unique_properties() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.db");
    let path = path.to_str().unwrap();

    {
        let mut store = SqliteOrderStore::new(path).unwrap();
        let output = compile(
            &[entity("Book"), unique_property("Book", "Isbn", "string")],
            &registry(),
            &mut store,
            &CompileOptions::default(),
        )
        .unwrap();
        assert!(artifact(&output, "Book.Mapping").contains("Index(\"IX_Book_1\", x => x.Isbn)"));
        assert_eq!(output.order_records_added, 1);
    }

    // Reopened store; a new unique property is declared ahead of Isbn.
    let mut store = SqliteOrderStore::new(path).unwrap();
    let output = compile(
        &[
            entity("Book"),
            unique_property("Book", "Code", "string"),
            unique_property("Book", "Isbn", "string"),
        ],
        &registry(),
        &mut store,
        &CompileOptions::default(),
    )
    .unwrap();

    let mapping = artifact(&output, "Book.Mapping");
    assert!(mapping.contains("Index(\"IX_Book_2\", x => x.Code)"));
    assert!(mapping.contains("Index(\"IX_Book_1\", x => x.Isbn)"));
    assert_eq!(output.order_records_added, 1);
    assert_eq!(store.load_records().unwrap().len(), 2);
}

#[test]
fn independent_runs_assign_the_same_names() {
    let input = [
        entity("Book"),
        unique_property("Book", "Isbn", "string"),
        entity("Author"),
        unique_property("Author", "Email", "string"),
    ];

    let mut first = InMemoryOrderStore::new();
    let mut second = InMemoryOrderStore::new();
    let a = compile(&input, &registry(), &mut first, &CompileOptions::default()).unwrap();
    let b = compile(&input, &registry(), &mut second, &CompileOptions::default()).unwrap();

    assert_eq!(a.artifacts, b.artifacts);
    assert_eq!(first.load_records().unwrap(), second.load_records().unwrap());
    assert!(artifact(&a, "Author.Mapping").contains("IX_Author_1"));
}

#[test]
fn failed_compile_persists_no_order_records() {
    let mut store = SqliteOrderStore::in_memory().unwrap();
    let mut input = summary("Order", "OrderItem");
    input.push(unique_property("Order", "Number", "string"));

    let err = compile(&input, &registry(), &mut store, &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::Validation(_)));
    assert!(store.load_records().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// Entities with typed, sometimes unique, properties.
fn model() -> impl Strategy<Value = Vec<ConceptSpec>> {
    let property_type = prop::sample::select(PROPERTY_TYPES.iter().map(|(name, _)| *name).collect::<Vec<_>>());
    let properties = prop::collection::vec((property_type, any::<bool>()), 0..4);
    prop::collection::vec(properties, 1..5).prop_map(|entities| {
        let mut specs = Vec::new();
        for (i, props) in entities.iter().enumerate() {
            let owner = format!("E{i}");
            specs.push(entity(&owner));
            for (j, (property_type, unique)) in props.iter().enumerate() {
                let name = format!("P{j}");
                specs.push(if *unique {
                    unique_property(&owner, &name, property_type)
                } else {
                    property(&owner, &name, property_type)
                });
            }
        }
        specs
    })
}

proptest! {
    #[test]
    fn compilation_is_deterministic(input in model()) {
        let mut first = InMemoryOrderStore::new();
        let mut second = InMemoryOrderStore::new();
        let a = compile(&input, &registry(), &mut first, &CompileOptions::default()).unwrap();
        let b = compile(&input, &registry(), &mut second, &CompileOptions::default()).unwrap();

        prop_assert_eq!(a.artifacts, b.artifacts);
        prop_assert_eq!(first.load_records().unwrap(), second.load_records().unwrap());
    }

    #[test]
    fn every_entity_yields_class_and_mapping(input in model()) {
        let output = compile_fresh(&input).unwrap();
        let entities = input.iter().filter(|s| s.concept_type.as_str() == "Entity").count();
        prop_assert_eq!(output.artifacts.len(), entities * 2);
        for artifact in &output.artifacts {
            prop_assert!(!artifact.text.contains("/*@"));
        }
    }
}
