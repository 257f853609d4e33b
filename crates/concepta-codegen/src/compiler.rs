//! Top-level compilation pipeline orchestrating the full flow:
//! load orders -> build graph -> expand -> validate -> order -> emit
//! -> flush orders.
//!
//! The [`compile`] function is the main entry point. Order records are only
//! written back after every pass succeeded, so a failed compilation leaves
//! the store untouched. [`expand_input`] and [`check_input`] stop after the
//! expansion and validation passes respectively.

use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use rayon::prelude::*;

use concepta_check::validate_graph;
use concepta_core::concept::ConceptSpec;
use concepta_core::expand::{expand, ExpansionReport};
use concepta_core::graph::ConceptGraph;
use concepta_core::id::ConceptId;
use concepta_core::order::{OrderRecord, OrderRepository};
use concepta_storage::OrderStore;

use crate::emitter::{Destination, DestinationId};
use crate::error::{CompileError, DestinationFailure};
use crate::generator::CodeGenerator;
use crate::ordering::dependency_order;
use crate::registry::PluginRegistry;
use crate::{Artifact, CompileOptions, CompileOutput};

/// A graph at fixpoint, with the order repository that produced it.
#[derive(Debug)]
pub struct Expanded {
    pub graph: ConceptGraph,
    pub report: ExpansionReport,
    pub orders: OrderRepository,
}

/// Builds the graph from parser output and expands it to a fixpoint.
///
/// Every concept, input or derived, must have a registered type.
pub fn expand_input(
    input: &[ConceptSpec],
    registry: &PluginRegistry,
    records: Vec<OrderRecord>,
    options: &CompileOptions,
) -> Result<Expanded, CompileError> {
    options.cancellation.check()?;
    for spec in input {
        registry.types().ensure_known(&spec.concept_type)?;
    }

    let mut graph = ConceptGraph::new();
    graph.add_all(input)?;
    tracing::info!(concepts = graph.len(), "concept graph built");

    let mut orders = OrderRepository::from_records(records);
    let report = expand(
        &mut graph,
        registry.rules(),
        &mut orders,
        &options.expansion_options(),
    )?;

    for (_, concept) in graph.iter() {
        registry.types().ensure_known(&concept.concept_type)?;
    }

    Ok(Expanded {
        graph,
        report,
        orders,
    })
}

/// [`expand_input`] followed by semantic validation.
pub fn check_input(
    input: &[ConceptSpec],
    registry: &PluginRegistry,
    records: Vec<OrderRecord>,
    options: &CompileOptions,
) -> Result<Expanded, CompileError> {
    let expanded = expand_input(input, registry, records, options)?;
    options.cancellation.check()?;
    validate_graph(&expanded.graph, registry.checks())?;
    Ok(expanded)
}

/// Compiles `input` to ordered artifacts.
///
/// 1. Load every order record from `store`
/// 2. Build the graph and expand it ([`expand_input`])
/// 3. Validate it, collecting all errors
/// 4. Compute the dependency order
/// 5. Emit every destination, isolating failures per destination
/// 6. Append the newly assigned order records in one atomic batch
pub fn compile(
    input: &[ConceptSpec],
    registry: &PluginRegistry,
    store: &mut dyn OrderStore,
    options: &CompileOptions,
) -> Result<CompileOutput, CompileError> {
    compile_with(input, registry, store, options, |_| Ok(()))
}

/// [`compile`] with a `publish` step between emission and the order flush.
///
/// Callers writing artifacts somewhere fallible do it in `publish`, so a
/// failed write leaves the store untouched.
pub fn compile_with<F>(
    input: &[ConceptSpec],
    registry: &PluginRegistry,
    store: &mut dyn OrderStore,
    options: &CompileOptions,
    publish: F,
) -> Result<CompileOutput, CompileError>
where
    F: FnOnce(&[Artifact]) -> Result<(), CompileError>,
{
    let start = Instant::now();

    let records = store.load_records()?;
    let Expanded {
        graph,
        report,
        mut orders,
    } = check_input(input, registry, records, options)?;

    options.cancellation.check()?;
    let order = dependency_order(&graph)?;
    let artifacts = emit(&graph, &order, registry, options)?;

    options.cancellation.check()?;
    publish(&artifacts)?;
    let pending = orders.take_pending();
    store.append_records(&pending)?;

    tracing::info!(
        artifacts = artifacts.len(),
        concepts = graph.len(),
        order_records_added = pending.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "compilation finished"
    );

    Ok(CompileOutput {
        artifacts,
        expansion: report,
        concepts: graph.len(),
        order_records_added: pending.len(),
    })
}

type WorkList = Vec<(ConceptId, Arc<dyn CodeGenerator>)>;

/// Runs every generator and resolves each destination.
///
/// Work is grouped per destination, each group in `order`. Destinations
/// are independent, so they run in parallel when
/// [`CompileOptions::parallel_emission`] is set. Artifacts come back ordered
/// by the rank of the first concept contributing to each destination.
pub fn emit(
    graph: &ConceptGraph,
    order: &[ConceptId],
    registry: &PluginRegistry,
    options: &CompileOptions,
) -> Result<Vec<Artifact>, CompileError> {
    let mut failures = Vec::new();
    let mut plan: IndexMap<DestinationId, WorkList> = IndexMap::new();

    for &id in order {
        let concept = graph.concept(id)?;
        for generator in registry.generators_for(&concept.concept_type) {
            match generator.destination(id, graph) {
                Ok(destination) => plan
                    .entry(destination)
                    .or_default()
                    .push((id, generator.clone())),
                Err(error) => failures.push(DestinationFailure {
                    destination: format!("<{}>", generator.name()),
                    concept: graph.describe(id),
                    error,
                }),
            }
        }
    }

    let plan: Vec<(DestinationId, WorkList)> = plan.into_iter().collect();
    let emit_one = |(destination, work): &(DestinationId, WorkList)| {
        emit_destination(graph, destination, work, options)
    };
    let results: Vec<Result<Option<Artifact>, DestinationFailure>> = if options.parallel_emission {
        plan.par_iter().map(emit_one).collect()
    } else {
        plan.iter().map(emit_one).collect()
    };

    options.cancellation.check()?;

    let mut artifacts = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(Some(artifact)) => artifacts.push(artifact),
            Ok(None) => {}
            Err(failure) => failures.push(failure),
        }
    }

    if !failures.is_empty() {
        return Err(CompileError::Emission(failures));
    }
    tracing::info!(destinations = artifacts.len(), "emission finished");
    Ok(artifacts)
}

/// Emits one destination. The first generator fault stops it.
fn emit_destination(
    graph: &ConceptGraph,
    id: &DestinationId,
    work: &WorkList,
    options: &CompileOptions,
) -> Result<Option<Artifact>, DestinationFailure> {
    let mut destination = Destination::new(id.clone());

    for (concept, generator) in work {
        if options.cancellation.is_cancelled() {
            return Ok(None);
        }
        let mut writer = destination.writer(*concept, graph);
        if let Err(error) = generator.generate(*concept, &mut writer) {
            tracing::warn!(
                destination = %id,
                generator = generator.name(),
                concept = %graph.describe(*concept),
                %error,
                "destination failed"
            );
            return Err(DestinationFailure {
                destination: id.to_string(),
                concept: graph.describe(*concept),
                error,
            });
        }
    }

    tracing::debug!(destination = %id, contributions = work.len(), "destination emitted");
    Ok(destination.resolve().map(|text| Artifact {
        destination: id.clone(),
        text,
    }))
}
