//! Macro expansion: rewrite the concept graph to a fixpoint.
//!
//! Each [`MacroRule`] is scoped to one concept type. A scan walks the rules in
//! registration order; for each rule it visits the concepts of its type that
//! the rule has not seen yet, in insertion order, and merges the produced
//! specs into the graph. Scans repeat until one adds nothing.
//!
//! The only interruption points are scan boundaries: cancellation and the
//! iteration budget are checked there and never inside a rule invocation.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cancel::CancellationToken;
use crate::concept::{Concept, ConceptSpec};
use crate::concept_type::ConceptType;
use crate::error::CoreError;
use crate::graph::{ConceptGraph, Origin};
use crate::id::ConceptId;
use crate::order::{OrderRepository, ProductionSite};

/// Default iteration budget.
pub const DEFAULT_MAX_ITERATIONS: usize = 64;

/// Fault reported by a macro rule.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RuleError {
    pub message: String,
}

impl RuleError {
    pub fn new(message: impl Into<String>) -> Self {
        RuleError {
            message: message.into(),
        }
    }
}

impl From<CoreError> for RuleError {
    fn from(err: CoreError) -> Self {
        RuleError::new(err.to_string())
    }
}

/// A rewrite capability for one concept type.
///
/// Rules must be idempotent: the engine never invokes a rule twice on the
/// same concept, and re-adding an identical concept is a no-op, so a rule
/// may simply describe everything its source implies.
pub trait MacroRule: Send + Sync {
    /// Stable name, used in production-site signatures and diagnostics.
    fn name(&self) -> &str;

    fn concept_type(&self) -> ConceptType;

    fn expand(&self, ctx: &mut ExpansionContext<'_>) -> Result<Vec<ConceptSpec>, RuleError>;
}

/// What a rule sees while expanding one source concept.
pub struct ExpansionContext<'a> {
    graph: &'a ConceptGraph,
    source: ConceptId,
    rule: &'a str,
    orders: &'a mut OrderRepository,
}

impl<'a> ExpansionContext<'a> {
    pub fn new(
        graph: &'a ConceptGraph,
        source: ConceptId,
        rule: &'a str,
        orders: &'a mut OrderRepository,
    ) -> Self {
        ExpansionContext {
            graph,
            source,
            rule,
            orders,
        }
    }

    pub fn graph(&self) -> &'a ConceptGraph {
        self.graph
    }

    pub fn source(&self) -> ConceptId {
        self.source
    }

    /// The source concept.
    pub fn concept(&self) -> Result<&'a Concept, RuleError> {
        Ok(self.graph.concept(self.source)?)
    }

    /// Stable sequence number for `logical_key` at this rule and source.
    pub fn sequence(&mut self, logical_key: &str) -> u32 {
        self.sequence_at(self.source, logical_key)
    }

    /// Like [`sequence`](Self::sequence) but anchored at another concept, so
    /// that several sources share one numbering (e.g. all indexes of an
    /// entity).
    pub fn sequence_at(&mut self, anchor: ConceptId, logical_key: &str) -> u32 {
        let site = ProductionSite::new(self.rule, self.graph.describe(anchor));
        self.orders.sequence(&site, logical_key)
    }
}

/// Budget and cancellation for one expansion.
#[derive(Debug, Clone)]
pub struct ExpansionOptions {
    pub max_iterations: usize,
    pub cancellation: CancellationToken,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        ExpansionOptions {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            cancellation: CancellationToken::default(),
        }
    }
}

/// Summary of an expansion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionReport {
    pub initial_concepts: usize,
    pub final_concepts: usize,
    /// Scans executed, including the final one that added nothing.
    pub iterations: usize,
    /// New concepts per rule, in rule order.
    pub produced: IndexMap<String, usize>,
}

impl ExpansionReport {
    pub fn added(&self) -> usize {
        self.final_concepts - self.initial_concepts
    }
}

/// Expands `graph` to a fixpoint.
///
/// `rules` are applied in the given order. Synthesized identities draw their
/// sequence numbers from `orders`; new assignments stay pending there.
pub fn expand(
    graph: &mut ConceptGraph,
    rules: &[Arc<dyn MacroRule>],
    orders: &mut OrderRepository,
    options: &ExpansionOptions,
) -> Result<ExpansionReport, CoreError> {
    let budget = options.max_iterations.max(1);
    let mut report = ExpansionReport {
        initial_concepts: graph.len(),
        produced: rules.iter().map(|r| (r.name().to_string(), 0)).collect(),
        ..ExpansionReport::default()
    };
    let mut visited: HashSet<(usize, ConceptId)> = HashSet::new();

    loop {
        options.cancellation.check()?;
        report.iterations += 1;

        let mut added = 0usize;
        let mut newest: Option<(usize, ConceptId)> = None;

        for (rule_idx, rule) in rules.iter().enumerate() {
            let candidates = graph.of_type(&rule.concept_type());
            for source in candidates {
                if !visited.insert((rule_idx, source)) {
                    continue;
                }

                let specs = {
                    let mut ctx = ExpansionContext::new(graph, source, rule.name(), orders);
                    rule.expand(&mut ctx).map_err(|e| CoreError::MacroFailed {
                        rule: rule.name().to_string(),
                        concept: graph.describe(source),
                        message: e.message,
                    })?
                };

                let mut produced_here = 0usize;
                for spec in &specs {
                    let origin = Origin {
                        rule: rule.name().to_string(),
                        source,
                    };
                    let outcome = graph.add_derived(spec, origin)?;
                    if outcome.is_new() {
                        produced_here += 1;
                        newest = Some((rule_idx, outcome.id()));
                    }
                }

                if produced_here > 0 {
                    tracing::debug!(
                        rule = rule.name(),
                        source = %graph.describe(source),
                        produced = produced_here,
                        "macro rule produced concepts"
                    );
                    added += produced_here;
                    if let Some(count) = report.produced.get_mut(rule.name()) {
                        *count += produced_here;
                    }
                }
            }
        }

        if added == 0 {
            break;
        }

        if report.iterations >= budget {
            let (rule_idx, concept) = newest.unwrap_or((0, ConceptId(0)));
            let rule = rules
                .get(rule_idx)
                .map(|r| r.name().to_string())
                .unwrap_or_default();
            tracing::warn!(rule = %rule, iterations = report.iterations, "expansion budget exhausted");
            return Err(CoreError::ExpansionNonTermination {
                rule,
                iterations: report.iterations,
                chain: graph.origin_chain(concept),
            });
        }
    }

    report.final_concepts = graph.len();
    tracing::info!(
        iterations = report.iterations,
        initial = report.initial_concepts,
        added = report.added(),
        "macro expansion reached fixpoint"
    );
    Ok(report)
}
