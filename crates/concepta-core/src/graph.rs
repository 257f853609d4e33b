//! ConceptGraph: the arena holding every concept of one compilation.
//!
//! Concepts live in a petgraph `StableGraph` addressed by [`ConceptId`].
//! Edges point from a concept to every concept it references (key,
//! property, or declared dependency), so the arena doubles as the
//! dependency graph used for ordering.
//!
//! # Identity
//!
//! A concept's identity is its type plus its resolved key. Because every
//! reference is resolved to a [`ConceptId`] before insertion, and ids are
//! unique per identity, comparing `(type, key values)` compares the fully
//! substituted key structurally. The `keys` table deduplicates on that
//! fingerprint:
//! - re-adding an identical concept is a no-op ([`AddOutcome::Existing`]),
//! - re-adding with different content is [`CoreError::DuplicateKey`].
//!
//! # Indices
//!
//! Derived views ([`ConceptIndex`]) are built lazily and cached. Inserting a
//! concept updates each cached index in place when the index supports it and
//! nobody else holds it; otherwise the cached copy is dropped and rebuilt on
//! next use. An index obtained during expansion is therefore a snapshot.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use indexmap::{IndexMap, IndexSet};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

use crate::concept::{Concept, ConceptSpec, KeyRef, Reference, ReferenceKind, SpecValue, Value};
use crate::concept_type::ConceptType;
use crate::error::CoreError;
use crate::id::ConceptId;
use crate::index::{ByType, ConceptIndex};

/// Edge weight: why the source concept depends on the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub kind: ReferenceKind,
    /// Property holding the reference; `None` for declared dependencies.
    pub property: Option<String>,
}

/// Result of adding a concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The concept was new and has been inserted.
    Added(ConceptId),
    /// An identical concept already existed.
    Existing(ConceptId),
}

impl AddOutcome {
    pub fn id(&self) -> ConceptId {
        match self {
            AddOutcome::Added(id) | AddOutcome::Existing(id) => *id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, AddOutcome::Added(_))
    }
}

/// Which macro rule produced a concept, and from which source concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub rule: String,
    pub source: ConceptId,
}

/// Type plus key pairs sorted by property name, so the order in which key
/// properties were written does not change identity.
type KeyFingerprint = (ConceptType, Vec<(String, Value)>);

fn fingerprint(concept_type: &ConceptType, key: &IndexMap<String, Value>) -> KeyFingerprint {
    let mut pairs: Vec<(String, Value)> = key.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    (concept_type.clone(), pairs)
}

type AnyIndex = Arc<dyn Any + Send + Sync>;

struct CachedIndex {
    index: AnyIndex,
    update: fn(&mut AnyIndex, &ConceptGraph, ConceptId) -> bool,
}

impl fmt::Debug for CachedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedIndex").finish_non_exhaustive()
    }
}

/// Applies an insertion to a cached `I`; `false` if it must be rebuilt.
fn update_cached<I: ConceptIndex>(index: &mut AnyIndex, graph: &ConceptGraph, id: ConceptId) -> bool {
    Arc::get_mut(index)
        .and_then(|any| any.downcast_mut::<I>())
        .is_some_and(|index| index.concept_added(graph, id))
}

type IndexCache = HashMap<TypeId, CachedIndex>;

/// The concept arena.
#[derive(Debug, Default)]
pub struct ConceptGraph {
    arena: StableGraph<Concept, ReferenceEdge, Directed, u32>,
    keys: HashMap<KeyFingerprint, ConceptId>,
    origins: HashMap<ConceptId, Origin>,
    indices: RwLock<IndexCache>,
}

impl Clone for ConceptGraph {
    fn clone(&self) -> Self {
        ConceptGraph {
            arena: self.arena.clone(),
            keys: self.keys.clone(),
            origins: self.origins.clone(),
            indices: RwLock::new(HashMap::new()),
        }
    }
}

impl ConceptGraph {
    pub fn new() -> Self {
        ConceptGraph::default()
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.arena.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.node_count() == 0
    }

    pub fn contains(&self, id: ConceptId) -> bool {
        self.arena.contains_node(id.into())
    }

    pub fn get(&self, id: ConceptId) -> Option<&Concept> {
        self.arena.node_weight(id.into())
    }

    /// Like [`get`](Self::get) but reports a missing id as an error.
    pub fn concept(&self, id: ConceptId) -> Result<&Concept, CoreError> {
        self.get(id).ok_or(CoreError::ConceptNotFound { id })
    }

    /// All concepts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ConceptId, &Concept)> {
        self.arena
            .node_indices()
            .filter_map(move |idx| self.arena.node_weight(idx).map(|c| (ConceptId::from(idx), c)))
    }

    /// Which rule produced `id`; `None` for input concepts.
    pub fn origin(&self, id: ConceptId) -> Option<&Origin> {
        self.origins.get(&id)
    }

    /// Concepts `id` depends on (any reference kind), sorted, without duplicates.
    pub fn dependencies(&self, id: ConceptId) -> Vec<ConceptId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Concepts depending on `id`, sorted, without duplicates.
    pub fn dependents(&self, id: ConceptId) -> Vec<ConceptId> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: ConceptId, direction: Direction) -> Vec<ConceptId> {
        let mut ids: Vec<ConceptId> = self
            .arena
            .edges_directed(id.into(), direction)
            .map(|edge| match direction {
                Direction::Outgoing => ConceptId::from(edge.target()),
                Direction::Incoming => ConceptId::from(edge.source()),
            })
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Outgoing reference edges of `id` as `(kind, property, target)`,
    /// ordered by target then kind.
    pub fn references(&self, id: ConceptId) -> Vec<(ReferenceKind, Option<&str>, ConceptId)> {
        let mut refs: Vec<_> = self
            .arena
            .edges_directed(id.into(), Direction::Outgoing)
            .map(|edge| {
                (
                    edge.weight().kind,
                    edge.weight().property.as_deref(),
                    ConceptId::from(edge.target()),
                )
            })
            .collect();
        refs.sort_by_key(|(kind, _, target)| (*target, *kind as u8));
        refs
    }

    /// Ids of all concepts of `concept_type`, in insertion order.
    pub fn of_type(&self, concept_type: &ConceptType) -> Vec<ConceptId> {
        self.index::<ByType>().get(concept_type).to_vec()
    }

    // -----------------------------------------------------------------------
    // Identity and lookup
    // -----------------------------------------------------------------------

    /// Finds a concept by type and resolved key, in any key order.
    pub fn find_by_key(
        &self,
        concept_type: &ConceptType,
        key: &IndexMap<String, Value>,
    ) -> Option<ConceptId> {
        self.keys.get(&fingerprint(concept_type, key)).copied()
    }

    /// Finds a concept by a `(type, key)` lookup, resolving nested references.
    pub fn lookup(&self, key_ref: &KeyRef) -> Option<ConceptId> {
        let mut key = IndexMap::with_capacity(key_ref.key.len());
        for (name, value) in &key_ref.key {
            let resolved = match value {
                SpecValue::Literal(lit) => Value::Literal(lit.clone()),
                SpecValue::Ref {
                    target: Reference::Id(id),
                } => Value::Ref(*id),
                SpecValue::Ref {
                    target: Reference::Key(nested),
                } => Value::Ref(self.lookup(nested)?),
            };
            key.insert(name.clone(), resolved);
        }
        self.find_by_key(&key_ref.concept_type, &key)
    }

    /// The key text of `id` with referenced concepts substituted recursively,
    /// e.g. `Book.Title`.
    ///
    /// A concept keyed (transitively) by itself is a
    /// [`CoreError::DependencyCycle`].
    pub fn key_text(&self, id: ConceptId) -> Result<String, CoreError> {
        let mut stack = Vec::new();
        self.key_text_inner(id, &mut stack)
    }

    fn key_text_inner(&self, id: ConceptId, stack: &mut Vec<ConceptId>) -> Result<String, CoreError> {
        if let Some(pos) = stack.iter().position(|seen| *seen == id) {
            let members = stack[pos..]
                .iter()
                .map(|member| format!("{} #{}", self.type_name(*member), member))
                .collect();
            return Err(CoreError::DependencyCycle { members });
        }
        let concept = self.concept(id)?;
        stack.push(id);
        let mut parts = Vec::with_capacity(concept.key.len());
        for value in concept.key.values() {
            match value {
                Value::Literal(lit) => parts.push(lit.to_string()),
                Value::Ref(target) => parts.push(self.key_text_inner(*target, stack)?),
            }
        }
        stack.pop();
        Ok(parts.join("."))
    }

    fn type_name(&self, id: ConceptId) -> String {
        self.get(id)
            .map(|c| c.concept_type.to_string())
            .unwrap_or_default()
    }

    /// Key text for diagnostics; never fails.
    pub fn label(&self, id: ConceptId) -> String {
        self.key_text(id).unwrap_or_else(|_| format!("#{}", id))
    }

    /// `"<Type> <key text>"`, the form used in every diagnostic.
    pub fn describe(&self, id: ConceptId) -> String {
        match self.get(id) {
            Some(concept) => format!("{} {}", concept.concept_type, self.label(id)),
            None => format!("ConceptId({})", id),
        }
    }

    /// Descriptions from `id` back through the rules that produced it, ending
    /// at an input concept.
    pub fn origin_chain(&self, id: ConceptId) -> Vec<String> {
        let mut chain = vec![self.describe(id)];
        let mut current = id;
        while let Some(origin) = self.origins.get(&current) {
            if chain.len() > self.len() {
                break;
            }
            chain.push(self.describe(origin.source));
            current = origin.source;
        }
        chain
    }

    // -----------------------------------------------------------------------
    // Indices
    // -----------------------------------------------------------------------

    /// Returns the cached index `I`, building it on first use.
    pub fn index<I: ConceptIndex>(&self) -> Arc<I> {
        let key = TypeId::of::<I>();
        let cached = self
            .indices
            .read()
            .ok()
            .and_then(|cache| cache.get(&key).map(|entry| entry.index.clone()));
        if let Some(found) = cached {
            if let Ok(index) = found.downcast::<I>() {
                return index;
            }
        }

        let built = Arc::new(I::build(self));
        if let Ok(mut cache) = self.indices.write() {
            cache.insert(
                key,
                CachedIndex {
                    index: built.clone() as AnyIndex,
                    update: update_cached::<I>,
                },
            );
        }
        built
    }

    fn cache_mut(&mut self) -> &mut IndexCache {
        match self.indices.get_mut() {
            Ok(cache) => cache,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn invalidate_indices(&mut self) {
        self.cache_mut().clear();
    }

    /// Brings cached indices up to date with the newly inserted `id`.
    fn refresh_indices(&mut self, id: ConceptId) {
        let mut cache = std::mem::take(self.cache_mut());
        let graph: &ConceptGraph = self;
        cache.retain(|_, entry| (entry.update)(&mut entry.index, graph, id));
        *self.cache_mut() = cache;
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Resolves every reference in `spec` against the graph.
    pub fn resolve(&self, spec: &ConceptSpec) -> Result<Concept, CoreError> {
        let mut key = IndexMap::with_capacity(spec.key.len());
        for (name, value) in &spec.key {
            key.insert(name.clone(), self.resolve_value(value, spec)?);
        }
        let mut properties = IndexMap::with_capacity(spec.properties.len());
        for (name, value) in &spec.properties {
            properties.insert(name.clone(), self.resolve_value(value, spec)?);
        }
        let mut depends_on = Vec::with_capacity(spec.depends_on.len());
        for reference in &spec.depends_on {
            let id = self.resolve_reference(reference, spec)?;
            if !depends_on.contains(&id) {
                depends_on.push(id);
            }
        }
        Ok(Concept {
            concept_type: spec.concept_type.clone(),
            key,
            properties,
            depends_on,
        })
    }

    fn resolve_value(&self, value: &SpecValue, owner: &ConceptSpec) -> Result<Value, CoreError> {
        match value {
            SpecValue::Literal(lit) => Ok(Value::Literal(lit.clone())),
            SpecValue::Ref { target } => self.resolve_reference(target, owner).map(Value::Ref),
        }
    }

    fn resolve_reference(&self, reference: &Reference, owner: &ConceptSpec) -> Result<ConceptId, CoreError> {
        match reference {
            Reference::Id(id) if self.contains(*id) => Ok(*id),
            Reference::Id(id) => Err(CoreError::ConceptNotFound { id: *id }),
            Reference::Key(key_ref) => {
                self.lookup(key_ref)
                    .ok_or_else(|| CoreError::UnresolvedReference {
                        concept: owner.to_string(),
                        reference: key_ref.to_string(),
                    })
            }
        }
    }

    /// Adds a concept. Identical re-adds are no-ops; conflicting re-adds fail
    /// with [`CoreError::DuplicateKey`].
    pub fn add(&mut self, spec: &ConceptSpec) -> Result<AddOutcome, CoreError> {
        let concept = self.resolve(spec)?;
        self.insert(concept, None)
    }

    /// Adds a concept produced by a macro rule, recording its origin.
    pub fn add_derived(&mut self, spec: &ConceptSpec, origin: Origin) -> Result<AddOutcome, CoreError> {
        let concept = self.resolve(spec)?;
        self.insert(concept, Some(origin))
    }

    /// Bulk load that tolerates forward references.
    ///
    /// Specs whose references are not yet present are retried after the rest
    /// of the batch. Returns the number of new concepts.
    pub fn add_all(&mut self, specs: &[ConceptSpec]) -> Result<usize, CoreError> {
        let mut pending: Vec<&ConceptSpec> = specs.iter().collect();
        let mut added = 0;

        while !pending.is_empty() {
            let mut deferred = Vec::new();
            for spec in pending.iter().copied() {
                match self.add(spec) {
                    Ok(outcome) => {
                        if outcome.is_new() {
                            added += 1;
                        }
                    }
                    Err(CoreError::UnresolvedReference { .. }) => deferred.push(spec),
                    Err(e) => return Err(e),
                }
            }
            if deferred.len() == pending.len() {
                return Err(self.stuck_error(&deferred));
            }
            pending = deferred;
        }

        Ok(added)
    }

    /// Explains why a set of specs cannot be added: a reference cycle among
    /// them, or else the first missing reference.
    fn stuck_error(&self, stuck: &[&ConceptSpec]) -> CoreError {
        let identities: Vec<String> = stuck.iter().map(|spec| spec.to_string()).collect();

        let mut refs: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..stuck.len()).map(|i| refs.add_node(i)).collect();
        for (i, spec) in stuck.iter().enumerate() {
            for (_, reference) in spec.references() {
                if let Reference::Key(key_ref) = reference {
                    let text = key_ref.to_string();
                    if let Some(j) = identities.iter().position(|identity| *identity == text) {
                        refs.add_edge(nodes[i], nodes[j], ());
                    }
                }
            }
        }

        for component in tarjan_scc(&refs) {
            let cyclic = component.len() > 1
                || component
                    .first()
                    .is_some_and(|node| refs.contains_edge(*node, *node));
            if cyclic {
                let mut members: Vec<usize> = component.iter().map(|node| refs[*node]).collect();
                members.sort_unstable();
                return CoreError::DependencyCycle {
                    members: members.into_iter().map(|i| identities[i].clone()).collect(),
                };
            }
        }

        match stuck.first().map(|spec| self.resolve(spec)) {
            Some(Err(e)) => e,
            _ => CoreError::UnresolvedReference {
                concept: identities.first().cloned().unwrap_or_default(),
                reference: "<unknown>".to_string(),
            },
        }
    }

    fn insert(&mut self, concept: Concept, origin: Option<Origin>) -> Result<AddOutcome, CoreError> {
        for (_, _, target) in concept.references() {
            if !self.contains(target) {
                return Err(CoreError::ConceptNotFound { id: target });
            }
        }

        let fingerprint = fingerprint(&concept.concept_type, &concept.key);
        if let Some(&existing) = self.keys.get(&fingerprint) {
            return self.merge_existing(existing, concept);
        }

        let edges: Vec<(ConceptId, ReferenceEdge)> = concept
            .references()
            .into_iter()
            .map(|(kind, property, target)| {
                (
                    target,
                    ReferenceEdge {
                        kind,
                        property: property.map(str::to_string),
                    },
                )
            })
            .collect();

        let idx = self.arena.add_node(concept);
        for (target, edge) in edges {
            self.arena.add_edge(idx, target.into(), edge);
        }

        let id = ConceptId::from(idx);
        self.keys.insert(fingerprint, id);
        if let Some(origin) = origin {
            self.origins.insert(id, origin);
        }
        self.refresh_indices(id);
        Ok(AddOutcome::Added(id))
    }

    /// Inserts `concept` as given: no reference checks, no deduplication.
    /// Edges are added only toward concepts already present.
    #[cfg(any(test, feature = "testing"))]
    pub fn insert_unchecked(&mut self, concept: Concept) -> ConceptId {
        let edges: Vec<(ConceptId, ReferenceEdge)> = concept
            .references()
            .into_iter()
            .filter(|(_, _, target)| self.contains(*target))
            .map(|(kind, property, target)| {
                (
                    target,
                    ReferenceEdge {
                        kind,
                        property: property.map(str::to_string),
                    },
                )
            })
            .collect();

        let idx = self.arena.add_node(concept);
        for (target, edge) in edges {
            self.arena.add_edge(idx, target.into(), edge);
        }
        self.invalidate_indices();
        ConceptId::from(idx)
    }

    fn merge_existing(&mut self, existing: ConceptId, incoming: Concept) -> Result<AddOutcome, CoreError> {
        let current = self.concept(existing)?;
        if current.properties != incoming.properties {
            let detail = differing_properties(&current.properties, &incoming.properties);
            return Err(CoreError::DuplicateKey {
                concept: self.describe(existing),
                detail,
            });
        }

        // Declared dependencies from a re-add are merged, not compared.
        let extra: Vec<ConceptId> = incoming
            .depends_on
            .iter()
            .filter(|dep| !current.depends_on.contains(dep))
            .copied()
            .collect();
        for dependency in extra {
            self.declare_dependency(existing, dependency)?;
        }
        Ok(AddOutcome::Existing(existing))
    }

    /// Adds an explicit dependency edge `dependent -> dependency`.
    pub fn declare_dependency(&mut self, dependent: ConceptId, dependency: ConceptId) -> Result<(), CoreError> {
        if !self.contains(dependency) {
            return Err(CoreError::ConceptNotFound { id: dependency });
        }
        if dependent == dependency {
            return Err(CoreError::DependencyCycle {
                members: vec![self.describe(dependent)],
            });
        }
        let concept = self
            .arena
            .node_weight_mut(dependent.into())
            .ok_or(CoreError::ConceptNotFound { id: dependent })?;
        if concept.depends_on.contains(&dependency) {
            return Ok(());
        }
        concept.depends_on.push(dependency);
        self.arena.add_edge(
            dependent.into(),
            dependency.into(),
            ReferenceEdge {
                kind: ReferenceKind::Declared,
                property: None,
            },
        );
        self.invalidate_indices();
        Ok(())
    }
}

fn differing_properties(a: &IndexMap<String, Value>, b: &IndexMap<String, Value>) -> String {
    let names: IndexSet<&str> = a.keys().chain(b.keys()).map(String::as_str).collect();
    let differing: Vec<&str> = names
        .into_iter()
        .filter(|name| a.get(*name) != b.get(*name))
        .collect();
    format!("differing properties: {}", differing.join(", "))
}
