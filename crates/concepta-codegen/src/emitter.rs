//! Tag-addressed code emission into destination artifacts.
//!
//! A [`Destination`] is one output artifact. It is opened by a template whose
//! `/*@tag*/` markers declare the initial tags. Generators then append
//! fragments at declared tags through a [`DestinationWriter`]; markers inside
//! a fragment declare further tags for later generators. Nothing is spliced
//! during emission: every insertion is appended to a log, and
//! [`Destination::resolve`] renders the final text in one pass.
//!
//! Invariants kept by the writer:
//! - an insertion only targets a tag declared earlier,
//! - every tag is declared exactly once per destination,
//!
//! so each marker is rendered once and resolution always terminates.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use concepta_core::graph::ConceptGraph;
use concepta_core::id::ConceptId;

use crate::error::EmitError;
use crate::tags;

/// Identifier of an output artifact, e.g. `Book` or `Book.Mapping`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationId(String);

impl DestinationId {
    pub fn new(id: impl Into<String>) -> Self {
        DestinationId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DestinationId {
    fn from(id: &str) -> Self {
        DestinationId::new(id)
    }
}

impl From<String> for DestinationId {
    fn from(id: String) -> Self {
        DestinationId(id)
    }
}

/// Where a fragment goes relative to the other fragments at its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    /// Rendered ahead of every `After` fragment at the tag.
    Before,
    After,
}

/// One logged insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub tag: String,
    pub position: Position,
    pub fragment: String,
    pub concept: ConceptId,
}

/// The state of one output artifact during emission.
#[derive(Debug, Clone)]
pub struct Destination {
    id: DestinationId,
    template: Option<(String, ConceptId)>,
    /// Declared tags and the concept that declared each.
    tags: IndexMap<String, ConceptId>,
    log: Vec<Insertion>,
}

impl Destination {
    pub fn new(id: DestinationId) -> Self {
        Destination {
            id,
            template: None,
            tags: IndexMap::new(),
            log: Vec::new(),
        }
    }

    pub fn id(&self) -> &DestinationId {
        &self.id
    }

    /// Whether a template has been set.
    pub fn is_open(&self) -> bool {
        self.template.is_some()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    /// Declared tags, in declaration order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    pub fn log(&self) -> &[Insertion] {
        &self.log
    }

    /// Opens a writer acting on behalf of `concept`.
    pub fn writer<'a>(&'a mut self, concept: ConceptId, graph: &'a ConceptGraph) -> DestinationWriter<'a> {
        DestinationWriter {
            destination: self,
            concept,
            graph,
        }
    }

    fn declare_markers(&mut self, text: &str, concept: ConceptId, graph: &ConceptGraph) -> Result<(), EmitError> {
        for marker in tags::scan(text) {
            if let Some(first) = self.tags.get(marker.name) {
                return Err(EmitError::DuplicateTag {
                    destination: self.id.to_string(),
                    tag: marker.name.to_string(),
                    concept: graph.describe(concept),
                    first: graph.describe(*first),
                });
            }
            self.tags.insert(marker.name.to_string(), concept);
        }
        Ok(())
    }

    /// Renders the final text; `None` when no template was ever set.
    ///
    /// Each marker is replaced by the `Before` fragments at its tag, then the
    /// `After` fragments, each group in insertion order. Markers inside
    /// fragments are resolved the same way, and no marker survives.
    pub fn resolve(&self) -> Option<String> {
        let (template, _) = self.template.as_ref()?;

        let mut by_tag: IndexMap<&str, (Vec<&str>, Vec<&str>)> = IndexMap::new();
        for insertion in &self.log {
            let slot = by_tag.entry(insertion.tag.as_str()).or_default();
            match insertion.position {
                Position::Before => slot.0.push(&insertion.fragment),
                Position::After => slot.1.push(&insertion.fragment),
            }
        }

        let mut out = String::with_capacity(template.len());
        render(template, &by_tag, &mut out);
        Some(out)
    }
}

fn render(text: &str, by_tag: &IndexMap<&str, (Vec<&str>, Vec<&str>)>, out: &mut String) {
    let mut pos = 0;
    for marker in tags::scan(text) {
        out.push_str(&text[pos..marker.start]);
        if let Some((before, after)) = by_tag.get(marker.name) {
            for fragment in before.iter().chain(after.iter()) {
                render(fragment, by_tag, out);
            }
        }
        pos = marker.end;
    }
    out.push_str(&text[pos..]);
}

/// Write access to one destination on behalf of one concept.
pub struct DestinationWriter<'a> {
    destination: &'a mut Destination,
    concept: ConceptId,
    graph: &'a ConceptGraph,
}

impl<'a> DestinationWriter<'a> {
    pub fn destination(&self) -> &DestinationId {
        &self.destination.id
    }

    pub fn concept(&self) -> ConceptId {
        self.concept
    }

    pub fn graph(&self) -> &'a ConceptGraph {
        self.graph
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.destination.has_tag(tag)
    }

    /// Opens the destination with `template`, declaring its markers.
    pub fn set_template(&mut self, template: impl Into<String>) -> Result<(), EmitError> {
        if let Some((_, first)) = &self.destination.template {
            return Err(EmitError::TemplateAlreadySet {
                destination: self.destination.id.to_string(),
                concept: self.graph.describe(self.concept),
                first: self.graph.describe(*first),
            });
        }
        let template = template.into();
        self.destination
            .declare_markers(&template, self.concept, self.graph)?;
        self.destination.template = Some((template, self.concept));
        Ok(())
    }

    /// Appends `fragment` at `tag`. The tag must already be declared.
    pub fn insert(&mut self, tag: &str, fragment: impl Into<String>, position: Position) -> Result<(), EmitError> {
        if !tags::is_valid_name(tag) {
            return Err(EmitError::InvalidTagName {
                destination: self.destination.id.to_string(),
                tag: tag.to_string(),
            });
        }
        if !self.destination.has_tag(tag) {
            return Err(EmitError::UndefinedTag {
                destination: self.destination.id.to_string(),
                tag: tag.to_string(),
                concept: self.graph.describe(self.concept),
            });
        }

        let fragment = fragment.into();
        self.destination
            .declare_markers(&fragment, self.concept, self.graph)?;
        self.destination.log.push(Insertion {
            tag: tag.to_string(),
            position,
            fragment,
            concept: self.concept,
        });
        Ok(())
    }

    pub fn insert_before(&mut self, tag: &str, fragment: impl Into<String>) -> Result<(), EmitError> {
        self.insert(tag, fragment, Position::Before)
    }

    pub fn insert_after(&mut self, tag: &str, fragment: impl Into<String>) -> Result<(), EmitError> {
        self.insert(tag, fragment, Position::After)
    }
}
