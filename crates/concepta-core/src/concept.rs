//! Concept records and their unresolved specification form.
//!
//! Two shapes of the same data exist:
//! - [`ConceptSpec`] is what the external parser and macro rules produce.
//!   References inside it are either an already-resolved [`ConceptId`] or a
//!   `(type, key)` lookup ([`KeyRef`]).
//! - [`Concept`] is what lives in the graph arena. Every reference has been
//!   resolved to a [`ConceptId`], which makes identity structural: two keys
//!   are equal exactly when their literals and referenced ids are equal.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::concept_type::ConceptType;
use crate::id::ConceptId;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A literal property value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Str(s) => f.write_str(s),
        }
    }
}

/// A resolved property value stored in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Literal(Literal),
    Ref(ConceptId),
}

impl Value {
    /// Returns the referenced concept, if this is a reference.
    pub fn as_ref_id(&self) -> Option<ConceptId> {
        match self {
            Value::Ref(id) => Some(*id),
            Value::Literal(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Literal(Literal::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Literal(Literal::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Literal(Literal::Int(i)) => Some(*i),
            _ => None,
        }
    }
}

/// Where a reference sits inside its concept. Drives dependency edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// Part of the concept's identity (implicit dependency).
    Key,
    /// Held by a non-key property.
    Property,
    /// Declared explicitly through `depends_on`.
    Declared,
}

// ---------------------------------------------------------------------------
// Resolved concept
// ---------------------------------------------------------------------------

/// A concept instance stored in the graph.
///
/// Key and non-key properties are set once at creation and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub concept_type: ConceptType,
    /// Key properties, in declaration order. Together with the type they form
    /// the concept's identity.
    pub key: IndexMap<String, Value>,
    /// Non-key properties.
    pub properties: IndexMap<String, Value>,
    /// Explicitly declared dependencies.
    pub depends_on: Vec<ConceptId>,
}

impl Concept {
    /// Looks up a property by name, searching key properties first.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.key.get(name).or_else(|| self.properties.get(name))
    }

    /// Returns the concept referenced by property `name`, if any.
    pub fn reference(&self, name: &str) -> Option<ConceptId> {
        self.get(name).and_then(Value::as_ref_id)
    }

    /// Returns the string literal held by property `name`, if any.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Returns the boolean held by property `name`, `false` when absent.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// All outgoing references: `(kind, property name, target)`.
    ///
    /// Declared dependencies have no property name.
    pub fn references(&self) -> Vec<(ReferenceKind, Option<&str>, ConceptId)> {
        let key = self
            .key
            .iter()
            .filter_map(|(name, v)| v.as_ref_id().map(|id| (ReferenceKind::Key, Some(name.as_str()), id)));
        let props = self.properties.iter().filter_map(|(name, v)| {
            v.as_ref_id()
                .map(|id| (ReferenceKind::Property, Some(name.as_str()), id))
        });
        let declared = self
            .depends_on
            .iter()
            .map(|id| (ReferenceKind::Declared, None, *id));
        key.chain(props).chain(declared).collect()
    }
}

// ---------------------------------------------------------------------------
// Unresolved specification
// ---------------------------------------------------------------------------

/// A reference to another concept, as written by the parser or a macro rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    /// A concept already in the graph.
    Id(ConceptId),
    /// A concept identified by type and key.
    Key(KeyRef),
}

impl Reference {
    /// Shorthand for a key lookup reference.
    pub fn key(concept_type: impl Into<ConceptType>) -> KeyRef {
        KeyRef::new(concept_type)
    }
}

impl From<ConceptId> for Reference {
    fn from(id: ConceptId) -> Self {
        Reference::Id(id)
    }
}

impl From<KeyRef> for Reference {
    fn from(key: KeyRef) -> Self {
        Reference::Key(key)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Id(id) => write!(f, "ConceptId({})", id),
            Reference::Key(key) => key.fmt(f),
        }
    }
}

/// A `(type, key)` lookup of another concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRef {
    #[serde(rename = "type")]
    pub concept_type: ConceptType,
    #[serde(default)]
    pub key: IndexMap<String, SpecValue>,
}

impl KeyRef {
    pub fn new(concept_type: impl Into<ConceptType>) -> Self {
        KeyRef {
            concept_type: concept_type.into(),
            key: IndexMap::new(),
        }
    }

    /// Adds a key value (builder style).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SpecValue>) -> Self {
        self.key.insert(name.into(), value.into());
        self
    }

    /// Dot-joined key text, e.g. `Book.Title`.
    pub fn key_text(&self) -> String {
        key_text_of(&self.key)
    }
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.concept_type, self.key_text())
    }
}

/// A property value inside a [`ConceptSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecValue {
    Ref {
        #[serde(rename = "ref")]
        target: Reference,
    },
    Literal(Literal),
}

impl SpecValue {
    fn key_text(&self) -> String {
        match self {
            SpecValue::Literal(lit) => lit.to_string(),
            SpecValue::Ref {
                target: Reference::Key(key),
            } => key.key_text(),
            SpecValue::Ref {
                target: Reference::Id(id),
            } => format!("#{}", id),
        }
    }

    /// The reference carried by this value, if any.
    pub fn reference(&self) -> Option<&Reference> {
        match self {
            SpecValue::Ref { target } => Some(target),
            SpecValue::Literal(_) => None,
        }
    }
}

impl From<&str> for SpecValue {
    fn from(s: &str) -> Self {
        SpecValue::Literal(Literal::Str(s.to_string()))
    }
}

impl From<String> for SpecValue {
    fn from(s: String) -> Self {
        SpecValue::Literal(Literal::Str(s))
    }
}

impl From<i64> for SpecValue {
    fn from(i: i64) -> Self {
        SpecValue::Literal(Literal::Int(i))
    }
}

impl From<bool> for SpecValue {
    fn from(b: bool) -> Self {
        SpecValue::Literal(Literal::Bool(b))
    }
}

impl From<Literal> for SpecValue {
    fn from(lit: Literal) -> Self {
        SpecValue::Literal(lit)
    }
}

impl From<ConceptId> for SpecValue {
    fn from(id: ConceptId) -> Self {
        SpecValue::Ref {
            target: Reference::Id(id),
        }
    }
}

impl From<KeyRef> for SpecValue {
    fn from(key: KeyRef) -> Self {
        SpecValue::Ref {
            target: Reference::Key(key),
        }
    }
}

impl From<Reference> for SpecValue {
    fn from(target: Reference) -> Self {
        SpecValue::Ref { target }
    }
}

fn key_text_of(key: &IndexMap<String, SpecValue>) -> String {
    key.values()
        .map(SpecValue::key_text)
        .collect::<Vec<_>>()
        .join(".")
}

/// An unresolved concept, as delivered by the parser or produced by a macro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptSpec {
    #[serde(rename = "type")]
    pub concept_type: ConceptType,
    #[serde(default)]
    pub key: IndexMap<String, SpecValue>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, SpecValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<Reference>,
}

impl ConceptSpec {
    pub fn new(concept_type: impl Into<ConceptType>) -> Self {
        ConceptSpec {
            concept_type: concept_type.into(),
            key: IndexMap::new(),
            properties: IndexMap::new(),
            depends_on: Vec::new(),
        }
    }

    /// Adds a key property (builder style).
    pub fn key(mut self, name: impl Into<String>, value: impl Into<SpecValue>) -> Self {
        self.key.insert(name.into(), value.into());
        self
    }

    /// Adds a non-key property (builder style).
    pub fn property(mut self, name: impl Into<String>, value: impl Into<SpecValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Declares an explicit dependency (builder style).
    pub fn depends_on(mut self, target: impl Into<Reference>) -> Self {
        self.depends_on.push(target.into());
        self
    }

    /// Dot-joined key text, e.g. `Book.Title`.
    pub fn key_text(&self) -> String {
        key_text_of(&self.key)
    }

    /// The key lookup that finds this concept once it is in the graph.
    pub fn as_key_ref(&self) -> KeyRef {
        KeyRef {
            concept_type: self.concept_type.clone(),
            key: self.key.clone(),
        }
    }

    /// Every reference in the spec, with its kind.
    pub fn references(&self) -> Vec<(ReferenceKind, &Reference)> {
        let key = self
            .key
            .values()
            .filter_map(|v| v.reference().map(|r| (ReferenceKind::Key, r)));
        let props = self
            .properties
            .values()
            .filter_map(|v| v.reference().map(|r| (ReferenceKind::Property, r)));
        let declared = self.depends_on.iter().map(|r| (ReferenceKind::Declared, r));
        key.chain(props).chain(declared).collect()
    }
}

impl fmt::Display for ConceptSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.concept_type, self.key_text())
    }
}
