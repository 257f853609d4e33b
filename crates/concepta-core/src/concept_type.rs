//! ConceptType and TypeRegistry for closed concept-type identity.
//!
//! Every concept carries a [`ConceptType`] naming its kind (`Entity`,
//! `Property`, ...). The [`TypeRegistry`] is the closed set of types known to
//! a compilation: it is filled once at startup from the plugin registry and
//! any concept of an unregistered type is rejected.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Name of a concept type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptType(String);

impl ConceptType {
    pub fn new(name: impl Into<String>) -> Self {
        ConceptType(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConceptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConceptType {
    fn from(name: &str) -> Self {
        ConceptType::new(name)
    }
}

impl From<String> for ConceptType {
    fn from(name: String) -> Self {
        ConceptType(name)
    }
}

impl PartialEq<str> for ConceptType {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ConceptType {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Registry of all concept types a compilation accepts.
///
/// Registration order is preserved so that listings are deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeRegistry {
    types: IndexSet<ConceptType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    /// Registers a type. Returns `false` if it was already known.
    pub fn register(&mut self, concept_type: ConceptType) -> bool {
        self.types.insert(concept_type)
    }

    pub fn contains(&self, concept_type: &ConceptType) -> bool {
        self.types.contains(concept_type)
    }

    /// Returns [`CoreError::UnknownConceptType`] unless the type is registered.
    pub fn ensure_known(&self, concept_type: &ConceptType) -> Result<(), CoreError> {
        if self.contains(concept_type) {
            Ok(())
        } else {
            Err(CoreError::UnknownConceptType {
                concept_type: concept_type.clone(),
            })
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConceptType> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let mut reg = TypeRegistry::new();
        assert!(reg.register(ConceptType::new("Entity")));
        assert!(!reg.register(ConceptType::new("Entity")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut reg = TypeRegistry::new();
        reg.register("Entity".into());

        assert!(reg.ensure_known(&"Entity".into()).is_ok());
        let err = reg.ensure_known(&"Widget".into()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnknownConceptType { ref concept_type } if concept_type == "Widget"
        ));
    }

    #[test]
    fn iteration_follows_registration_order() {
        let mut reg = TypeRegistry::new();
        reg.register("Property".into());
        reg.register("Entity".into());
        let names: Vec<&str> = reg.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, vec!["Property", "Entity"]);
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&ConceptType::new("Entity")).unwrap();
        assert_eq!(json, "\"Entity\"");
    }
}
