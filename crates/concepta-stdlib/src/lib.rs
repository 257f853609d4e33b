//! A small standard concept library.
//!
//! Entities with typed properties, their persistence, unique indexes and
//! `KeepSynchronized` recompute hooks. It exists to drive every capability
//! of the engine (macro rules, checks, generators, stable sequence numbers)
//! with a realistic model, and is what the `concepta` binary compiles.
//!
//! # Modules
//!
//! - [`concepts`] -- Concept type names and spec constructors
//! - [`macros`] -- Macro rules deriving persistence and indexes
//! - [`checks`] -- Semantic checks
//! - [`generators`] -- Class and mapping generators

pub mod checks;
pub mod concepts;
pub mod generators;
pub mod macros;

use concepta_codegen::{PluginRegistry, PluginRegistryBuilder};

use crate::concepts::{CHANGES_ON_CHANGED_ITEMS, READ_CHANGED_ITEMS};

/// Registers every standard capability on `builder`.
///
/// Macro rules are registered in the order they are meant to fire.
pub fn install(builder: &mut PluginRegistryBuilder) -> &mut PluginRegistryBuilder {
    builder
        .concept_type(CHANGES_ON_CHANGED_ITEMS)
        .concept_type(READ_CHANGED_ITEMS)
        .macro_rule(macros::EntityPersistence)
        .macro_rule(macros::PersistedProperties)
        .macro_rule(macros::PropertyPersistence)
        .macro_rule(macros::UniqueIndexes)
        .check(checks::KnownPropertyType)
        .check(checks::KeepSynchronizedSources)
        .generator(generators::EntityClass)
        .generator(generators::PropertyMember)
        .generator(generators::PersistedStorage)
        .generator(generators::PersistedMapping)
        .generator(generators::PropertyPersistedCode)
        .generator(generators::PropertyColumn)
        .generator(generators::UniqueIndexMapping)
        .generator(generators::KeepSynchronizedHook)
}

/// A registry with only the standard capabilities.
pub fn registry() -> PluginRegistry {
    let mut builder = PluginRegistry::builder();
    install(&mut builder);
    let registry = builder.build();
    tracing::debug!(
        types = registry.types().len(),
        rules = registry.rules().len(),
        generators = registry.generator_count(),
        "standard library installed"
    );
    registry
}
