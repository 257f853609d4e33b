//! The plugin registry: capabilities keyed by concept type.
//!
//! Built once at startup with [`PluginRegistryBuilder`] and read-only after
//! that. Registration order is the execution priority of macro rules and
//! semantic checks; nothing is inferred.

use std::sync::Arc;

use indexmap::IndexMap;

use concepta_check::SemanticCheck;
use concepta_core::concept_type::{ConceptType, TypeRegistry};
use concepta_core::expand::MacroRule;

use crate::generator::CodeGenerator;

/// Capability table for one compilation.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    types: TypeRegistry,
    rules: Vec<Arc<dyn MacroRule>>,
    checks: Vec<Arc<dyn SemanticCheck>>,
    generators: IndexMap<ConceptType, Vec<Arc<dyn CodeGenerator>>>,
}

impl PluginRegistry {
    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::default()
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Macro rules in execution order.
    pub fn rules(&self) -> &[Arc<dyn MacroRule>] {
        &self.rules
    }

    pub fn checks(&self) -> &[Arc<dyn SemanticCheck>] {
        &self.checks
    }

    /// Generators for `concept_type`, in registration order.
    pub fn generators_for(&self, concept_type: &ConceptType) -> &[Arc<dyn CodeGenerator>] {
        self.generators
            .get(concept_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn generator_count(&self) -> usize {
        self.generators.values().map(Vec::len).sum()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("types", &self.types.len())
            .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
            .field("checks", &self.checks.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("generators", &self.generator_count())
            .finish()
    }
}

/// Builder for [`PluginRegistry`].
///
/// Registering a capability also registers its concept type.
#[derive(Default)]
pub struct PluginRegistryBuilder {
    registry: PluginRegistry,
}

impl PluginRegistryBuilder {
    /// Declares a concept type that has no capabilities of its own.
    pub fn concept_type(&mut self, concept_type: impl Into<ConceptType>) -> &mut Self {
        self.registry.types.register(concept_type.into());
        self
    }

    pub fn macro_rule(&mut self, rule: impl MacroRule + 'static) -> &mut Self {
        self.registry.types.register(rule.concept_type());
        self.registry.rules.push(Arc::new(rule));
        self
    }

    pub fn check(&mut self, check: impl SemanticCheck + 'static) -> &mut Self {
        self.registry.types.register(check.concept_type());
        self.registry.checks.push(Arc::new(check));
        self
    }

    pub fn generator(&mut self, generator: impl CodeGenerator + 'static) -> &mut Self {
        let concept_type = generator.concept_type();
        self.registry.types.register(concept_type.clone());
        self.registry
            .generators
            .entry(concept_type)
            .or_default()
            .push(Arc::new(generator));
        self
    }

    pub fn build(&mut self) -> PluginRegistry {
        let registry = std::mem::take(&mut self.registry);
        tracing::debug!(?registry, "plugin registry built");
        registry
    }
}
