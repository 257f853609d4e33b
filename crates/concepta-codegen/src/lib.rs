//! Dependency ordering, tag-based code emission and the compile pipeline.
//!
//! This crate turns an expanded, validated concept graph into finished
//! text artifacts. Generators contribute fragments at named tags of a
//! destination template; the emitter logs every insertion and renders each
//! destination in one pass.
//!
//! # Modules
//!
//! - [`error`] -- Error types for all compilation failure modes
//! - [`ordering`] -- Topological emission order with insertion-order ties
//! - [`tags`] -- The `/*@name*/` marker syntax
//! - [`emitter`] -- Destinations, writers and resolution
//! - [`registry`] -- Plugin registry keyed by concept type
//! - [`compiler`] -- The end-to-end pipeline

pub mod compiler;
pub mod emitter;
pub mod error;
pub mod generator;
pub mod ordering;
pub mod registry;
pub mod tags;

pub use compiler::{check_input, compile, compile_with, emit, expand_input, Expanded};
pub use emitter::{Destination, DestinationId, DestinationWriter, Position};
pub use error::{CompileError, DestinationFailure, EmitError, GeneratorError};
pub use generator::CodeGenerator;
pub use registry::{PluginRegistry, PluginRegistryBuilder};

use serde::{Deserialize, Serialize};

use concepta_core::cancel::CancellationToken;
use concepta_core::expand::{ExpansionOptions, ExpansionReport, DEFAULT_MAX_ITERATIONS};

/// Options controlling the compilation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Budget of expansion scans before giving up on a fixpoint.
    pub max_iterations: usize,

    /// Emit independent destinations on the rayon thread pool.
    pub parallel_emission: bool,

    /// Shared abort flag, checked between passes and scans.
    #[serde(skip)]
    pub cancellation: CancellationToken,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            parallel_emission: false,
            cancellation: CancellationToken::default(),
        }
    }
}

impl CompileOptions {
    pub fn expansion_options(&self) -> ExpansionOptions {
        ExpansionOptions {
            max_iterations: self.max_iterations,
            cancellation: self.cancellation.clone(),
        }
    }
}

/// One finished artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub destination: DestinationId,
    pub text: String,
}

/// Result of a successful compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileOutput {
    /// Artifacts in emission order.
    pub artifacts: Vec<Artifact>,

    pub expansion: ExpansionReport,

    /// Concepts in the fixpoint graph.
    pub concepts: usize,

    /// Order records written to the store by this compilation.
    pub order_records_added: usize,
}
