//! Error types for ordering, emission and the compile pipeline.

use concepta_check::ValidationReport;
use concepta_core::error::CoreError;
use concepta_storage::StorageError;
use serde::Serialize;

/// Misuse of a destination's tag namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum EmitError {
    /// Insertion at a tag that no template or earlier fragment declared.
    #[error("undefined tag '{tag}' in destination '{destination}' (inserted by {concept})")]
    UndefinedTag {
        destination: String,
        tag: String,
        /// The concept whose generator attempted the insertion.
        concept: String,
    },

    /// A template or fragment declares a tag the destination already has.
    #[error("duplicate tag '{tag}' in destination '{destination}' (declared by {concept}, first declared by {first})")]
    DuplicateTag {
        destination: String,
        tag: String,
        concept: String,
        first: String,
    },

    /// A second generator tried to open an already opened destination.
    #[error("template for destination '{destination}' set by {concept}, already set by {first}")]
    TemplateAlreadySet {
        destination: String,
        concept: String,
        first: String,
    },

    /// A tag name outside the allowed character set.
    #[error("invalid tag name '{tag}' in destination '{destination}'")]
    InvalidTagName { destination: String, tag: String },
}

/// Failure of one generator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Emit(#[from] EmitError),

    /// The generator itself reported a fault.
    #[error("{0}")]
    Failed(String),
}

impl From<CoreError> for GeneratorError {
    fn from(err: CoreError) -> Self {
        GeneratorError::Failed(err.to_string())
    }
}

/// The first failure that stopped one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("destination '{destination}' failed at {concept}: {error}")]
pub struct DestinationFailure {
    pub destination: String,
    pub concept: String,
    pub error: GeneratorError,
}

/// Errors aborting a whole compilation.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Graph construction, expansion, ordering, or cancellation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Semantic validation found one or more errors.
    #[error(transparent)]
    Validation(#[from] ValidationReport),

    /// One or more destinations failed to emit.
    #[error("emission failed for {} destination(s)", .0.len())]
    Emission(Vec<DestinationFailure>),

    /// Loading or flushing order records failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Publishing the artifacts failed; no order records were flushed.
    #[error("publishing artifacts failed: {0}")]
    Publish(String),
}
