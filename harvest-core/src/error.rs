//! Error types for the `harvest-core` crate.

use thiserror::Error;

use crate::pipeline::RunSummary;

/// Errors that can occur while expanding keywords or harvesting a corpus.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// No embedding model is registered (or loadable) for the language.
    #[error("Model unavailable for language '{language}': {message}")]
    ModelUnavailable {
        /// The language tag that was requested.
        language: String,
        /// A description of the failure.
        message: String,
    },

    /// The term is out of vocabulary for the language's model.
    ///
    /// Recoverable: the expander treats it as "no neighbours".
    #[error("Unknown term '{term}' for language '{language}'")]
    UnknownTerm {
        /// The term that was looked up.
        term: String,
        /// The language tag of the model that was queried.
        language: String,
    },

    /// The corpus sink could not persist a record.
    #[error("Sink write error ({sink}): {message}")]
    SinkWrite {
        /// The sink implementation that produced the error.
        sink: String,
        /// A description of the failure.
        message: String,
    },

    /// The source collaborator failed to produce the next unit.
    #[error("Source read error: {0}")]
    SourceRead(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The run was cancelled before the source was exhausted.
    #[error("Run cancelled")]
    Cancelled,

    /// An error in pipeline orchestration (e.g. a stage task panicked).
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HarvestError {
    /// Whether the error is local to one lookup and the caller may continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, HarvestError::UnknownTerm { .. })
    }
}

/// A convenience result type for harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// A pipeline failure carrying the progress made before the run stopped.
///
/// Records already handed to the sink stay valid; `summary` accounts for
/// every unit fetched up to the failure.
#[derive(Debug, Error)]
#[error("run aborted after {} units: {error}", .summary.fetched)]
pub struct RunError {
    /// Counters accumulated up to the failure.
    pub summary: RunSummary,
    /// The error that stopped the run.
    #[source]
    pub error: HarvestError,
}

impl RunError {
    pub(crate) fn new(summary: RunSummary, error: HarvestError) -> Self {
        Self { summary, error }
    }
}
