use thiserror::Error;

/// Errors surfaced by engine operations.
///
/// Source fetch failures never show up here: the aggregator absorbs them
/// into empty sections. Extraction failures fall back to keyword heuristics.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unknown summary, meeting or identity
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Regeneration requested for a record with no captured raw input
    #[error("cannot regenerate {id}: no raw input was captured")]
    NoRawInput { id: String },

    /// The narrator failed at initial generation; nothing was persisted
    #[error("generation failed: {reason}")]
    GenerationFailed { reason: String },

    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// Request rejected before any work was done, e.g. an empty transcript
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::GenerationFailed { .. } | EngineError::Store(_))
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
