//! Error taxonomy for indexing and search

use thiserror::Error;

/// Errors raised by the indexing and search pipeline
#[derive(Debug, Error)]
pub enum SearchError {
    /// The embedding model could not be resolved or constructed.
    /// Fatal at startup; surfaced by warmup or the first encode call.
    #[error("failed to load embedding model '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    /// The loaded model failed on a particular input
    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored blob is not a whole number of f32 values, or disagrees with
    /// the dimension recorded next to it
    #[error("corrupt embedding for '{id}' ({len} bytes)")]
    CorruptEmbedding { id: String, len: usize },

    /// The store was built with a different model than the one now loaded
    #[error("index was built with model '{stored}', but '{current}' is loaded; rebuild the index")]
    ModelMismatch { stored: String, current: String },

    /// Record rejected before reaching the store
    #[error("invalid record: {0}")]
    Validation(String),
}

impl SearchError {
    pub fn model_load(model: impl Into<String>, reason: impl ToString) -> Self {
        SearchError::ModelLoad {
            model: model.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller sent bad input, as opposed to a service failure
    pub fn is_validation(&self) -> bool {
        matches!(self, SearchError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
