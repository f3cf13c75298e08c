//! Error types for the Docent domain.
//!
//! One `thiserror` enum per failure domain, rolled up into [`Error`] for
//! call sites that cross domains.

use thiserror::Error;

/// The top-level error type for all Docent operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias for results that can fail in more than one domain.
pub type Result<T> = std::result::Result<T, Error>;

// --- Domain errors ---

/// Rejections raised before the generation engine is ever invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("There is not any message in the chat")]
    EmptyConversation,

    #[error("Last message must be from user")]
    LastMessageNotUser,
}

/// Failures while producing an answer for a conversation turn.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("storage is empty - run `docent generate` to build the index first")]
    IndexNotBuilt,

    #[error("index could not be loaded: {0}")]
    Index(String),

    #[error("request to model backend failed: {0}")]
    Network(String),

    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("failed to parse model response: {0}")]
    Parse(String),

    #[error("model stream interrupted: {0}")]
    StreamInterrupted(String),
}

/// Failures while building, persisting, or loading the vector index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Malformed index: {0}")]
    Malformed(String),
}

impl From<IndexError> for EngineError {
    fn from(err: IndexError) -> Self {
        EngineError::Index(err.to_string())
    }
}
