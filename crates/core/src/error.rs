//! Error types for the Coxswain domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Coxswain operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown session id — surfaced before any tool or generation cost.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Another turn is already in flight on this session.
    #[error("Session busy: {0} — a turn is already in flight, retry later")]
    SessionBusy(String),

    /// Document ingestion was handed blank text.
    #[error("Empty document: nothing to ingest from '{source_name}'")]
    EmptyDocument { source_name: String },

    /// The inference engine could not serve the turn. Turn-fatal.
    #[error("Inference unavailable: {0}")]
    InferenceUnavailable(#[from] EngineError),

    // --- Tool errors (contained during a turn, surfaced only from direct calls) ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Retrieval errors (other than EmptyDocument, which maps above) ---
    #[error("Retrieval error: {0}")]
    Retrieval(RetrievalError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Engine request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Engine request timed out: {0}")]
    Timeout(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Invalid tool input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Empty document: nothing to ingest from '{source_name}'")]
    EmptyDocument { source_name: String },

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
}

impl From<MemoryError> for Error {
    fn from(e: MemoryError) -> Self {
        match e {
            MemoryError::SessionNotFound(id) => Error::SessionNotFound(id),
        }
    }
}

impl From<RetrievalError> for Error {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::EmptyDocument { source_name } => {
                Error::EmptyDocument { source_name }
            }
            other => Error::Retrieval(other),
        }
    }
}
