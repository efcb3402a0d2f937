//! Error types for ragctx.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator boundary has its own error type.

use thiserror::Error;

/// The top-level error type for ragctx operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] TokenizerError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum TokenizerError {
    #[error("Tokenizer not available: {0}")]
    Unavailable(String),

    #[error("Encoding failed: {0}")]
    EncodeFailed(String),
}

#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedder returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Search failed in domain {domain}: {reason}")]
    SearchFailed { domain: String, reason: String },

    #[error("Unknown domain: {0}")]
    UnknownDomain(String),

    #[error("Query vector has {got} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),
}
