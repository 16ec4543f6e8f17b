//! Error types for reposcribe.

use thiserror::Error;

/// Result type alias using reposcribe's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for reposcribe operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Repository not found
    #[error("Repository not found: {0}")]
    RepositoryNotFound(uuid::Uuid),

    /// Persistence operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Every chunk of a large document failed to summarize
    #[error("All {chunk_count} repository chunks failed to process")]
    AllChunksFailed { chunk_count: usize },

    /// Repository content could not be ingested
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Job processing error
    #[error("Job error: {0}")]
    Job(String),

    /// Job was cancelled between stages
    #[error("Job cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
