//! Error types for patchline-core

use thiserror::Error;

/// Result type alias using patchline-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in patchline-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Durable storage error (queue, cache, or persisted state)
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote API unreachable or misbehaving
    #[error("Network error: {0}")]
    Network(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
