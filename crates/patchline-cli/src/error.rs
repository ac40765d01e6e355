use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] patchline_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Payload must be valid JSON: {0}")]
    InvalidPayload(String),
    #[error("Identifier cannot be empty")]
    EmptyId,
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
    #[error("API client error: {0}")]
    Client(String),
    #[error("Conflict not found in this session: {0}. Conflicts are tracked in memory; a restart loses unresolved ones and the queued item re-conflicts on the next sync.")]
    ConflictNotFound(String),
}
