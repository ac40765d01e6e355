//! Database layer for patchline

mod cache_repository;
mod conflict_log_repository;
mod connection;
mod migrations;
mod queue_repository;
mod state_repository;

pub use cache_repository::{CacheRepository, SqliteCacheRepository};
pub use conflict_log_repository::{ConflictLogRepository, SqliteConflictLogRepository};
pub use connection::Database;
pub use queue_repository::{QueueRepository, SqliteQueueRepository};
pub use state_repository::{PersistedState, SqliteStateRepository, StateRepository};
