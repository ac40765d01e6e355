//! patchline-core - Core library for Patchline
//!
//! This crate contains the shared models, durable queue and cache storage,
//! and the offline-first sync engine used by all Patchline interfaces.

pub mod db;
pub mod error;
pub mod models;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{MutationKind, QueueItem, QueueItemId};
pub use state::SyncStatus;
