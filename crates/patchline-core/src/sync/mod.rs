//! Offline-first synchronization: replay client, connectivity tracking,
//! conflict resolution, and the drain engine that ties them together.

mod client;
mod engine;
mod network;
mod resolver;

use std::time::Duration;

pub use client::{HttpReplayClient, ReplayClient, ReplayError, ReplayOutcome, ReplayResult};
pub use engine::{DrainOutcome, DrainReport, SyncEngine};
pub use network::NetworkMonitor;
pub use resolver::{ConflictResolver, DEFAULT_TOLERANCE};

use crate::models::DEFAULT_MAX_RETRIES;

/// Tuning knobs for the sync engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Bound on each replay call (matches the general API client policy)
    pub request_timeout: Duration,
    /// Delay between an online transition and the drain it triggers, so a
    /// flaky reconnect does not fire a burst of passes
    pub reconnect_debounce: Duration,
    /// Span within which two changes to one entity are treated as conflicting
    pub tolerance: Duration,
    /// Retry budget for items enqueued without an explicit one
    pub default_max_retries: u32,
}

impl SyncOptions {
    /// Set the per-replay timeout
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the reconnect debounce delay
    #[must_use]
    pub const fn with_reconnect_debounce(mut self, debounce: Duration) -> Self {
        self.reconnect_debounce = debounce;
        self
    }

    /// Set the conflict tolerance window
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the default retry budget
    #[must_use]
    pub const fn with_default_max_retries(mut self, max_retries: u32) -> Self {
        self.default_max_retries = max_retries;
        self
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            reconnect_debounce: Duration::from_secs(2),
            tolerance: DEFAULT_TOLERANCE,
            default_max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}
