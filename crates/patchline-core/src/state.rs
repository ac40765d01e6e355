//! Shared sync status types.

use serde::{Deserialize, Serialize};

use crate::models::QueueItemId;

/// Point-in-time snapshot of the sync lifecycle, for display layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Last known connectivity
    pub is_online: bool,
    /// Whether a drain pass is currently running
    pub is_syncing: bool,
    /// Timestamp of the last fully-successful drain (Unix ms)
    pub last_sync: Option<i64>,
    /// Last failure summary, if the previous pass had problems
    pub sync_error: Option<String>,
    /// Identifiers of queued mutations, in replay order
    pub pending_changes: Vec<QueueItemId>,
}

impl SyncStatus {
    /// Number of queued mutations
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending_changes.len()
    }

    /// One-line human-readable summary
    #[must_use]
    pub fn status_line(&self) -> String {
        let pending = self.pending_count();
        if self.is_syncing {
            "Syncing changes...".to_string()
        } else if !self.is_online {
            if pending > 0 {
                format!("Offline - {pending} pending changes")
            } else {
                "Offline".to_string()
            }
        } else if pending > 0 {
            format!("Online - {pending} pending changes")
        } else {
            "Online".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(is_online: bool, is_syncing: bool, pending: usize) -> SyncStatus {
        SyncStatus {
            is_online,
            is_syncing,
            last_sync: None,
            sync_error: None,
            pending_changes: (0..pending).map(|_| QueueItemId::new()).collect(),
        }
    }

    #[test]
    fn test_status_line() {
        assert_eq!(status(true, false, 0).status_line(), "Online");
        assert_eq!(
            status(true, false, 2).status_line(),
            "Online - 2 pending changes"
        );
        assert_eq!(status(false, false, 0).status_line(), "Offline");
        assert_eq!(
            status(false, false, 3).status_line(),
            "Offline - 3 pending changes"
        );
        assert_eq!(status(true, true, 1).status_line(), "Syncing changes...");
    }
}
