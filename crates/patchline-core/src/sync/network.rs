//! Connectivity state tracking.

use tokio::sync::watch;

/// Single source of truth for connectivity.
///
/// Platform connectivity signals (or an active probe) report transitions
/// here; the sync engine subscribes for offline→online edges and everything
/// else reads the current state synchronously.
pub struct NetworkMonitor {
    tx: watch::Sender<bool>,
}

impl NetworkMonitor {
    /// Create a monitor with the given initial state
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        let (tx, _) = watch::channel(initially_online);
        Self { tx }
    }

    /// Last known connectivity
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record a transition to online; repeated calls are idempotent
    pub fn set_online(&self) {
        let changed = self.tx.send_if_modified(|online| {
            if *online {
                false
            } else {
                *online = true;
                true
            }
        });
        if changed {
            tracing::info!("Connectivity restored");
        }
    }

    /// Record a transition to offline; repeated calls are idempotent
    pub fn set_offline(&self) {
        let changed = self.tx.send_if_modified(|online| {
            if *online {
                *online = false;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!("Connectivity lost");
        }
    }

    /// Apply a probe result as a transition
    pub fn set_state(&self, online: bool) {
        if online {
            self.set_online();
        } else {
            self.set_offline();
        }
    }

    /// Subscribe to connectivity transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert!(!NetworkMonitor::new(false).is_online());
        assert!(NetworkMonitor::new(true).is_online());
        assert!(!NetworkMonitor::default().is_online());
    }

    #[test]
    fn test_transitions() {
        let monitor = NetworkMonitor::new(false);

        monitor.set_online();
        assert!(monitor.is_online());

        monitor.set_offline();
        assert!(!monitor.is_online());

        monitor.set_state(true);
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn test_subscriber_sees_edges_not_repeats() {
        let monitor = NetworkMonitor::new(false);
        let mut rx = monitor.subscribe();

        // Repeated offline reports do not produce an edge
        monitor.set_offline();
        assert!(!rx.has_changed().unwrap());

        monitor.set_online();
        assert!(rx.has_changed().unwrap());
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
    }
}
