//! Status fan-out
//!
//! Observers hold a `watch` receiver: they always see the latest snapshot,
//! never a backlog. A slow observer skips intermediate states and catches up
//! on the next change.

use portal_core::StatusSnapshot;
use tokio::sync::watch;

/// Publishes status snapshots to any number of observers
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    tx: watch::Sender<StatusSnapshot>,
}

impl StatusPublisher {
    pub fn new(initial: StatusSnapshot) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Replace the current snapshot and wake every observer
    ///
    /// Never fails: having no observers is normal.
    pub fn publish(&self, snapshot: StatusSnapshot) {
        self.tx.send_replace(snapshot);
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SharedRunState;
    use std::time::Duration;

    #[tokio::test]
    async fn test_observers_see_latest_snapshot() {
        let initial = SharedRunState::new(Duration::from_secs(30)).snapshot();
        let publisher = StatusPublisher::new(initial);
        assert_eq!(publisher.observer_count(), 0);

        let mut rx = publisher.subscribe();
        assert_eq!(publisher.observer_count(), 1);

        let mut snapshot = publisher.latest();
        snapshot.visitor_count = 9;
        publisher.publish(snapshot.clone());
        snapshot.visitor_count = 10;
        publisher.publish(snapshot.clone());

        // Only the newest value is kept
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().visitor_count, 10);
        assert_eq!(publisher.latest(), snapshot);

        drop(rx);
        assert_eq!(publisher.observer_count(), 0);
    }
}
