//! Visitor counter
//!
//! The count lives in the run state (so it shows up in every snapshot) and
//! is mirrored to a [`CounterStore`] after each change. Saves are
//! best-effort and serialized: each save writes whatever the count is once
//! it holds the save lock, so an older value never lands after a newer one.

use portal_storage::CounterStore;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::state::SharedRunState;

/// Largest batch accepted by a single add
pub const MAX_VISITORS_PER_ADD: i64 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VisitorError {
    #[error("Count must be between 1 and 100, got {0}")]
    OutOfRange(i64),
}

/// Counter operations backed by shared run state and a store
#[derive(Clone)]
pub struct VisitorCounter {
    state: SharedRunState,
    store: Arc<dyn CounterStore>,
    save_lock: Arc<Mutex<()>>,
}

impl VisitorCounter {
    pub fn new(state: SharedRunState, store: Arc<dyn CounterStore>) -> Self {
        Self {
            state,
            store,
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Read the persisted count into the run state
    ///
    /// A failed load starts from zero.
    pub async fn load(&self) -> u64 {
        let count = match self.store.load().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Could not load visitor count, starting at 0");
                0
            }
        };
        self.state.set_visitor_count(count);
        info!(count, "Visitor count loaded");
        count
    }

    pub fn count(&self) -> u64 {
        self.state.visitor_count()
    }

    /// Add `count` visitors, returning the new total
    pub async fn add(&self, count: i64) -> Result<u64, VisitorError> {
        if !(1..=MAX_VISITORS_PER_ADD).contains(&count) {
            return Err(VisitorError::OutOfRange(count));
        }
        let total = self.state.add_visitors(count.unsigned_abs());
        info!(added = count, total, "Visitors added");
        self.persist().await;
        Ok(total)
    }

    pub async fn reset(&self) {
        self.state.set_visitor_count(0);
        info!("Visitor count reset");
        self.persist().await;
    }

    async fn persist(&self) {
        let _guard = self.save_lock.lock().await;
        let count = self.state.visitor_count();
        if let Err(e) = self.store.save(count).await {
            warn!(error = %e, count, "Could not save visitor count");
        }
    }
}

impl std::fmt::Debug for VisitorCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisitorCounter")
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}
