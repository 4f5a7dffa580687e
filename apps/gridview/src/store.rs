use std::sync::Arc;

use grid_sync::{
    AggregateCounts, ApplyOutcome, Bounds, CellRecord, CellView, GridCoordinate, Reconciler,
};
use parking_lot::Mutex;
use tokio::sync::watch;

/// Shared handle to the reconciled cell state. Page walks, the push stream and
/// the key handler all feed the same store; the lock is never held across an
/// await point.
#[derive(Clone)]
pub struct CellStore {
    inner: Arc<Mutex<Reconciler>>,
    counts_tx: Arc<watch::Sender<AggregateCounts>>,
}

impl CellStore {
    pub fn new(bounds: Bounds) -> Self {
        let (counts_tx, _) = watch::channel(AggregateCounts::default());
        Self {
            inner: Arc::new(Mutex::new(Reconciler::new(bounds))),
            counts_tx: Arc::new(counts_tx),
        }
    }

    pub fn apply(&self, record: &CellRecord) -> ApplyOutcome {
        let (outcome, counts) = {
            let mut reconciler = self.inner.lock();
            let outcome = reconciler.apply(record);
            (outcome, reconciler.counts())
        };
        if outcome.is_changed() {
            self.counts_tx.send_replace(counts);
        }
        outcome
    }

    pub fn apply_json(&self, raw: &str) -> Option<ApplyOutcome> {
        let (outcome, counts) = {
            let mut reconciler = self.inner.lock();
            let outcome = reconciler.apply_json(raw);
            (outcome, reconciler.counts())
        };
        if outcome.as_ref().is_some_and(ApplyOutcome::is_changed) {
            self.counts_tx.send_replace(counts);
        }
        outcome
    }

    pub fn rebuild(&self, bounds: Bounds) {
        self.inner.lock().rebuild(bounds);
        self.counts_tx.send_replace(AggregateCounts::default());
    }

    pub fn bounds(&self) -> Bounds {
        self.inner.lock().bounds()
    }

    pub fn counts(&self) -> AggregateCounts {
        self.inner.lock().counts()
    }

    pub fn cell(&self, coord: GridCoordinate) -> CellView {
        self.inner.lock().cell(coord)
    }

    /// Receiver that observes the counters after every status change.
    pub fn subscribe_counts(&self) -> watch::Receiver<AggregateCounts> {
        self.counts_tx.subscribe()
    }
}
