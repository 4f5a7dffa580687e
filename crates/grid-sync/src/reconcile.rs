//! Merges snapshot pages and pushed records into the visible cell projection.
//!
//! Each cell is a two-state machine (`inactive` or one active color) with the
//! elapsed value as decoration. A record only takes effect when it changes the
//! cell's status; equal-status records are dropped without touching the
//! decoration or the counters, so overlapping walks and stream pushes can
//! deliver the same record any number of times.
//!
//! Records carry no sequence number. When walks overlap, a stale record that
//! arrives after a newer one wins for that cell until the next delivery.

use std::collections::HashMap;
use std::fmt;

use tracing::{trace, warn};

use crate::coord::{CellIdError, GridCoordinate};
use crate::record::{CellRecord, CellStatus};
use crate::viewport::Bounds;

/// Per-status counters for the visible cells. `total` always equals the sum
/// of the per-status counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateCounts {
    pub total: u64,
    pub red: u64,
    pub green: u64,
    pub blue: u64,
    pub orange: u64,
    pub predator: u64,
}

impl AggregateCounts {
    pub fn get(&self, status: CellStatus) -> u64 {
        match status {
            CellStatus::Inactive => 0,
            CellStatus::Red => self.red,
            CellStatus::Green => self.green,
            CellStatus::Blue => self.blue,
            CellStatus::Orange => self.orange,
            CellStatus::Predator => self.predator,
        }
    }

    fn slot(&mut self, status: CellStatus) -> Option<&mut u64> {
        match status {
            CellStatus::Inactive => None,
            CellStatus::Red => Some(&mut self.red),
            CellStatus::Green => Some(&mut self.green),
            CellStatus::Blue => Some(&mut self.blue),
            CellStatus::Orange => Some(&mut self.orange),
            CellStatus::Predator => Some(&mut self.predator),
        }
    }

    fn transition(&mut self, from: CellStatus, to: CellStatus) {
        if let Some(slot) = self.slot(from) {
            *slot -= 1;
            self.total -= 1;
        }
        if let Some(slot) = self.slot(to) {
            *slot += 1;
            self.total += 1;
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.red + self.green + self.blue + self.orange + self.predator
    }
}

impl fmt::Display for AggregateCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {}, R: {}, G: {}, B: {}, O: {}, P: {}",
            self.total, self.red, self.green, self.blue, self.orange, self.predator
        )
    }
}

/// What the client currently shows for one cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellView {
    pub status: CellStatus,
    pub elapsed_ms: Option<u16>,
}

impl CellView {
    #[inline]
    pub fn has_elapsed(&self) -> bool {
        self.elapsed_ms.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Changed { from: CellStatus, to: CellStatus },
    Unchanged,
    OutOfView,
    Rejected(CellIdError),
}

impl ApplyOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, ApplyOutcome::Changed { .. })
    }
}

/// Client-side projection of the cells inside the current viewport.
#[derive(Debug, Clone)]
pub struct Reconciler {
    bounds: Bounds,
    cells: HashMap<GridCoordinate, CellView>,
    counts: AggregateCounts,
}

impl Reconciler {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            cells: HashMap::new(),
            counts: AggregateCounts::default(),
        }
    }

    /// Full grid rebuild: every cell returns to inactive and the counters
    /// restart from zero.
    pub fn rebuild(&mut self, bounds: Bounds) {
        self.bounds = bounds;
        self.cells.clear();
        self.counts = AggregateCounts::default();
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn counts(&self) -> AggregateCounts {
        self.counts
    }

    pub fn cell(&self, coord: GridCoordinate) -> CellView {
        self.cells.get(&coord).copied().unwrap_or_default()
    }

    pub fn observed(&self) -> usize {
        self.cells.len()
    }

    pub fn apply(&mut self, record: &CellRecord) -> ApplyOutcome {
        let coord = match record.id.parse::<GridCoordinate>() {
            Ok(coord) => coord,
            Err(err) => {
                warn!(target = "grid.reconcile", id = %record.id, error = %err, "dropping record with malformed id");
                return ApplyOutcome::Rejected(err);
            }
        };
        if !self.bounds.contains(coord) {
            return ApplyOutcome::OutOfView;
        }

        let view = self.cells.entry(coord).or_default();
        let from = view.status;
        if from == record.status {
            return ApplyOutcome::Unchanged;
        }

        self.counts.transition(from, record.status);
        view.status = record.status;
        view.elapsed_ms = record.display_elapsed();
        trace!(
            target = "grid.reconcile",
            id = %coord,
            from = from.as_str(),
            to = record.status.as_str(),
            "cell status changed"
        );
        ApplyOutcome::Changed {
            from,
            to: record.status,
        }
    }

    /// Decodes and applies one raw JSON record. Unparsable payloads are logged
    /// with the offending text and skipped.
    pub fn apply_json(&mut self, raw: &str) -> Option<ApplyOutcome> {
        match CellRecord::from_json(raw) {
            Ok(record) => Some(self.apply(&record)),
            Err(err) => {
                warn!(target = "grid.reconcile", error = %err, payload = %raw, "failed to parse cell record");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bounds() -> Bounds {
        Bounds::new(GridCoordinate::new(0, 0), GridCoordinate::new(9, 9))
    }

    fn record(id: &str, status: CellStatus) -> CellRecord {
        CellRecord::new(id, status).with_elapsed(Utc::now(), 120)
    }

    #[test]
    fn first_observation_counts_active_cells() {
        let mut reconciler = Reconciler::new(bounds());
        let outcome = reconciler.apply(&record("1x1", CellStatus::Red));
        assert_eq!(
            outcome,
            ApplyOutcome::Changed {
                from: CellStatus::Inactive,
                to: CellStatus::Red
            }
        );
        assert_eq!(reconciler.counts().red, 1);
        assert_eq!(reconciler.counts().total, 1);
        assert_eq!(
            reconciler.cell(GridCoordinate::new(1, 1)).elapsed_ms,
            Some(120)
        );
    }

    #[test]
    fn replay_is_a_noop() {
        let mut reconciler = Reconciler::new(bounds());
        let rec = record("2x3", CellStatus::Blue);
        reconciler.apply(&rec);
        let counts = reconciler.counts();
        let view = reconciler.cell(GridCoordinate::new(2, 3));

        assert_eq!(reconciler.apply(&rec), ApplyOutcome::Unchanged);
        assert_eq!(reconciler.counts(), counts);
        assert_eq!(reconciler.cell(GridCoordinate::new(2, 3)), view);
    }

    #[test]
    fn equal_status_keeps_previous_decoration() {
        let mut reconciler = Reconciler::new(bounds());
        reconciler.apply(&record("0x0", CellStatus::Green));
        let refreshed = CellRecord::new("0x0", CellStatus::Green).with_elapsed(Utc::now(), 999);
        assert_eq!(reconciler.apply(&refreshed), ApplyOutcome::Unchanged);
        assert_eq!(
            reconciler.cell(GridCoordinate::new(0, 0)).elapsed_ms,
            Some(120)
        );
    }

    #[test]
    fn transitions_move_counts_between_statuses() {
        let mut reconciler = Reconciler::new(bounds());
        reconciler.apply(&record("0x0", CellStatus::Red));
        reconciler.apply(&record("0x0", CellStatus::Orange));
        let counts = reconciler.counts();
        assert_eq!((counts.red, counts.orange, counts.total), (0, 1, 1));

        reconciler.apply(&record("0x0", CellStatus::Inactive));
        let counts = reconciler.counts();
        assert_eq!(counts, AggregateCounts::default());
        assert!(!reconciler.cell(GridCoordinate::new(0, 0)).has_elapsed());
    }

    #[test]
    fn inactive_first_observation_is_unchanged() {
        let mut reconciler = Reconciler::new(bounds());
        assert_eq!(
            reconciler.apply(&record("4x4", CellStatus::Inactive)),
            ApplyOutcome::Unchanged
        );
        assert_eq!(reconciler.counts().total, 0);
    }

    #[test]
    fn total_matches_sum_after_mixed_sequence() {
        let mut reconciler = Reconciler::new(bounds());
        let statuses = [
            CellStatus::Red,
            CellStatus::Green,
            CellStatus::Inactive,
            CellStatus::Blue,
            CellStatus::Predator,
            CellStatus::Orange,
            CellStatus::Red,
        ];
        for step in 0..200usize {
            let id = format!("{}x{}", step % 7, (step * 3) % 10);
            let status = statuses[(step * 5 + step / 7) % statuses.len()];
            reconciler.apply(&record(&id, status));
            assert!(reconciler.counts().is_consistent(), "step {step}");
        }
        let counts = reconciler.counts();
        let active = CellStatus::ACTIVE
            .iter()
            .map(|status| counts.get(*status))
            .sum::<u64>();
        assert_eq!(active, counts.total);
    }

    #[test]
    fn ignores_cells_outside_view_and_bad_ids() {
        let mut reconciler = Reconciler::new(bounds());
        assert_eq!(
            reconciler.apply(&record("10x0", CellStatus::Red)),
            ApplyOutcome::OutOfView
        );
        assert!(matches!(
            reconciler.apply(&record("bogus", CellStatus::Red)),
            ApplyOutcome::Rejected(_)
        ));
        assert_eq!(reconciler.apply_json("{not json"), None);
        assert_eq!(reconciler.counts().total, 0);
    }

    #[test]
    fn rebuild_resets_projection() {
        let mut reconciler = Reconciler::new(bounds());
        reconciler.apply(&record("1x1", CellStatus::Red));
        let moved = Bounds::new(GridCoordinate::new(10, 0), GridCoordinate::new(19, 9));
        reconciler.rebuild(moved);
        assert_eq!(reconciler.counts().total, 0);
        assert_eq!(reconciler.observed(), 0);
        assert_eq!(
            reconciler.apply(&record("1x1", CellStatus::Red)),
            ApplyOutcome::OutOfView
        );
    }

    #[test]
    fn stale_record_after_newer_one_wins() {
        // No sequencing: whichever record is applied last holds the cell.
        let mut reconciler = Reconciler::new(bounds());
        reconciler.apply(&record("3x3", CellStatus::Green));
        reconciler.apply(&record("3x3", CellStatus::Red));
        reconciler.apply(&record("3x3", CellStatus::Green));
        assert_eq!(
            reconciler.cell(GridCoordinate::new(3, 3)).status,
            CellStatus::Green
        );
    }

    #[test]
    fn summary_format() {
        let mut reconciler = Reconciler::new(bounds());
        reconciler.apply(&record("0x0", CellStatus::Red));
        reconciler.apply(&record("0x1", CellStatus::Predator));
        assert_eq!(
            reconciler.counts().to_string(),
            "Total: 2, R: 1, G: 0, B: 0, O: 0, P: 1"
        );
    }
}
