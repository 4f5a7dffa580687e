//! Snapshot walk over the visible area.
//!
//! The visible bounds are split into regions small enough for one paged
//! listing each; regions are walked one after another, and each region follows
//! its continuation tokens until the server reports no more pages. Failures
//! are logged and end the walk of that region only.

use grid_sync::region::DEFAULT_MAX_CELLS_PER_REGION;
use grid_sync::{ApplyOutcome, Bounds, CellRecord, Region, subdivide};
use tracing::{debug, warn};

use crate::store::CellStore;
use crate::transport::GridApi;

/// Page token for the first request of every region.
pub const START_TOKEN: &str = "start";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkOutcome {
    pub pages: usize,
    pub records: usize,
    pub changed: usize,
    pub skipped: usize,
    /// Set when the walk stopped early.
    pub error: Option<String>,
}

impl WalkOutcome {
    pub fn completed(&self) -> bool {
        self.error.is_none()
    }

    fn absorb(&mut self, other: WalkOutcome) {
        self.pages += other.pages;
        self.records += other.records;
        self.changed += other.changed;
        self.skipped += other.skipped;
        if self.error.is_none() {
            self.error = other.error;
        }
    }
}

/// Walks every page of `region`, feeding records into `store`.
pub async fn walk_region<A>(api: &A, region: &Region, store: &CellStore) -> WalkOutcome
where
    A: GridApi + ?Sized,
{
    let mut outcome = WalkOutcome::default();
    let mut token = START_TOKEN.to_string();

    loop {
        let page = match api.fetch_page(region, &token).await {
            Ok(page) => page,
            Err(err) => {
                warn!(
                    target = "gridview.pagination",
                    top_left = %region.top_left,
                    bottom_right = %region.bottom_right,
                    page_token = %token,
                    error = %err,
                    "page fetch failed; abandoning region"
                );
                outcome.error = Some(err.to_string());
                return outcome;
            }
        };
        outcome.pages += 1;

        for raw in &page.grid_cells {
            outcome.records += 1;
            let record = match serde_json::from_value::<CellRecord>(raw.clone()) {
                Ok(record) => record,
                Err(err) => {
                    warn!(target = "gridview.pagination", error = %err, payload = %raw, "skipping malformed record");
                    outcome.skipped += 1;
                    continue;
                }
            };
            match store.apply(&record) {
                ApplyOutcome::Changed { .. } => outcome.changed += 1,
                ApplyOutcome::Rejected(_) => outcome.skipped += 1,
                ApplyOutcome::Unchanged | ApplyOutcome::OutOfView => {}
            }
        }

        match page.continuation() {
            Some(next) => token = next.to_string(),
            None => break,
        }
    }

    debug!(
        target = "gridview.pagination",
        top_left = %region.top_left,
        pages = outcome.pages,
        records = outcome.records,
        "region walk complete"
    );
    outcome
}

/// Plans `bounds` into regions of at most `max_cells` and walks them in
/// order. Regions after a failed one are still walked.
pub async fn walk_bounds<A>(api: &A, bounds: Bounds, max_cells: u64, store: &CellStore) -> WalkOutcome
where
    A: GridApi + ?Sized,
{
    let mut total = WalkOutcome::default();
    for region in subdivide(bounds, max_cells) {
        total.absorb(walk_region(api, &region, store).await);
    }
    total
}

/// Full refresh of the store's current bounds with the default region size.
pub async fn refresh_viewport<A>(api: &A, store: &CellStore) -> WalkOutcome
where
    A: GridApi + ?Sized,
{
    walk_bounds(api, store.bounds(), DEFAULT_MAX_CELLS_PER_REGION, store).await
}
