//! Grid Sync: viewport-bounded synchronization engine for the live grid client.
//!
//! Responsibilities:
//! - addressing cells by signed `{row}x{col}` identifiers within a clamped domain
//! - tracking the visible viewport and its origin moves
//! - bounding oversized fetch rectangles into page-sized regions
//! - reconciling snapshot pages and pushed records into per-cell visual state
//! - parsing the navigation command grammar and tracking drag selections
//! - reconstructing skew-compensated latency timelines across regions
//!
//! Everything here is synchronous and free of I/O; the `gridview` client drives it.

pub mod command;
pub mod coord;
pub mod reconcile;
pub mod record;
pub mod region;
pub mod selection;
pub mod timing;
pub mod viewport;

pub use command::{CommandBuffer, CommandError, KeyFeed, ViewportCommand};
pub use coord::{CellIdError, GridCoordinate, MAX_COORD, MIN_COORD};
pub use reconcile::{AggregateCounts, ApplyOutcome, CellView, Reconciler};
pub use record::{CellRecord, CellStatus, Page};
pub use region::{subdivide, Region};
pub use selection::Selection;
pub use timing::{TimingOverlay, TimingSample};
pub use viewport::{Bounds, Viewport};
