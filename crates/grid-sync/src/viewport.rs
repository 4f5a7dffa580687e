use crate::coord::{clamp_coordinate, GridCoordinate};

/// Origins are addressed on a 10-cell lattice.
pub const ORIGIN_GRANULARITY: i64 = 10;

/// Inclusive rectangle of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub top_left: GridCoordinate,
    pub bottom_right: GridCoordinate,
}

impl Bounds {
    pub fn new(top_left: GridCoordinate, bottom_right: GridCoordinate) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    #[inline]
    pub fn rows(&self) -> i64 {
        self.bottom_right.row - self.top_left.row + 1
    }

    #[inline]
    pub fn cols(&self) -> i64 {
        self.bottom_right.col - self.top_left.col + 1
    }

    pub fn cell_count(&self) -> i64 {
        self.rows().max(0) * self.cols().max(0)
    }

    pub fn contains(&self, coord: GridCoordinate) -> bool {
        (self.top_left.row..=self.bottom_right.row).contains(&coord.row)
            && (self.top_left.col..=self.bottom_right.col).contains(&coord.col)
    }

    /// Overlap of two rectangles, `None` when they share no cell.
    pub fn intersect(&self, other: Bounds) -> Option<Bounds> {
        let clipped = Bounds::new(
            GridCoordinate::new(
                self.top_left.row.max(other.top_left.row),
                self.top_left.col.max(other.top_left.col),
            ),
            GridCoordinate::new(
                self.bottom_right.row.min(other.bottom_right.row),
                self.bottom_right.col.min(other.bottom_right.col),
            ),
        );
        (clipped.rows() > 0 && clipped.cols() > 0).then_some(clipped)
    }
}

/// Pending origin change. Absolute values replace an axis, relative values are
/// added to the current origin; when both are present for an axis the relative
/// move is applied last.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OriginUpdate {
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub rel_x: Option<i64>,
    pub rel_y: Option<i64>,
}

/// Visible window into the grid: an origin (top-left, `x` = column, `y` = row)
/// and an extent in rows/cols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    origin_x: i64,
    origin_y: i64,
    rows: u32,
    cols: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl Viewport {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            origin_x: 0,
            origin_y: 0,
            rows: rows.max(1),
            cols: cols.max(1),
        }
    }

    pub fn origin(&self) -> (i64, i64) {
        (self.origin_x, self.origin_y)
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }

    /// Recomputes the extent for a new render area. Returns `true` when the
    /// extent changed.
    pub fn resize(
        &mut self,
        available_width_px: u32,
        available_height_px: u32,
        min_cell_px: u32,
        gap_px: u32,
    ) -> bool {
        let (rows, cols) =
            compute_extent(available_width_px, available_height_px, min_cell_px, gap_px);
        let changed = rows != self.rows || cols != self.cols;
        self.rows = rows;
        self.cols = cols;
        changed
    }

    /// Maps a viewport-relative cell to its absolute coordinate.
    pub fn to_absolute(&self, local_row: u32, local_col: u32) -> GridCoordinate {
        GridCoordinate::new(
            self.origin_y + i64::from(local_row),
            self.origin_x + i64::from(local_col),
        )
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(
            self.to_absolute(0, 0),
            self.to_absolute(self.rows - 1, self.cols - 1),
        )
    }

    /// Applies an origin move. Values are rounded to the addressing lattice
    /// before clamping. Returns whether the origin actually moved.
    pub fn set_origin(&mut self, update: OriginUpdate) -> bool {
        let mut next_x = self.origin_x;
        let mut next_y = self.origin_y;

        if let Some(x) = update.x {
            next_x = round_to_granularity(x);
        }
        if let Some(y) = update.y {
            next_y = round_to_granularity(y);
        }
        if let Some(dx) = update.rel_x {
            next_x = self.origin_x.saturating_add(round_to_granularity(dx));
        }
        if let Some(dy) = update.rel_y {
            next_y = self.origin_y.saturating_add(round_to_granularity(dy));
        }

        let next_x = clamp_coordinate(next_x);
        let next_y = clamp_coordinate(next_y);
        let changed = next_x != self.origin_x || next_y != self.origin_y;
        self.origin_x = next_x;
        self.origin_y = next_y;
        changed
    }
}

/// `cols = max(1, floor(width / (min_cell + gap)))`, symmetric for rows.
pub fn compute_extent(
    available_width_px: u32,
    available_height_px: u32,
    min_cell_px: u32,
    gap_px: u32,
) -> (u32, u32) {
    let step = min_cell_px.saturating_add(gap_px).max(1);
    let cols = (available_width_px / step).max(1);
    let rows = (available_height_px / step).max(1);
    (rows, cols)
}

/// Rounds to the nearest multiple of [`ORIGIN_GRANULARITY`], halves toward
/// positive infinity.
pub fn round_to_granularity(value: i64) -> i64 {
    value
        .saturating_add(ORIGIN_GRANULARITY / 2)
        .div_euclid(ORIGIN_GRANULARITY)
        .saturating_mul(ORIGIN_GRANULARITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::{MAX_COORD, MIN_COORD};

    #[test]
    fn extent_never_collapses() {
        assert_eq!(compute_extent(0, 0, 30, 3), (1, 1));
        assert_eq!(compute_extent(330, 99, 30, 3), (3, 10));
        assert_eq!(compute_extent(10, 10, 0, 0), (10, 10));
    }

    #[test]
    fn rounds_to_lattice() {
        assert_eq!(round_to_granularity(107), 110);
        assert_eq!(round_to_granularity(104), 100);
        assert_eq!(round_to_granularity(105), 110);
        assert_eq!(round_to_granularity(-75), -70);
        assert_eq!(round_to_granularity(-76), -80);
        assert_eq!(round_to_granularity(0), 0);
    }

    #[test]
    fn absolute_origin_is_rounded_then_clamped() {
        let mut viewport = Viewport::new(10, 10);
        assert!(viewport.set_origin(OriginUpdate {
            x: Some(107),
            ..Default::default()
        }));
        assert_eq!(viewport.origin(), (110, 0));

        assert!(viewport.set_origin(OriginUpdate {
            x: Some(MAX_COORD + 12_345),
            y: Some(MIN_COORD - 1),
            ..Default::default()
        }));
        assert_eq!(viewport.origin(), (MAX_COORD, MIN_COORD));
    }

    #[test]
    fn clamped_noop_reports_unchanged() {
        let mut viewport = Viewport::new(10, 10);
        viewport.set_origin(OriginUpdate {
            x: Some(MAX_COORD),
            ..Default::default()
        });
        assert!(!viewport.set_origin(OriginUpdate {
            x: Some(MAX_COORD + 500),
            ..Default::default()
        }));
        assert!(!viewport.set_origin(OriginUpdate {
            rel_x: Some(40),
            ..Default::default()
        }));
        assert_eq!(viewport.origin(), (MAX_COORD, 0));
    }

    #[test]
    fn relative_moves_add_rounded_delta() {
        let mut viewport = Viewport::new(5, 5);
        viewport.set_origin(OriginUpdate {
            rel_x: Some(-50),
            rel_y: Some(34),
            ..Default::default()
        });
        assert_eq!(viewport.origin(), (-50, 30));
        // Moves smaller than half the lattice are swallowed.
        assert!(!viewport.set_origin(OriginUpdate {
            rel_y: Some(4),
            ..Default::default()
        }));
    }

    #[test]
    fn bounds_follow_origin_and_extent() {
        let mut viewport = Viewport::new(3, 4);
        viewport.set_origin(OriginUpdate {
            x: Some(20),
            y: Some(-10),
            ..Default::default()
        });
        let bounds = viewport.bounds();
        assert_eq!(bounds.top_left, GridCoordinate::new(-10, 20));
        assert_eq!(bounds.bottom_right, GridCoordinate::new(-8, 23));
        assert_eq!(bounds.cell_count(), 12);
        assert!(bounds.contains(GridCoordinate::new(-9, 21)));
        assert!(!bounds.contains(GridCoordinate::new(-7, 21)));
        assert_eq!(viewport.to_absolute(2, 3), GridCoordinate::new(-8, 23));
    }

    #[test]
    fn intersection_clips_to_shared_cells() {
        let view = Bounds::new(GridCoordinate::new(0, 0), GridCoordinate::new(4, 9));
        let drag = Bounds::new(GridCoordinate::new(3, 8), GridCoordinate::new(7, 12));
        let clipped = drag.intersect(view).unwrap();
        assert_eq!(clipped.top_left, GridCoordinate::new(3, 8));
        assert_eq!(clipped.bottom_right, GridCoordinate::new(4, 9));

        let outside = Bounds::new(GridCoordinate::new(5, 0), GridCoordinate::new(6, 2));
        assert!(outside.intersect(view).is_none());
    }

    #[test]
    fn resize_recomputes_extent() {
        let mut viewport = Viewport::default();
        assert!(viewport.resize(660, 330, 30, 3));
        assert_eq!(viewport.extent(), (10, 20));
        assert!(!viewport.resize(660, 330, 30, 3));
    }
}
