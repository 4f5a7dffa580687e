use crate::coord::GridCoordinate;
use crate::viewport::Bounds;

/// Largest rectangle the list endpoint is asked to page through at once.
pub const DEFAULT_MAX_CELLS_PER_REGION: u64 = 500;

/// A page-sized rectangle emitted by [`subdivide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub top_left: GridCoordinate,
    pub bottom_right: GridCoordinate,
    pub rows: u64,
    pub cols: u64,
    pub cell_count: u64,
}

impl Region {
    fn leaf(r1: i64, c1: i64, r2: i64, c2: i64) -> Self {
        let rows = (r2 - r1 + 1) as u64;
        let cols = (c2 - c1 + 1) as u64;
        Self {
            top_left: GridCoordinate::new(r1, c1),
            bottom_right: GridCoordinate::new(r2, c2),
            rows,
            cols,
            cell_count: rows * cols,
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.top_left, self.bottom_right)
    }
}

/// Partitions `bounds` into regions of at most `max_cells` cells.
///
/// The longer side is halved at `floor((a + b) / 2)` until every piece fits;
/// rows are split on ties. Regions come out in depth-first order (top/left
/// half before bottom/right half) and cover `bounds` exactly once.
pub fn subdivide(bounds: Bounds, max_cells: u64) -> Vec<Region> {
    let max_cells = max_cells.max(1);
    let mut regions = Vec::new();
    if bounds.rows() <= 0 || bounds.cols() <= 0 {
        return regions;
    }

    let mut pending = vec![(
        bounds.top_left.row,
        bounds.top_left.col,
        bounds.bottom_right.row,
        bounds.bottom_right.col,
    )];
    while let Some((r1, c1, r2, c2)) = pending.pop() {
        let rows = (r2 - r1 + 1) as u64;
        let cols = (c2 - c1 + 1) as u64;
        if rows.saturating_mul(cols) <= max_cells {
            regions.push(Region::leaf(r1, c1, r2, c2));
            continue;
        }
        // Second half is pushed first so the first half is emitted first.
        if rows >= cols {
            let mid = (r1 + r2).div_euclid(2);
            pending.push((mid + 1, c1, r2, c2));
            pending.push((r1, c1, mid, c2));
        } else {
            let mid = (c1 + c2).div_euclid(2);
            pending.push((r1, mid + 1, r2, c2));
            pending.push((r1, c1, r2, mid));
        }
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn rect(r1: i64, c1: i64, r2: i64, c2: i64) -> Bounds {
        Bounds::new(GridCoordinate::new(r1, c1), GridCoordinate::new(r2, c2))
    }

    fn assert_exact_partition(bounds: Bounds, max_cells: u64) {
        let regions = subdivide(bounds, max_cells);
        let mut seen = HashSet::new();
        for region in &regions {
            assert!(
                region.cell_count <= max_cells.max(1),
                "{region:?} exceeds {max_cells}"
            );
            assert_eq!(region.cell_count, region.bounds().cell_count() as u64);
            for row in region.top_left.row..=region.bottom_right.row {
                for col in region.top_left.col..=region.bottom_right.col {
                    let coord = GridCoordinate::new(row, col);
                    assert!(bounds.contains(coord), "{coord} escapes {bounds:?}");
                    assert!(seen.insert(coord), "{coord} covered twice");
                }
            }
        }
        assert_eq!(seen.len() as i64, bounds.cell_count());
    }

    #[test]
    fn small_rectangle_is_a_single_leaf() {
        let regions = subdivide(rect(0, 0, 9, 9), 500);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].cell_count, 100);
        assert_eq!(regions[0].rows, 10);
        assert_eq!(regions[0].cols, 10);
    }

    #[test]
    fn splits_longer_dimension_first() {
        // 10 rows x 40 cols: the column span is halved.
        let regions = subdivide(rect(0, 0, 9, 39), 200);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].bottom_right, GridCoordinate::new(9, 19));
        assert_eq!(regions[1].top_left, GridCoordinate::new(0, 20));

        // Square splits rows.
        let regions = subdivide(rect(0, 0, 9, 9), 50);
        assert_eq!(regions[0].bottom_right, GridCoordinate::new(4, 9));
        assert_eq!(regions[1].top_left, GridCoordinate::new(5, 0));
    }

    #[test]
    fn midpoint_floors_for_negative_spans() {
        let regions = subdivide(rect(-3, 0, 0, 0), 2);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].top_left.row, -3);
        assert_eq!(regions[0].bottom_right.row, -2);
        assert_eq!(regions[1].top_left.row, -1);
    }

    #[test]
    fn partitions_exactly_for_many_shapes() {
        let shapes = [
            rect(0, 0, 0, 0),
            rect(0, 0, 26, 57),
            rect(-13, -7, 11, 30),
            rect(-1_000_000, 999_950, -999_977, 1_000_000),
            rect(5, 5, 5, 300),
            rect(0, 0, 63, 63),
        ];
        for bounds in shapes {
            for max_cells in [0, 1, 2, 3, 7, 50, 499, 500, 10_000] {
                assert_exact_partition(bounds, max_cells);
            }
        }
    }

    #[test]
    fn region_count_tracks_cell_ratio() {
        let regions = subdivide(rect(0, 0, 63, 63), 512);
        assert_eq!(regions.len(), 8);
        assert!(regions.iter().all(|r| r.cell_count == 512));
    }

    #[test]
    fn empty_bounds_yield_nothing() {
        assert!(subdivide(rect(5, 5, 4, 9), 10).is_empty());
    }
}
