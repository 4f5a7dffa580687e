use crate::coord::GridCoordinate;
use crate::viewport::Bounds;

/// Drag selection: the cell where the drag started and the cell currently
/// under the pointer. The derived rectangle is inclusive and normalised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    start: Option<GridCoordinate>,
    end: Option<GridCoordinate>,
    finalized: bool,
}

impl Selection {
    pub fn begin(&mut self, at: GridCoordinate) {
        self.start = Some(at);
        self.end = Some(at);
        self.finalized = false;
    }

    /// Moves the free corner. Ignored when no drag is in progress.
    pub fn extend(&mut self, to: GridCoordinate) {
        if self.start.is_some() && !self.finalized {
            self.end = Some(to);
        }
    }

    pub fn finalize(&mut self, at: GridCoordinate) {
        if self.start.is_some() {
            self.end = Some(at);
            self.finalized = true;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        self.start.is_some()
    }

    pub fn rect(&self) -> Option<Bounds> {
        let (start, end) = (self.start?, self.end?);
        Some(Bounds::new(
            GridCoordinate::new(start.row.min(end.row), start.col.min(end.col)),
            GridCoordinate::new(start.row.max(end.row), start.col.max(end.col)),
        ))
    }

    /// Selected cells clipped to `visible`, row-major.
    pub fn ids_within(&self, visible: Bounds) -> Vec<GridCoordinate> {
        let Some(rect) = self.rect() else {
            return Vec::new();
        };
        let mut ids = Vec::new();
        for row in rect.top_left.row..=rect.bottom_right.row {
            for col in rect.top_left.col..=rect.bottom_right.col {
                let coord = GridCoordinate::new(row, col);
                if visible.contains(coord) {
                    ids.push(coord);
                }
            }
        }
        ids
    }
}
