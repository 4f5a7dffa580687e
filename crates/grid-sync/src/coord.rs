use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Smallest addressable row/column.
pub const MIN_COORD: i64 = -1_000_000;
/// Largest addressable row/column.
pub const MAX_COORD: i64 = 1_000_000;

#[inline]
pub fn clamp_coordinate(value: i64) -> i64 {
    value.clamp(MIN_COORD, MAX_COORD)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellIdError {
    #[error("cell id '{0}' is missing the 'x' separator")]
    MissingSeparator(String),
    #[error("cell id '{id}' has a non-numeric {part}")]
    NotNumeric { id: String, part: &'static str },
}

/// A single cell address. Rows grow downward (the `y` axis), columns grow to
/// the right (the `x` axis).
///
/// The wire and lookup key is `"{row}x{col}"`:
///
/// ```
/// # use grid_sync::GridCoordinate;
/// let coord: GridCoordinate = "-12x40".parse().unwrap();
/// assert_eq!(coord, GridCoordinate::new(-12, 40));
/// assert_eq!(coord.to_string(), "-12x40");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoordinate {
    pub row: i64,
    pub col: i64,
}

impl GridCoordinate {
    pub const fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    /// Returns the coordinate with both axes clamped into the valid domain.
    pub fn clamped(self) -> Self {
        Self {
            row: clamp_coordinate(self.row),
            col: clamp_coordinate(self.col),
        }
    }

    #[inline]
    pub fn x(&self) -> i64 {
        self.col
    }

    #[inline]
    pub fn y(&self) -> i64 {
        self.row
    }
}

impl fmt::Display for GridCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.row, self.col)
    }
}

impl FromStr for GridCoordinate {
    type Err = CellIdError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        // A leading '-' belongs to the row, so the separator is the first 'x'.
        let (row, col) = id
            .split_once('x')
            .ok_or_else(|| CellIdError::MissingSeparator(id.to_string()))?;
        let row = row.parse::<i64>().map_err(|_| CellIdError::NotNumeric {
            id: id.to_string(),
            part: "row",
        })?;
        let col = col.parse::<i64>().map_err(|_| CellIdError::NotNumeric {
            id: id.to_string(),
            part: "column",
        })?;
        Ok(Self { row, col })
    }
}

impl Serialize for GridCoordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GridCoordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signed_ids() {
        assert_eq!(
            "-5x-7".parse::<GridCoordinate>().unwrap(),
            GridCoordinate::new(-5, -7)
        );
        assert_eq!(
            "0x1000000".parse::<GridCoordinate>().unwrap(),
            GridCoordinate::new(0, 1_000_000)
        );
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(matches!(
            "12-4".parse::<GridCoordinate>(),
            Err(CellIdError::MissingSeparator(_))
        ));
        assert!(matches!(
            "ax4".parse::<GridCoordinate>(),
            Err(CellIdError::NotNumeric { part: "row", .. })
        ));
        assert!(matches!(
            "4x".parse::<GridCoordinate>(),
            Err(CellIdError::NotNumeric { part: "column", .. })
        ));
        assert!("1x2x3".parse::<GridCoordinate>().is_err());
    }

    #[test]
    fn clamps_into_domain() {
        assert_eq!(clamp_coordinate(MAX_COORD + 1), MAX_COORD);
        assert_eq!(clamp_coordinate(MIN_COORD - 50), MIN_COORD);
        assert_eq!(clamp_coordinate(42), 42);
        assert_eq!(
            GridCoordinate::new(-2_000_000, 3).clamped(),
            GridCoordinate::new(MIN_COORD, 3)
        );
    }

    #[test]
    fn serde_uses_wire_id() {
        let json = serde_json::to_string(&GridCoordinate::new(3, -9)).unwrap();
        assert_eq!(json, "\"3x-9\"");
        let back: GridCoordinate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, GridCoordinate::new(3, -9));
    }
}
