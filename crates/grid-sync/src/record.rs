use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ceiling for the elapsed-time decoration.
pub const MAX_DISPLAY_ELAPSED_MS: i64 = 9999;

/// Visual status of a cell. `Inactive` is the implicit default for cells that
/// were never observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    #[default]
    Inactive,
    Red,
    Green,
    Blue,
    Orange,
    Predator,
}

impl CellStatus {
    pub const ACTIVE: [CellStatus; 5] = [
        CellStatus::Red,
        CellStatus::Green,
        CellStatus::Blue,
        CellStatus::Orange,
        CellStatus::Predator,
    ];

    #[inline]
    pub fn is_active(self) -> bool {
        self != CellStatus::Inactive
    }

    /// Maps a mutation key (`r g b o p d`) to the status it requests.
    pub fn from_key(key: char) -> Option<CellStatus> {
        match key.to_ascii_lowercase() {
            'r' => Some(CellStatus::Red),
            'g' => Some(CellStatus::Green),
            'b' => Some(CellStatus::Blue),
            'o' => Some(CellStatus::Orange),
            'p' => Some(CellStatus::Predator),
            'd' => Some(CellStatus::Inactive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CellStatus::Inactive => "inactive",
            CellStatus::Red => "red",
            CellStatus::Green => "green",
            CellStatus::Blue => "blue",
            CellStatus::Orange => "orange",
            CellStatus::Predator => "predator",
        }
    }
}

impl std::str::FromStr for CellStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inactive" => Ok(CellStatus::Inactive),
            "red" => Ok(CellStatus::Red),
            "green" => Ok(CellStatus::Green),
            "blue" => Ok(CellStatus::Blue),
            "orange" => Ok(CellStatus::Orange),
            "predator" => Ok(CellStatus::Predator),
            other => match other.chars().next() {
                Some(key) if other.len() == 1 => {
                    CellStatus::from_key(key).ok_or_else(|| format!("unknown status '{value}'"))
                }
                _ => Err(format!("unknown status '{value}'")),
            },
        }
    }
}

/// One cell as reported by the list endpoint, the push stream, or the
/// single-row view lookup. Only `id` and `status` are required; the rest are
/// diagnostics that some responses carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRecord {
    pub id: String,
    pub status: CellStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_at: Option<DateTime<Utc>>,
    /// Region that created the entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    /// Region that committed the latest update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// Region whose view produced this row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

impl CellRecord {
    pub fn new(id: impl Into<String>, status: CellStatus) -> Self {
        Self {
            id: id.into(),
            status,
            updated_at: None,
            elapsed_ms: None,
            x: None,
            y: None,
            client_at: None,
            endpoint_at: None,
            created_at: None,
            view_at: None,
            created: None,
            updated: None,
            view: None,
        }
    }

    pub fn with_elapsed(mut self, updated_at: DateTime<Utc>, elapsed_ms: i64) -> Self {
        self.updated_at = Some(updated_at);
        self.elapsed_ms = Some(elapsed_ms);
        self
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Value to show on the cell, if any: requires a commit timestamp, an
    /// active status and a non-negative elapsed value.
    pub fn display_elapsed(&self) -> Option<u16> {
        if self.updated_at.is_none() || !self.status.is_active() {
            return None;
        }
        let elapsed = self.elapsed_ms?.min(MAX_DISPLAY_ELAPSED_MS);
        if elapsed >= 0 {
            Some(elapsed as u16)
        } else {
            None
        }
    }
}

/// One page of the paginated list. Records stay raw so a single malformed
/// entry is skipped instead of failing the whole page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(alias = "sensors")]
    pub grid_cells: Vec<Value>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl Page {
    /// Token for the next request, if the server says more pages remain.
    pub fn continuation(&self) -> Option<&str> {
        if !self.has_more {
            return None;
        }
        self.next_page_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}
