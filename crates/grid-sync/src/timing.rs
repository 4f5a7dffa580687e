//! Cross-region latency timeline for a single cell.
//!
//! Every region reports when the write entered the endpoint (`endpointAt`),
//! when the entity committed it (`updatedAt`) and when that region's view saw
//! it (`viewAt`). Endpoint clocks drift independently, so when the reported
//! endpoint-to-entity gap is longer than the slowest entity-to-view gap the
//! excess is treated as skew and the endpoint time is pulled forward to
//! `updatedAt - gap2`.

use chrono::{DateTime, Utc};

use crate::record::CellRecord;

pub const DEFAULT_TIMELINE_WIDTH_PX: u32 = 400;
pub const DEFAULT_TIMELINE_INDENT_PX: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingSample {
    pub id: String,
    pub endpoint_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub view_at: DateTime<Utc>,
    pub updated_region: Option<String>,
    pub view_region: Option<String>,
}

impl TimingSample {
    /// Rows missing any of the three timestamps cannot be placed on the
    /// timeline and are dropped.
    pub fn from_record(record: &CellRecord) -> Option<Self> {
        Some(Self {
            id: record.id.clone(),
            endpoint_at: record.endpoint_at?,
            updated_at: record.updated_at?,
            view_at: record.view_at?,
            updated_region: record.updated.clone(),
            view_region: record.view.clone(),
        })
    }
}

/// Entity-to-view latency observed by one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionLatency {
    /// 1-based position, oldest view first.
    pub index: usize,
    pub region: Option<String>,
    pub view_at: DateTime<Utc>,
    pub entity_to_view_ms: i64,
}

/// Pixel offsets of the timeline markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineLayout {
    pub endpoint_x: i64,
    pub updated_x: i64,
    pub view_xs: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingOverlay {
    pub id: String,
    pub updated_region: Option<String>,
    pub reported_endpoint_at: DateTime<Utc>,
    /// Endpoint time after skew compensation.
    pub endpoint_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub compensated: bool,
    pub reported_endpoint_to_entity_ms: i64,
    pub endpoint_to_entity_ms: i64,
    pub views: Vec<RegionLatency>,
}

impl TimingOverlay {
    /// Builds the timeline from whichever samples arrived. Returns `None`
    /// when no sample is usable.
    pub fn compute(mut samples: Vec<TimingSample>) -> Option<Self> {
        samples.sort_by_key(|sample| sample.view_at);
        let first = samples.first()?;
        let youngest_view_at = samples.last()?.view_at;

        let reported_endpoint_at = first.endpoint_at;
        let updated_at = first.updated_at;
        let gap1 = updated_at - reported_endpoint_at;
        let gap2 = youngest_view_at - updated_at;
        let (endpoint_at, compensated) = if gap1 > gap2 {
            (updated_at - gap2, true)
        } else {
            (reported_endpoint_at, false)
        };

        let views = samples
            .iter()
            .enumerate()
            .map(|(idx, sample)| RegionLatency {
                index: idx + 1,
                region: sample.view_region.clone(),
                view_at: sample.view_at,
                entity_to_view_ms: (sample.view_at - sample.updated_at).num_milliseconds(),
            })
            .collect();

        Some(Self {
            id: first.id.clone(),
            updated_region: first.updated_region.clone(),
            reported_endpoint_at,
            endpoint_at,
            updated_at,
            compensated,
            reported_endpoint_to_entity_ms: gap1.num_milliseconds(),
            endpoint_to_entity_ms: (updated_at - endpoint_at).num_milliseconds(),
            views,
        })
    }

    pub fn oldest_view_at(&self) -> DateTime<Utc> {
        self.views
            .first()
            .map(|view| view.view_at)
            .unwrap_or(self.updated_at)
    }

    pub fn youngest_view_at(&self) -> DateTime<Utc> {
        self.views
            .last()
            .map(|view| view.view_at)
            .unwrap_or(self.updated_at)
    }

    /// Total span from the compensated endpoint to the youngest view.
    pub fn range_ms(&self) -> i64 {
        (self.youngest_view_at() - self.endpoint_at).num_milliseconds()
    }

    /// Maps an instant onto `[indent, width - indent]`.
    pub fn offset_px(&self, at: DateTime<Utc>, width_px: u32, indent_px: u32) -> i64 {
        let range = self.range_ms();
        let indent = i64::from(indent_px);
        if range == 0 {
            return indent;
        }
        let usable = f64::from(width_px) - 2.0 * f64::from(indent_px);
        let ratio = (at - self.endpoint_at).num_milliseconds() as f64 / range as f64;
        (ratio * usable + 0.5).floor() as i64 + indent
    }

    pub fn layout(&self, width_px: u32, indent_px: u32) -> TimelineLayout {
        TimelineLayout {
            endpoint_x: self.offset_px(self.endpoint_at, width_px, indent_px),
            updated_x: self.offset_px(self.updated_at, width_px, indent_px),
            view_xs: self
                .views
                .iter()
                .map(|view| self.offset_px(view.view_at, width_px, indent_px))
                .collect(),
        }
    }
}
