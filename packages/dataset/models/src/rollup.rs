//! Aggregate chunk records: weekly rollups and yearly distributions.

use std::collections::BTreeMap;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::WeekId;

/// A per-dimension breakdown attached to a rollup (`by_repository`,
/// `by_team`).
///
/// Three states, carried explicitly rather than through a null-vs-object
/// convention:
///
/// - [`NotSupported`](Self::NotSupported): the chunk was produced by a
///   dataset version that predates the dimension — JSON `null` or absent.
/// - [`Empty`](Self::Empty): the dimension was computed and had no
///   entries — JSON `{}`.
/// - [`Present`](Self::Present): the dimension was computed with entries.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum DimensionSlice {
    /// The producing dataset version did not compute this dimension.
    #[default]
    NotSupported,
    /// Computed but empty.
    Empty,
    /// Computed, keyed by repository/team name.
    Present(BTreeMap<String, serde_json::Value>),
}

impl DimensionSlice {
    /// Whether the producing dataset version computed this dimension at
    /// all.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        !matches!(self, Self::NotSupported)
    }

    /// The computed entries, if any. `None` for both
    /// [`NotSupported`](Self::NotSupported) and [`Empty`](Self::Empty).
    #[must_use]
    pub const fn entries(&self) -> Option<&BTreeMap<String, serde_json::Value>> {
        match self {
            Self::Present(map) => Some(map),
            Self::NotSupported | Self::Empty => None,
        }
    }
}

impl Serialize for DimensionSlice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // Null (not absent) so consumers can tell "not computed"
            // from "computed empty".
            Self::NotSupported => serializer.serialize_none(),
            Self::Empty => BTreeMap::<String, serde_json::Value>::new().serialize(serializer),
            Self::Present(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for DimensionSlice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
        Ok(match raw {
            None => Self::NotSupported,
            Some(map) if map.is_empty() => Self::Empty,
            Some(map) => Self::Present(map),
        })
    }
}

/// Aggregated pull-request metrics for one ISO week.
///
/// Every field is present after normalization, including on chunks written
/// by older schema versions. Unknown fields from newer producers survive
/// in [`extra`](Self::extra) so a newer dataset renders through an older
/// loader without data loss.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rollup {
    /// ISO week this rollup covers.
    #[serde(default)]
    pub week: WeekId,
    /// Number of pull requests completed in the week.
    #[serde(default)]
    pub pr_count: u64,
    /// Median cycle time in minutes. `None` when no PR closed that week.
    #[serde(default)]
    pub cycle_time_p50: Option<f64>,
    /// 90th-percentile cycle time in minutes.
    #[serde(default)]
    pub cycle_time_p90: Option<f64>,
    /// Distinct PR authors active in the week.
    #[serde(default)]
    pub authors_count: u64,
    /// Distinct reviewers active in the week.
    #[serde(default)]
    pub reviewers_count: u64,
    /// Per-repository breakdown of the week's metrics.
    #[serde(default)]
    pub by_repository: DimensionSlice,
    /// Per-team breakdown of the week's metrics.
    #[serde(default)]
    pub by_team: DimensionSlice,
    /// Fields this loader version does not know about, passed through
    /// unchanged.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Cycle-time distribution for one calendar year.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    /// Calendar year the distribution covers (e.g., `"2026"`).
    #[serde(default)]
    pub year: String,
    /// Histogram of cycle times, keyed by bucket label (e.g., `"<1h"`,
    /// `"1-4h"`).
    #[serde(default)]
    pub cycle_time_buckets: BTreeMap<String, u64>,
    /// Unknown fields from newer producers, passed through unchanged.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}
