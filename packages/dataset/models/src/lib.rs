#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared data types for the PR insights dataset loader.
//!
//! The dataset is a directory of small JSON artifacts: one manifest
//! ([`Manifest`]) describing schema versions, feature flags, and chunk
//! paths; one weekly rollup chunk ([`Rollup`]) per ISO week; one
//! distribution chunk ([`Distribution`]) per calendar year; and two
//! optional feature-gated payloads ([`Predictions`], [`Insights`]).
//!
//! Everything here is plain data — fetching, caching, and normalization
//! live in `pr_insights_dataset`.

mod features;
mod manifest;
mod outcome;
mod rollup;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::features::{
    DataQuality, Forecast, ForecastPoint, Insight, InsightCategory, InsightSeverity, Insights,
    Predictions,
};
pub use crate::manifest::{
    AggregateIndex, Coverage, DateRange, Defaults, DistributionRef, Manifest, RollupRef,
};
pub use crate::outcome::{FeatureLoad, FetchOutcome, RangeQueryResult};
pub use crate::rollup::{DimensionSlice, Distribution, Rollup};

/// An ISO-8601 week identifier in `"YYYY-Www"` form (e.g., `"2026-W07"`).
///
/// Week numbers are always zero-padded to two digits, so the string is
/// fixed-width and lexicographic order equals chronological order. That
/// property is what lets range query results be sorted with a plain
/// string comparison.
#[derive(
    Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct WeekId(String);

impl WeekId {
    /// Builds a week identifier from an ISO week-year and week number.
    #[must_use]
    pub fn from_parts(year: i32, week: u32) -> Self {
        Self(format!("{year}-W{week:02}"))
    }

    /// The identifier as a `"YYYY-Www"` string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the empty placeholder identifier (a chunk that
    /// carried no `week` field of its own).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WeekId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for WeekId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_id_zero_pads_week_number() {
        assert_eq!(WeekId::from_parts(2026, 7).as_str(), "2026-W07");
        assert_eq!(WeekId::from_parts(2026, 52).as_str(), "2026-W52");
    }

    #[test]
    fn week_id_orders_lexicographically_and_chronologically() {
        let earlier = WeekId::from_parts(2026, 9);
        let later = WeekId::from_parts(2026, 10);
        assert!(earlier < later);
    }

    #[test]
    fn week_id_serializes_as_bare_string() {
        let json = serde_json::to_string(&WeekId::from_parts(2026, 1)).unwrap();
        assert_eq!(json, "\"2026-W01\"");
    }
}
