//! Backward-compatible record normalization.
//!
//! Chunks written by older dataset versions are missing fields the
//! current dashboard expects. [`normalize`] fills every documented field
//! with its value when present — including legitimate `0` values, which
//! null-coalescing preserves — and a documented default otherwise, so an
//! old chunk renders identically to a current one. Fields this loader
//! does *not* know about pass through unchanged, so a newer producer's
//! chunks survive an older loader.

use std::collections::BTreeMap;

use pr_insights_dataset_models::{DimensionSlice, Distribution, Rollup, WeekId};
use serde_json::Value;

/// Field names the normalizer owns; anything else is passed through.
const ROLLUP_FIELDS: &[&str] = &[
    "week",
    "pr_count",
    "cycle_time_p50",
    "cycle_time_p90",
    "authors_count",
    "reviewers_count",
    "by_repository",
    "by_team",
];

const DISTRIBUTION_FIELDS: &[&str] = &["year", "cycle_time_buckets"];

/// Normalizes an arbitrary JSON value into a fully-populated [`Rollup`].
///
/// Null and non-object inputs normalize to the all-defaults rollup.
/// Idempotent: normalizing an already-normalized rollup (serialized back
/// to JSON) changes nothing.
#[must_use]
pub fn normalize(raw: &Value) -> Rollup {
    let Some(obj) = raw.as_object() else {
        return Rollup::default();
    };

    Rollup {
        week: obj
            .get("week")
            .and_then(Value::as_str)
            .map_or_else(WeekId::default, WeekId::from),
        pr_count: count_field(obj, "pr_count"),
        cycle_time_p50: float_field(obj, "cycle_time_p50"),
        cycle_time_p90: float_field(obj, "cycle_time_p90"),
        authors_count: count_field(obj, "authors_count"),
        reviewers_count: count_field(obj, "reviewers_count"),
        by_repository: slice_field(obj, "by_repository"),
        by_team: slice_field(obj, "by_team"),
        extra: passthrough(obj, ROLLUP_FIELDS),
    }
}

/// Normalizes an arbitrary JSON value into a [`Distribution`].
///
/// Bucket counts that are not non-negative integers are dropped rather
/// than coerced; a malformed bucket should not masquerade as zero.
#[must_use]
pub fn normalize_distribution(raw: &Value) -> Distribution {
    let Some(obj) = raw.as_object() else {
        return Distribution::default();
    };

    let cycle_time_buckets = obj
        .get("cycle_time_buckets")
        .and_then(Value::as_object)
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|(label, count)| count.as_u64().map(|c| (label.clone(), c)))
                .collect()
        })
        .unwrap_or_default();

    Distribution {
        year: obj
            .get("year")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        cycle_time_buckets,
        extra: passthrough(obj, DISTRIBUTION_FIELDS),
    }
}

fn count_field(obj: &serde_json::Map<String, Value>, key: &str) -> u64 {
    obj.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn float_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64)
}

fn slice_field(obj: &serde_json::Map<String, Value>, key: &str) -> DimensionSlice {
    match obj.get(key) {
        None | Some(Value::Null) => DimensionSlice::NotSupported,
        Some(Value::Object(map)) if map.is_empty() => DimensionSlice::Empty,
        Some(Value::Object(map)) => {
            DimensionSlice::Present(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        }
        // A non-object value here is a producer bug; treat it like the
        // dimension was never computed.
        Some(_) => DimensionSlice::NotSupported,
    }
}

fn passthrough(
    obj: &serde_json::Map<String, Value>,
    known: &[&str],
) -> BTreeMap<String, Value> {
    obj.iter()
        .filter(|(key, _)| !known.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
