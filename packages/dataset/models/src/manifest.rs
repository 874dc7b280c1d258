//! The dataset manifest: the top-level index artifact.
//!
//! The manifest is loaded once per loader instance and never mutated.
//! Deserialization is deliberately tolerant — every section defaults when
//! absent — because older extractors wrote sparser manifests. Version
//! enforcement happens separately in the loader's version gate, *before*
//! any other field is trusted.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::WeekId;

/// The dataset manifest (`dataset-manifest.json` at the dataset root).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version of the manifest file itself. Zero means the field
    /// was absent, which the version gate rejects.
    #[serde(default)]
    pub manifest_schema_version: u32,
    /// Schema version of the extracted dataset the manifest points at.
    #[serde(default)]
    pub dataset_schema_version: u32,
    /// Schema version of the aggregate (rollup/distribution) chunks.
    #[serde(default)]
    pub aggregates_schema_version: u32,
    /// Date coverage of the dataset, when the extractor recorded it.
    #[serde(default)]
    pub coverage: Option<Coverage>,
    /// Dashboard defaults chosen at extraction time.
    #[serde(default)]
    pub defaults: Option<Defaults>,
    /// Feature flags (e.g., `"predictions"`, `"insights"`). Absent flags
    /// are treated as disabled.
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    /// Index of every aggregate chunk the dataset contains.
    #[serde(default)]
    pub aggregate_index: AggregateIndex,
}

impl Manifest {
    /// Whether the named feature flag is present and enabled.
    #[must_use]
    pub fn feature_enabled(&self, name: &str) -> bool {
        self.features.get(name).copied().unwrap_or(false)
    }
}

/// Date coverage of the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    /// Inclusive range of dates with extracted data.
    #[serde(default)]
    pub date_range: Option<DateRange>,
}

/// An inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Earliest covered date.
    pub min: NaiveDate,
    /// Latest covered date.
    pub max: NaiveDate,
}

/// Dashboard defaults recorded by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    /// How many days of history the dashboard should show by default.
    #[serde(default)]
    pub default_date_range_days: Option<u32>,
}

/// Index of every aggregate chunk file in the dataset.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateIndex {
    /// One entry per ISO week with a weekly rollup chunk.
    #[serde(default)]
    pub weekly_rollups: Vec<RollupRef>,
    /// One entry per calendar year with a distribution chunk.
    #[serde(default)]
    pub distributions: Vec<DistributionRef>,
}

/// Manifest index entry for a weekly rollup chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupRef {
    /// ISO week the chunk covers.
    pub week: WeekId,
    /// Path of the chunk file, relative to the dataset root.
    pub path: String,
}

/// Manifest index entry for a yearly distribution chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRef {
    /// Calendar year the chunk covers (e.g., `"2026"`).
    pub year: String,
    /// Path of the chunk file, relative to the dataset root.
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_manifest_deserializes_with_defaults() {
        let manifest: Manifest = serde_json::from_str(r#"{"manifest_schema_version": 1}"#).unwrap();
        assert_eq!(manifest.manifest_schema_version, 1);
        assert_eq!(manifest.dataset_schema_version, 0);
        assert!(manifest.coverage.is_none());
        assert!(manifest.features.is_empty());
        assert!(manifest.aggregate_index.weekly_rollups.is_empty());
    }

    #[test]
    fn full_manifest_round_trips() {
        let json = r#"{
            "manifest_schema_version": 2,
            "dataset_schema_version": 2,
            "aggregates_schema_version": 1,
            "coverage": {"date_range": {"min": "2025-01-06", "max": "2026-02-01"}},
            "defaults": {"default_date_range_days": 90},
            "features": {"predictions": true, "insights": false},
            "aggregate_index": {
                "weekly_rollups": [{"week": "2026-W01", "path": "aggregates/weekly_rollup_2026-W01.json"}],
                "distributions": [{"year": "2026", "path": "aggregates/distribution_2026.json"}]
            }
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert!(manifest.feature_enabled("predictions"));
        assert!(!manifest.feature_enabled("insights"));
        assert!(!manifest.feature_enabled("unheard_of"));
        assert_eq!(manifest.aggregate_index.weekly_rollups.len(), 1);
        assert_eq!(
            manifest.aggregate_index.weekly_rollups[0].week.as_str(),
            "2026-W01"
        );

        let back = serde_json::to_string(&manifest).unwrap();
        let reparsed: Manifest = serde_json::from_str(&back).unwrap();
        assert_eq!(reparsed, manifest);
    }
}
