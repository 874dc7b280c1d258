//! Feature-gated payloads: ML trend predictions and generated insights.
//!
//! Both files live at well-known paths under the dataset root
//! (`predictions/trends.json`, `insights/summary.json`) and are fetched
//! only when the corresponding manifest feature flag is on. Their
//! contracts come from the extraction pipeline's forecaster and insight
//! generator; [`Predictions::validate`] and [`Insights::validate`] check
//! the structural rules a parsed-but-wrong payload can still break.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Data quality assessment attached to a predictions payload.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataQuality {
    /// Eight or more weeks of history backed the forecast.
    Normal,
    /// Between four and seven weeks of history; wider confidence bands.
    LowConfidence,
    /// Fewer than four weeks; forecasts are empty.
    Insufficient,
}

/// The predictions payload (`predictions/trends.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    /// Payload contract version.
    #[serde(default)]
    pub schema_version: u32,
    /// When the payload was generated (RFC 3339).
    #[serde(default)]
    pub generated_at: String,
    /// Whether this is a placeholder written without a real forecaster.
    #[serde(default)]
    pub is_stub: bool,
    /// Identifier of the generator that produced the payload.
    #[serde(default)]
    pub generated_by: Option<String>,
    /// Which forecasting backend ran (e.g., `"linear"`, `"prophet"`).
    #[serde(default)]
    pub forecaster: Option<String>,
    /// Quality of the history the forecasts were fit on.
    pub data_quality: DataQuality,
    /// One forecast per metric. Empty when data quality is insufficient.
    #[serde(default)]
    pub forecasts: Vec<Forecast>,
}

impl Predictions {
    /// Checks the structural rules deserialization alone cannot enforce.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the payload is semantically
    /// invalid: a zero schema version, an empty `generated_at`, or a
    /// forecast with no metric name or an empty value series.
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version == 0 {
            return Err("schema_version is missing or zero".to_owned());
        }
        if self.generated_at.is_empty() {
            return Err("generated_at is missing or empty".to_owned());
        }
        for forecast in &self.forecasts {
            if forecast.metric.is_empty() {
                return Err("forecast with empty metric name".to_owned());
            }
            if forecast.values.is_empty() {
                return Err(format!("forecast for {:?} has no values", forecast.metric));
            }
        }
        Ok(())
    }
}

/// A forecast series for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Metric name (e.g., `"pr_throughput"`, `"cycle_time_minutes"`).
    pub metric: String,
    /// Unit of the predicted values.
    #[serde(default)]
    pub unit: Option<String>,
    /// How many weeks ahead the series extends.
    #[serde(default)]
    pub horizon_weeks: u32,
    /// One point per forecast week.
    #[serde(default)]
    pub values: Vec<ForecastPoint>,
}

/// A single forecast point with its confidence band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Monday of the forecast week (ISO date).
    pub period_start: String,
    /// Predicted value.
    pub predicted: f64,
    /// Lower edge of the confidence band.
    #[serde(default)]
    pub lower_bound: Option<f64>,
    /// Upper edge of the confidence band.
    #[serde(default)]
    pub upper_bound: Option<f64>,
}

/// Category of a generated insight.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InsightCategory {
    /// A stage of the review process that throttles throughput.
    Bottleneck,
    /// A sustained directional change in a metric.
    Trend,
    /// A one-off deviation from the usual pattern.
    Anomaly,
}

/// Severity of a generated insight.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InsightSeverity {
    /// Informational observation.
    Info,
    /// Worth attention.
    Warning,
    /// Actively harmful pattern.
    Critical,
}

/// The insights payload (`insights/summary.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    /// Payload contract version.
    #[serde(default)]
    pub schema_version: u32,
    /// When the payload was generated (RFC 3339).
    #[serde(default)]
    pub generated_at: String,
    /// Whether this is a placeholder written without a real generator.
    #[serde(default)]
    pub is_stub: bool,
    /// Up to three insights, at most one per category.
    #[serde(default)]
    pub insights: Vec<Insight>,
}

impl Insights {
    /// Checks the structural rules deserialization alone cannot enforce.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the payload is semantically
    /// invalid: a zero schema version, an empty `generated_at`, or an
    /// insight with an empty id or title.
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version == 0 {
            return Err("schema_version is missing or zero".to_owned());
        }
        if self.generated_at.is_empty() {
            return Err("generated_at is missing or empty".to_owned());
        }
        for insight in &self.insights {
            if insight.id.is_empty() {
                return Err("insight with empty id".to_owned());
            }
            if insight.title.is_empty() {
                return Err(format!("insight {:?} has an empty title", insight.id));
            }
        }
        Ok(())
    }
}

/// One generated insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Stable identifier (used for caching and dedup upstream).
    pub id: String,
    /// Which kind of pattern this insight describes.
    pub category: InsightCategory,
    /// How much attention it deserves.
    pub severity: InsightSeverity,
    /// Short summary.
    pub title: String,
    /// Detailed description of the observed pattern.
    #[serde(default)]
    pub description: String,
    /// Entities the pattern involves (e.g., `"repo:backend"`).
    #[serde(default)]
    pub affected_entities: Vec<String>,
}
