#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for querying chunked PR-metrics datasets.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use pr_insights_dataset::transport::HttpTransport;
use pr_insights_dataset::{DatasetLoader, DatasetScope, LoaderConfig};
use pr_insights_dataset_models::{FeatureLoad, RangeQueryResult};

#[derive(Parser)]
#[command(name = "pr_insights_cli", about = "PR-metrics dataset query tool")]
struct Cli {
    /// Base URL the dataset artifacts are published under
    #[arg(long)]
    base_url: String,
    /// Organization the dataset belongs to
    #[arg(long)]
    organization: String,
    /// Project within the organization
    #[arg(long)]
    project: String,
    /// Repository the metrics were extracted from
    #[arg(long)]
    repository: String,
    /// Branch filter the dataset was extracted with
    #[arg(long)]
    branch: Option<String>,
    /// Source-control API version the extractor ran against
    #[arg(long)]
    api_version: Option<String>,
    /// Maximum simultaneous chunk fetches
    #[arg(long, default_value = "4")]
    max_concurrent: usize,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show manifest versions, coverage, flags, and chunk counts
    Manifest,
    /// Load weekly rollups for a date range
    Rollups {
        /// Inclusive start date (ISO, e.g., `2026-01-06`). Defaults to the
        /// manifest's default range ending at the coverage max.
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Inclusive end date (ISO)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Load yearly cycle-time distributions for a date range
    Distributions {
        /// Inclusive start date (ISO)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Inclusive end date (ISO)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// Load the ML trend predictions payload (if enabled)
    Predictions,
    /// Load the generated insights payload (if enabled)
    Insights,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let mut transport = HttpTransport::new(&cli.base_url);
    if let Ok(token) = std::env::var("PR_INSIGHTS_TOKEN") {
        transport = transport.with_bearer_token(token);
    }

    let scope = DatasetScope {
        organization: cli.organization,
        project: cli.project,
        repository: cli.repository,
        branch: cli.branch,
        api_version: cli.api_version,
    };
    let config = LoaderConfig {
        max_concurrent: cli.max_concurrent,
        ..LoaderConfig::default()
    };

    let mut loader = DatasetLoader::with_config(Arc::new(transport), scope, config);
    loader.load_manifest().await?;

    match cli.command {
        Commands::Manifest => {
            let manifest = loader.manifest()?;
            println!("manifest schema:   v{}", manifest.manifest_schema_version);
            println!("dataset schema:    v{}", manifest.dataset_schema_version);
            println!("aggregates schema: v{}", manifest.aggregates_schema_version);
            match loader.coverage()? {
                Some(range) => println!("coverage:          {} .. {}", range.min, range.max),
                None => println!("coverage:          (not recorded)"),
            }
            println!("default range:     {} days", loader.default_range_days()?);
            println!(
                "chunks indexed:    {} weekly rollups, {} distributions",
                manifest.aggregate_index.weekly_rollups.len(),
                manifest.aggregate_index.distributions.len()
            );
            if manifest.features.is_empty() {
                println!("features:          (none)");
            } else {
                for (name, enabled) in &manifest.features {
                    println!("feature {name:<18} {}", if *enabled { "on" } else { "off" });
                }
            }
        }
        Commands::Rollups { start, end } => {
            let (start, end) = resolve_range(&loader, start, end)?;
            log::info!("Loading weekly rollups for {start} .. {end}");
            let result = loader.weekly_rollups(start, end).await?;

            println!(
                "{:<10} {:>8} {:>12} {:>12} {:>8}",
                "WEEK", "PRS", "P50 (min)", "P90 (min)", "AUTHORS"
            );
            for rollup in &result.data {
                println!(
                    "{:<10} {:>8} {:>12} {:>12} {:>8}",
                    rollup.week.as_str(),
                    rollup.pr_count,
                    fmt_opt(rollup.cycle_time_p50),
                    fmt_opt(rollup.cycle_time_p90),
                    rollup.authors_count,
                );
            }
            report_degradation(&result);
        }
        Commands::Distributions { start, end } => {
            let (start, end) = resolve_range(&loader, start, end)?;
            log::info!("Loading distributions for {start} .. {end}");
            let result = loader.distributions(start, end).await?;

            for distribution in &result.data {
                println!("{}:", distribution.year);
                for (bucket, count) in &distribution.cycle_time_buckets {
                    println!("  {bucket:<12} {count}");
                }
            }
            report_degradation(&result);
        }
        Commands::Predictions => match loader.load_predictions().await? {
            FeatureLoad::Ok(predictions) => {
                println!(
                    "generated {} by {} (quality: {})",
                    predictions.generated_at,
                    predictions.forecaster.as_deref().unwrap_or("unknown"),
                    predictions.data_quality,
                );
                for forecast in &predictions.forecasts {
                    println!(
                        "{} ({}, {} weeks ahead):",
                        forecast.metric,
                        forecast.unit.as_deref().unwrap_or("-"),
                        forecast.horizon_weeks,
                    );
                    for point in &forecast.values {
                        println!(
                            "  {} {:>10.1}  [{} .. {}]",
                            point.period_start,
                            point.predicted,
                            fmt_opt(point.lower_bound),
                            fmt_opt(point.upper_bound),
                        );
                    }
                }
            }
            other => report_feature_state("predictions", &other),
        },
        Commands::Insights => match loader.load_insights().await? {
            FeatureLoad::Ok(insights) => {
                for insight in &insights.insights {
                    println!(
                        "[{}/{}] {}",
                        insight.category, insight.severity, insight.title
                    );
                    println!("  {}", insight.description);
                    if !insight.affected_entities.is_empty() {
                        println!("  affects: {}", insight.affected_entities.join(", "));
                    }
                }
            }
            other => report_feature_state("insights", &other),
        },
    }

    Ok(())
}

/// Fills in missing range endpoints from the manifest: the end defaults
/// to the coverage max (or today), the start to the manifest's default
/// range before the end.
fn resolve_range(
    loader: &DatasetLoader,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate), Box<dyn std::error::Error>> {
    let end = match end {
        Some(end) => end,
        None => loader
            .coverage()?
            .map_or_else(|| Utc::now().date_naive(), |range| range.max),
    };
    let start = match start {
        Some(start) => start,
        None => end
            .checked_sub_days(Days::new(u64::from(loader.default_range_days()?)))
            .unwrap_or(end),
    };
    Ok((start, end))
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_owned(), |v| format!("{v:.1}"))
}

fn report_degradation<T>(result: &RangeQueryResult<T>) {
    if !result.missing.is_empty() {
        println!(
            "warning: no data published for {}",
            result.missing.join(", ")
        );
    }
    if !result.failed.is_empty() {
        println!("warning: failed to load {}", result.failed.join(", "));
    }
    if result.auth_error {
        println!("warning: some chunks were rejected for authentication; data is incomplete");
    }
}

fn report_feature_state<T>(name: &str, load: &FeatureLoad<T>) {
    match load {
        FeatureLoad::Disabled => println!("{name}: disabled in the dataset manifest"),
        FeatureLoad::Missing => println!("{name}: enabled but no payload has been published"),
        FeatureLoad::Auth => println!("{name}: authentication required"),
        FeatureLoad::Invalid { reason } => println!("{name}: invalid payload: {reason}"),
        FeatureLoad::Failed { error } => println!("{name}: failed to load: {error}"),
        FeatureLoad::Ok(_) => unreachable!("handled by the caller"),
    }
}
