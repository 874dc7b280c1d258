//! The dataset loader: root resolution, manifest loading, and range
//! queries.
//!
//! A loader instance moves through two states: unresolved → manifest
//! loaded. Range queries require the manifest (it supplies the chunk
//! index) and fail fast with [`DatasetError::ManifestNotLoaded`] before
//! it is in. Per-chunk problems never fail a query; they surface as
//! degradation flags on the result. The one exception is a *total* auth
//! failure with zero usable data, which no caller can render and is
//! raised as [`DatasetError::AuthRequired`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use pr_insights_dataset_models::{
    DateRange, Distribution, FeatureLoad, FetchOutcome, Insights, Manifest, Predictions,
    RangeQueryResult, Rollup, WeekId,
};

use crate::DatasetError;
use crate::cache::{self, CacheKey, ChunkCache, SystemClock};
use crate::fetcher::ChunkFetcher;
use crate::gate::{ConcurrencyGate, DEFAULT_MAX_CONCURRENT};
use crate::progress::{ProgressCallback, null_progress};
use crate::retry::RetryPolicy;
use crate::transport::Transport;
use crate::{version, week};

/// Manifest filename at the dataset root.
pub const MANIFEST_FILE: &str = "dataset-manifest.json";

/// Candidate base paths probed for the manifest, in priority order.
/// Nested layouts come from artifact download quirks of the host
/// platform; probing lets callers stay ignorant of which layout is in
/// effect.
pub const CANDIDATE_ROOTS: &[&str] = &["", "aggregates", "aggregates/aggregates", "dataset"];

/// Well-known path of the predictions payload, relative to the root.
pub const PREDICTIONS_PATH: &str = "predictions/trends.json";
/// Well-known path of the insights payload, relative to the root.
pub const INSIGHTS_PATH: &str = "insights/summary.json";

/// Fallback when the manifest does not record a default range.
pub const DEFAULT_RANGE_DAYS: u32 = 90;

/// Tenant scope identifying whose dataset this loader reads. Feeds the
/// composite cache keys so two loaders over different tenants can share
/// one cache without collisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetScope {
    /// Organization the dataset belongs to.
    pub organization: String,
    /// Project within the organization.
    pub project: String,
    /// Repository the metrics were extracted from.
    pub repository: String,
    /// Branch filter the dataset was extracted with, if any.
    pub branch: Option<String>,
    /// Source-control API version the extractor ran against, if pinned.
    pub api_version: Option<String>,
}

/// Tunables for a loader instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Maximum simultaneous chunk fetches (also the fan-out batch size).
    pub max_concurrent: usize,
    /// Per-chunk retry behavior.
    pub retry: RetryPolicy,
    /// Chunk cache capacity (entries per cache).
    pub cache_capacity: usize,
    /// Chunk cache absolute TTL.
    pub cache_ttl: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            retry: RetryPolicy::default(),
            cache_capacity: cache::DEFAULT_CAPACITY,
            cache_ttl: cache::DEFAULT_TTL,
        }
    }
}

/// Loads a chunked, versioned dataset through range queries.
pub struct DatasetLoader {
    transport: Arc<dyn Transport>,
    scope: DatasetScope,
    fetcher: ChunkFetcher,
    rollups: Arc<ChunkCache<Rollup>>,
    distributions: Arc<ChunkCache<Distribution>>,
    max_concurrent: usize,
    root: Option<String>,
    manifest: Option<Manifest>,
}

impl DatasetLoader {
    /// Creates a loader with default configuration and its own gate and
    /// caches.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, scope: DatasetScope) -> Self {
        Self::with_config(transport, scope, LoaderConfig::default())
    }

    /// Creates a loader with explicit configuration and its own gate and
    /// caches.
    #[must_use]
    pub fn with_config(
        transport: Arc<dyn Transport>,
        scope: DatasetScope,
        config: LoaderConfig,
    ) -> Self {
        let clock = Arc::new(SystemClock);
        let rollups = Arc::new(ChunkCache::with_config(
            config.cache_capacity,
            config.cache_ttl,
            clock.clone(),
        ));
        let distributions = Arc::new(ChunkCache::with_config(
            config.cache_capacity,
            config.cache_ttl,
            clock,
        ));
        let gate = ConcurrencyGate::new(config.max_concurrent);
        Self::with_shared_resources(transport, scope, config, gate, rollups, distributions)
    }

    /// Creates a loader over an externally owned gate and caches, for
    /// callers that share one gate or cache across several loaders in a
    /// process.
    #[must_use]
    pub fn with_shared_resources(
        transport: Arc<dyn Transport>,
        scope: DatasetScope,
        config: LoaderConfig,
        gate: ConcurrencyGate,
        rollups: Arc<ChunkCache<Rollup>>,
        distributions: Arc<ChunkCache<Distribution>>,
    ) -> Self {
        let fetcher = ChunkFetcher::new(
            transport.clone(),
            gate,
            config.retry,
            rollups.clone(),
            distributions.clone(),
        );
        Self {
            transport,
            scope,
            fetcher,
            rollups,
            distributions,
            max_concurrent: config.max_concurrent.max(1),
            root: None,
            manifest: None,
        }
    }

    /// Probes the candidate base paths for a manifest file and pins the
    /// first hit for the lifetime of the instance.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::ManifestNotFound`] when no candidate
    /// contains a manifest. Probe transport failures are logged and
    /// treated as misses.
    pub async fn resolve_root(&mut self) -> Result<&str, DatasetError> {
        if self.root.is_none() {
            let mut tried = Vec::new();
            for candidate in CANDIDATE_ROOTS {
                let probe_path = join_path(candidate, MANIFEST_FILE);
                tried.push(probe_path.clone());
                match self.transport.probe(&probe_path).await {
                    Ok(true) => {
                        log::debug!("Resolved dataset root: {candidate:?}");
                        self.root = Some((*candidate).to_owned());
                        break;
                    }
                    Ok(false) => {}
                    Err(err) => {
                        log::warn!("Probe for {probe_path} failed: {err}");
                    }
                }
            }
            if self.root.is_none() {
                return Err(DatasetError::ManifestNotFound { tried });
            }
        }
        Ok(self.root.as_deref().unwrap_or_default())
    }

    /// Fetches and validates the manifest, resolving the root first if
    /// needed. Idempotent once loaded.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::UnsupportedVersion`] for newer-than-
    /// supported schemas, [`DatasetError::AuthRequired`] when the
    /// manifest itself is rejected for authentication, and
    /// [`DatasetError::ManifestNotFound`] when it has vanished since the
    /// probe.
    pub async fn load_manifest(&mut self) -> Result<(), DatasetError> {
        if self.manifest.is_some() {
            return Ok(());
        }

        self.resolve_root().await?;
        let root = self.root.clone().unwrap_or_default();
        let manifest_path = join_path(&root, MANIFEST_FILE);

        let manifest: Manifest = match self.fetcher.fetch_value(&manifest_path).await {
            FetchOutcome::Ok(value) => serde_json::from_value(value)?,
            FetchOutcome::Auth => return Err(DatasetError::AuthRequired),
            FetchOutcome::Missing => {
                return Err(DatasetError::ManifestNotFound {
                    tried: vec![manifest_path],
                });
            }
            FetchOutcome::Failed { error } => {
                return Err(DatasetError::Transport { message: error });
            }
        };

        // Nothing beyond the version fields is trusted until this passes.
        version::validate(&manifest)?;

        if manifest.aggregate_index.weekly_rollups.is_empty()
            && manifest.aggregate_index.distributions.is_empty()
        {
            log::warn!("Manifest has an empty aggregate_index; all range queries will be empty");
        }

        self.manifest = Some(manifest);
        Ok(())
    }

    /// The loaded manifest.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::ManifestNotLoaded`] before
    /// [`load_manifest`](Self::load_manifest) succeeds.
    pub fn manifest(&self) -> Result<&Manifest, DatasetError> {
        self.manifest.as_ref().ok_or(DatasetError::ManifestNotLoaded)
    }

    /// Whether a manifest feature flag is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::ManifestNotLoaded`] before the manifest is
    /// loaded.
    pub fn is_feature_enabled(&self, name: &str) -> Result<bool, DatasetError> {
        Ok(self.manifest()?.feature_enabled(name))
    }

    /// The dataset's date coverage, when recorded.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::ManifestNotLoaded`] before the manifest is
    /// loaded.
    pub fn coverage(&self) -> Result<Option<DateRange>, DatasetError> {
        Ok(self.manifest()?.coverage.as_ref().and_then(|c| c.date_range))
    }

    /// The default number of history days a dashboard should show.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::ManifestNotLoaded`] before the manifest is
    /// loaded.
    pub fn default_range_days(&self) -> Result<u32, DatasetError> {
        Ok(self
            .manifest()?
            .defaults
            .as_ref()
            .and_then(|d| d.default_date_range_days)
            .unwrap_or(DEFAULT_RANGE_DAYS))
    }

    /// Loads the weekly rollups overlapping `[start, end]`.
    ///
    /// # Errors
    ///
    /// See [`weekly_rollups_with_progress`](Self::weekly_rollups_with_progress).
    pub async fn weekly_rollups(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RangeQueryResult<Rollup>, DatasetError> {
        self.weekly_rollups_with_progress(start, end, &null_progress())
            .await
    }

    /// Loads the weekly rollups overlapping `[start, end]`, reporting
    /// per-chunk progress.
    ///
    /// Cache hits return without touching the network. Misses fan out in
    /// batches of `max_concurrent`, so the gate's queue is a backstop
    /// rather than the only throttle. The merged result is sorted by
    /// week ascending regardless of fetch completion order.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::ManifestNotLoaded`] before the manifest is
    /// loaded, [`DatasetError::CacheKey`] when the tenant scope cannot
    /// form a safe cache key, and [`DatasetError::AuthRequired`] when
    /// every chunk was rejected for authentication and nothing usable was
    /// cached.
    pub async fn weekly_rollups_with_progress(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<RangeQueryResult<Rollup>, DatasetError> {
        let manifest = self.manifest()?;
        let root = self.root.clone().unwrap_or_default();
        let weeks = week::weeks_in_range(start, end);

        let index: BTreeMap<&WeekId, &str> = manifest
            .aggregate_index
            .weekly_rollups
            .iter()
            .map(|entry| (&entry.week, entry.path.as_str()))
            .collect();

        progress.set_total(weeks.len() as u64);

        let mut data: Vec<Rollup> = Vec::with_capacity(weeks.len());
        let mut misses: Vec<(WeekId, CacheKey, Option<String>)> = Vec::new();

        for week_id in weeks {
            let key = CacheKey::build(&self.scope, week_id.as_str())?;
            if let Some(hit) = self.rollups.get(&key) {
                data.push(hit);
                progress.inc(1);
            } else {
                let path = index.get(&week_id).map(|rel| join_path(&root, rel));
                misses.push((week_id, key, path));
            }
        }

        let mut missing: Vec<String> = Vec::new();
        let mut failed: Vec<String> = Vec::new();
        let mut auth_error = false;

        for batch in misses.chunks(self.max_concurrent) {
            let fetches = batch.iter().map(|(week_id, key, path)| async move {
                let outcome = match path {
                    // No index entry: the chunk cannot exist, skip the
                    // network entirely.
                    None => FetchOutcome::Missing,
                    Some(path) => self.fetcher.fetch_rollup(week_id, path, key).await,
                };
                (week_id, outcome)
            });

            for (week_id, outcome) in futures::future::join_all(fetches).await {
                progress.inc(1);
                match outcome {
                    FetchOutcome::Ok(rollup) => data.push(rollup),
                    FetchOutcome::Missing => missing.push(week_id.to_string()),
                    FetchOutcome::Auth => {
                        log::warn!("Auth rejected for week {week_id}");
                        auth_error = true;
                    }
                    FetchOutcome::Failed { error } => {
                        log::warn!("Week {week_id} failed: {error}");
                        failed.push(week_id.to_string());
                    }
                }
            }
        }

        if auth_error && data.is_empty() {
            progress.finish("authentication required".to_owned());
            return Err(DatasetError::AuthRequired);
        }

        data.sort_by(|a, b| a.week.cmp(&b.week));
        progress.finish(format!(
            "{} weeks loaded, {} missing, {} failed",
            data.len(),
            missing.len(),
            failed.len(),
        ));
        Ok(RangeQueryResult::from_parts(data, missing, failed, auth_error))
    }

    /// Loads the yearly distributions overlapping `[start, end]`.
    ///
    /// # Errors
    ///
    /// See [`distributions_with_progress`](Self::distributions_with_progress).
    pub async fn distributions(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RangeQueryResult<Distribution>, DatasetError> {
        self.distributions_with_progress(start, end, &null_progress())
            .await
    }

    /// Loads the yearly distributions overlapping `[start, end]`,
    /// reporting per-chunk progress.
    ///
    /// # Errors
    ///
    /// Same contract as
    /// [`weekly_rollups_with_progress`](Self::weekly_rollups_with_progress),
    /// keyed by calendar year instead of ISO week.
    pub async fn distributions_with_progress(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<RangeQueryResult<Distribution>, DatasetError> {
        let manifest = self.manifest()?;
        let root = self.root.clone().unwrap_or_default();
        let years: Vec<String> = (start.year()..=end.year()).map(|y| y.to_string()).collect();

        let index: BTreeMap<&str, &str> = manifest
            .aggregate_index
            .distributions
            .iter()
            .map(|entry| (entry.year.as_str(), entry.path.as_str()))
            .collect();

        progress.set_total(years.len() as u64);

        let mut data: Vec<Distribution> = Vec::with_capacity(years.len());
        let mut misses: Vec<(String, CacheKey, Option<String>)> = Vec::new();

        for year in years {
            let key = CacheKey::build(&self.scope, &year)?;
            if let Some(hit) = self.distributions.get(&key) {
                data.push(hit);
                progress.inc(1);
            } else {
                let path = index.get(year.as_str()).map(|rel| join_path(&root, rel));
                misses.push((year, key, path));
            }
        }

        let mut missing: Vec<String> = Vec::new();
        let mut failed: Vec<String> = Vec::new();
        let mut auth_error = false;

        for batch in misses.chunks(self.max_concurrent) {
            let fetches = batch.iter().map(|(year, key, path)| async move {
                let outcome = match path {
                    None => FetchOutcome::Missing,
                    Some(path) => self.fetcher.fetch_distribution(year, path, key).await,
                };
                (year, outcome)
            });

            for (year, outcome) in futures::future::join_all(fetches).await {
                progress.inc(1);
                match outcome {
                    FetchOutcome::Ok(distribution) => data.push(distribution),
                    FetchOutcome::Missing => missing.push(year.clone()),
                    FetchOutcome::Auth => {
                        log::warn!("Auth rejected for year {year}");
                        auth_error = true;
                    }
                    FetchOutcome::Failed { error } => {
                        log::warn!("Year {year} failed: {error}");
                        failed.push(year.clone());
                    }
                }
            }
        }

        if auth_error && data.is_empty() {
            progress.finish("authentication required".to_owned());
            return Err(DatasetError::AuthRequired);
        }

        data.sort_by(|a, b| a.year.cmp(&b.year));
        progress.finish(format!(
            "{} years loaded, {} missing, {} failed",
            data.len(),
            missing.len(),
            failed.len(),
        ));
        Ok(RangeQueryResult::from_parts(data, missing, failed, auth_error))
    }

    /// Loads the ML trend predictions payload, if the feature is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::ManifestNotLoaded`] before the manifest is
    /// loaded. All payload-level problems come back as [`FeatureLoad`]
    /// states, not errors.
    pub async fn load_predictions(&self) -> Result<FeatureLoad<Predictions>, DatasetError> {
        self.load_feature("predictions", PREDICTIONS_PATH).await
    }

    /// Loads the generated insights payload, if the feature is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::ManifestNotLoaded`] before the manifest is
    /// loaded. All payload-level problems come back as [`FeatureLoad`]
    /// states, not errors.
    pub async fn load_insights(&self) -> Result<FeatureLoad<Insights>, DatasetError> {
        self.load_feature("insights", INSIGHTS_PATH).await
    }

    async fn load_feature<T: ValidatedPayload>(
        &self,
        flag: &str,
        rel_path: &str,
    ) -> Result<FeatureLoad<T>, DatasetError> {
        let manifest = self.manifest()?;
        if !manifest.feature_enabled(flag) {
            return Ok(FeatureLoad::Disabled);
        }

        let root = self.root.clone().unwrap_or_default();
        let path = join_path(&root, rel_path);

        Ok(match self.fetcher.fetch_value(&path).await {
            FetchOutcome::Ok(value) => match serde_json::from_value::<T>(value) {
                Ok(payload) => match payload.validate() {
                    Ok(()) => FeatureLoad::Ok(payload),
                    Err(reason) => {
                        log::warn!("{rel_path} failed schema validation: {reason}");
                        FeatureLoad::Invalid { reason }
                    }
                },
                Err(err) => {
                    log::warn!("{rel_path} does not match the payload contract: {err}");
                    FeatureLoad::Invalid {
                        reason: err.to_string(),
                    }
                }
            },
            FetchOutcome::Missing => FeatureLoad::Missing,
            FetchOutcome::Auth => FeatureLoad::Auth,
            FetchOutcome::Failed { error } => FeatureLoad::Failed { error },
        })
    }
}

/// Payloads that carry their own structural validation rules.
trait ValidatedPayload: serde::de::DeserializeOwned {
    fn validate(&self) -> Result<(), String>;
}

impl ValidatedPayload for Predictions {
    fn validate(&self) -> Result<(), String> {
        Self::validate(self)
    }
}

impl ValidatedPayload for Insights {
    fn validate(&self) -> Result<(), String> {
        Self::validate(self)
    }
}

fn join_path(root: &str, rel: &str) -> String {
    if root.is_empty() {
        rel.to_owned()
    } else {
        format!("{}/{}", root.trim_end_matches('/'), rel)
    }
}
