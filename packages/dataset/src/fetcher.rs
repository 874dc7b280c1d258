//! Single-chunk fetch: gate, retry, classification, normalization, cache.
//!
//! The fetcher is the only component that writes cache entries; every
//! other component reads. Each network attempt holds one gate permit,
//! released across the backoff sleep and re-acquired for the next
//! attempt, so a chunk waiting out its backoff never blocks a slot
//! another chunk could use.

use std::sync::Arc;

use pr_insights_dataset_models::{Distribution, FetchOutcome, Rollup, WeekId};

use crate::cache::{CacheKey, ChunkCache};
use crate::gate::ConcurrencyGate;
use crate::normalize;
use crate::retry::{RetryPolicy, StatusClass, classify};
use crate::transport::Transport;

/// Fetches one chunk at a time through the gate, with retry and outcome
/// classification.
pub struct ChunkFetcher {
    transport: Arc<dyn Transport>,
    gate: ConcurrencyGate,
    policy: RetryPolicy,
    rollups: Arc<ChunkCache<Rollup>>,
    distributions: Arc<ChunkCache<Distribution>>,
}

impl ChunkFetcher {
    /// Creates a fetcher over the given transport, gate, and caches.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        gate: ConcurrencyGate,
        policy: RetryPolicy,
        rollups: Arc<ChunkCache<Rollup>>,
        distributions: Arc<ChunkCache<Distribution>>,
    ) -> Self {
        Self {
            transport,
            gate,
            policy,
            rollups,
            distributions,
        }
    }

    /// Fetches and normalizes one weekly rollup chunk, caching it under
    /// `key` on success. Chunks that carry no `week` field of their own
    /// take the requested week.
    pub async fn fetch_rollup(
        &self,
        week: &WeekId,
        path: &str,
        key: &CacheKey,
    ) -> FetchOutcome<Rollup> {
        match self.fetch_value(path).await {
            FetchOutcome::Ok(value) => {
                let mut rollup = normalize::normalize(&value);
                if rollup.week.is_empty() {
                    rollup.week = week.clone();
                }
                self.rollups.set(key.clone(), rollup.clone());
                FetchOutcome::Ok(rollup)
            }
            FetchOutcome::Missing => FetchOutcome::Missing,
            FetchOutcome::Auth => FetchOutcome::Auth,
            FetchOutcome::Failed { error } => FetchOutcome::Failed { error },
        }
    }

    /// Fetches and normalizes one yearly distribution chunk, caching it
    /// under `key` on success.
    pub async fn fetch_distribution(
        &self,
        year: &str,
        path: &str,
        key: &CacheKey,
    ) -> FetchOutcome<Distribution> {
        match self.fetch_value(path).await {
            FetchOutcome::Ok(value) => {
                let mut distribution = normalize::normalize_distribution(&value);
                if distribution.year.is_empty() {
                    distribution.year = year.to_owned();
                }
                self.distributions.set(key.clone(), distribution.clone());
                FetchOutcome::Ok(distribution)
            }
            FetchOutcome::Missing => FetchOutcome::Missing,
            FetchOutcome::Auth => FetchOutcome::Auth,
            FetchOutcome::Failed { error } => FetchOutcome::Failed { error },
        }
    }

    /// The core attempt loop: fetch `path` while holding a gate permit,
    /// classify the status, and retry transient failures with a fixed
    /// backoff until the budget runs out.
    pub async fn fetch_value(&self, path: &str) -> FetchOutcome<serde_json::Value> {
        let mut last_error = String::new();

        for attempt in 0..=self.policy.max_retries {
            let result = {
                let _permit = self.gate.acquire().await;
                self.transport.get(path).await
                // Permit drops here, before any backoff sleep.
            };

            match result {
                Ok(response) => match classify(response.status) {
                    StatusClass::Success => match serde_json::from_str(&response.body) {
                        Ok(value) => return FetchOutcome::Ok(value),
                        Err(err) => {
                            return FetchOutcome::Failed {
                                error: format!("unparseable chunk body: {err}"),
                            };
                        }
                    },
                    StatusClass::AuthDenied => return FetchOutcome::Auth,
                    StatusClass::NotFound => return FetchOutcome::Missing,
                    StatusClass::Transient => {
                        last_error = format!("HTTP {}", response.status);
                    }
                    StatusClass::Permanent => {
                        return FetchOutcome::Failed {
                            error: format!("HTTP {}", response.status),
                        };
                    }
                },
                Err(err) => {
                    last_error = err.to_string();
                }
            }

            if attempt < self.policy.max_retries {
                log::warn!(
                    "Chunk fetch failed ({last_error}), retrying {path} in {:?} \
                     (attempt {}/{})",
                    self.policy.backoff,
                    attempt + 1,
                    self.policy.max_retries,
                );
                tokio::time::sleep(self.policy.backoff).await;
            }
        }

        log::error!("Chunk fetch failed after retries, giving up on {path}: {last_error}");
        FetchOutcome::Failed { error: last_error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::DatasetScope;
    use crate::testing::{StubReply, StubTransport};
    use serde_json::json;

    fn scope() -> DatasetScope {
        DatasetScope {
            organization: "acme".to_owned(),
            project: "platform".to_owned(),
            repository: "backend".to_owned(),
            branch: None,
            api_version: None,
        }
    }

    fn fetcher(transport: Arc<StubTransport>) -> (ChunkFetcher, Arc<ChunkCache<Rollup>>) {
        let rollups = Arc::new(ChunkCache::new());
        let fetcher = ChunkFetcher::new(
            transport,
            ConcurrencyGate::new(4),
            RetryPolicy::default(),
            rollups.clone(),
            Arc::new(ChunkCache::new()),
        );
        (fetcher, rollups)
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_then_success_yields_ok() {
        let transport = Arc::new(StubTransport::new());
        transport.respond_seq(
            "w1.json",
            vec![
                StubReply::Respond(500, String::new()),
                StubReply::Respond(200, json!({"week": "2026-W01", "pr_count": 5}).to_string()),
            ],
        );

        let (fetcher, _) = fetcher(transport.clone());
        let week = WeekId::from("2026-W01");
        let key = CacheKey::build(&scope(), week.as_str()).unwrap();
        let outcome = fetcher.fetch_rollup(&week, "w1.json", &key).await;

        match outcome {
            FetchOutcome::Ok(rollup) => assert_eq!(rollup.pr_count, 5),
            other => panic!("expected Ok, got {other:?}"),
        }
        assert_eq!(transport.get_calls_for("w1.json"), 2);
    }

    #[tokio::test]
    async fn auth_rejection_is_not_retried() {
        let transport = Arc::new(StubTransport::new());
        transport.respond("w1.json", 401, "");

        let (fetcher, _) = fetcher(transport.clone());
        let outcome = fetcher.fetch_value("w1.json").await;

        assert_eq!(outcome, FetchOutcome::Auth);
        assert_eq!(transport.get_calls_for("w1.json"), 1);
    }

    #[tokio::test]
    async fn missing_chunk_is_not_retried() {
        let transport = Arc::new(StubTransport::new());
        transport.respond("w1.json", 404, "");

        let (fetcher, _) = fetcher(transport.clone());
        let outcome = fetcher.fetch_value("w1.json").await;

        assert_eq!(outcome, FetchOutcome::Missing);
        assert_eq!(transport.get_calls_for("w1.json"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_server_error_exhausts_the_budget() {
        let transport = Arc::new(StubTransport::new());
        transport.respond("w1.json", 503, "");

        let (fetcher, _) = fetcher(transport.clone());
        let outcome = fetcher.fetch_value("w1.json").await;

        assert_eq!(
            outcome,
            FetchOutcome::Failed {
                error: "HTTP 503".to_owned()
            }
        );
        // One attempt plus one retry.
        assert_eq!(transport.get_calls_for("w1.json"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn network_errors_are_retried_like_server_errors() {
        let transport = Arc::new(StubTransport::new());
        transport.respond_seq(
            "w1.json",
            vec![
                StubReply::NetworkError("connection reset".to_owned()),
                StubReply::Respond(200, json!({"week": "2026-W01"}).to_string()),
            ],
        );

        let (fetcher, _) = fetcher(transport.clone());
        let outcome = fetcher.fetch_value("w1.json").await;

        assert!(matches!(outcome, FetchOutcome::Ok(_)));
        assert_eq!(transport.get_calls_for("w1.json"), 2);
    }

    #[tokio::test]
    async fn unparseable_body_fails_without_retry() {
        let transport = Arc::new(StubTransport::new());
        transport.respond("w1.json", 200, "not json {");

        let (fetcher, _) = fetcher(transport.clone());
        let outcome = fetcher.fetch_value("w1.json").await;

        assert!(matches!(outcome, FetchOutcome::Failed { .. }));
        assert_eq!(transport.get_calls_for("w1.json"), 1);
    }

    #[tokio::test]
    async fn successful_rollup_fetch_populates_the_cache() {
        let transport = Arc::new(StubTransport::new());
        transport.respond_json("w1.json", 200, &json!({"week": "2026-W01", "pr_count": 9}));

        let (fetcher, rollups) = fetcher(transport);
        let week = WeekId::from("2026-W01");
        let key = CacheKey::build(&scope(), week.as_str()).unwrap();
        fetcher.fetch_rollup(&week, "w1.json", &key).await;

        let cached = rollups.get(&key).expect("rollup cached");
        assert_eq!(cached.pr_count, 9);
    }

    #[tokio::test]
    async fn rollup_without_week_field_takes_the_requested_week() {
        let transport = Arc::new(StubTransport::new());
        transport.respond_json("w1.json", 200, &json!({"pr_count": 2}));

        let (fetcher, _) = fetcher(transport);
        let week = WeekId::from("2026-W01");
        let key = CacheKey::build(&scope(), week.as_str()).unwrap();
        let outcome = fetcher.fetch_rollup(&week, "w1.json", &key).await;

        match outcome {
            FetchOutcome::Ok(rollup) => assert_eq!(rollup.week.as_str(), "2026-W01"),
            other => panic!("expected Ok, got {other:?}"),
        }
    }
}
