//! Outcome types produced by the loader.
//!
//! Per-chunk failures are recovered into values rather than propagated as
//! errors, so one bad week never prevents the other weeks in a range from
//! rendering. The orchestrator folds [`FetchOutcome`]s into a
//! [`RangeQueryResult`] whose degradation flags tell the dashboard what it
//! can and cannot show.

use serde::Serialize;

/// The final classification of one chunk fetch, after the retry budget is
/// spent.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// The chunk was fetched, parsed, and normalized.
    Ok(T),
    /// The chunk does not exist (HTTP 404, or no manifest index entry).
    Missing,
    /// The fetch was rejected as unauthenticated/unauthorized (401/403).
    Auth,
    /// The fetch failed after exhausting retries (5xx, network error, or
    /// an unparseable body).
    Failed {
        /// The last error observed.
        error: String,
    },
}

/// The merged result of one range query.
///
/// Constructed fresh per query and never cached. A degraded result is
/// still usable — the dashboard renders what arrived and flags the rest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeQueryResult<T> {
    /// Successfully loaded records, sorted ascending by chunk key (week
    /// or year).
    pub data: Vec<T>,
    /// Chunk keys classified [`FetchOutcome::Missing`].
    pub missing: Vec<String>,
    /// Chunk keys classified [`FetchOutcome::Failed`].
    pub failed: Vec<String>,
    /// Whether any requested chunk is missing or failed.
    pub partial: bool,
    /// Whether any requested chunk was rejected for authentication.
    pub auth_error: bool,
    /// `partial || auth_error`.
    pub degraded: bool,
}

impl<T> RangeQueryResult<T> {
    /// Assembles a result and derives the degradation flags.
    #[must_use]
    pub fn from_parts(
        data: Vec<T>,
        missing: Vec<String>,
        failed: Vec<String>,
        auth_error: bool,
    ) -> Self {
        let partial = !missing.is_empty() || !failed.is_empty();
        Self {
            data,
            missing,
            failed,
            partial,
            auth_error,
            degraded: partial || auth_error,
        }
    }
}

/// The result of loading a feature-gated payload (predictions, insights).
///
/// Distinct from [`FetchOutcome`] in two ways: the manifest feature flag
/// can short-circuit the load entirely ([`Disabled`](Self::Disabled)), and
/// a payload that parses as JSON but fails structural validation is
/// [`Invalid`](Self::Invalid) — not a network-level failure.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureLoad<T> {
    /// The manifest feature flag is off; no network call was made.
    Disabled,
    /// The payload was fetched and validated.
    Ok(T),
    /// The payload file does not exist (HTTP 404).
    Missing,
    /// The fetch was rejected as unauthenticated/unauthorized (401/403).
    Auth,
    /// The payload parsed as JSON but failed schema validation.
    Invalid {
        /// What the validator objected to.
        reason: String,
    },
    /// The fetch failed after exhausting retries.
    Failed {
        /// The last error observed.
        error: String,
    },
}
