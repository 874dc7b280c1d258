#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Chunked dataset loader for PR insights dashboards.
//!
//! The extraction pipeline publishes a versioned dataset as many small
//! JSON artifacts: a manifest, one rollup chunk per ISO week, one
//! distribution chunk per year, and optional feature-gated payloads. This
//! crate turns that layout into coherent in-memory views under date-range
//! queries via [`loader::DatasetLoader`], while bounding network
//! concurrency ([`gate::ConcurrencyGate`]), retrying transient failures
//! ([`retry::RetryPolicy`]), caching chunks with a TTL
//! ([`cache::ChunkCache`]), and reporting partial results instead of
//! failing a whole range over one bad week.

pub mod cache;
pub mod fetcher;
pub mod gate;
pub mod loader;
pub mod normalize;
pub mod progress;
pub mod retry;
pub mod transport;
pub mod version;
pub mod week;

/// Errors that can occur during dataset loading.
///
/// Only *fatal* conditions surface here. Per-chunk failures (a missing
/// week, an exhausted retry budget) are recovered into
/// [`FetchOutcome`](pr_insights_dataset_models::FetchOutcome) values and
/// reported through the range query result's degradation flags.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    /// HTTP request failed at the transport level.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stub or non-HTTP transport failed.
    #[error("transport error: {message}")]
    Transport {
        /// Description of what went wrong.
        message: String,
    },

    /// The dataset was produced by a newer schema than this loader
    /// supports. Raised before any chunk is fetched.
    #[error("unsupported {field}: found {found}, loader supports up to {max}")]
    UnsupportedVersion {
        /// Which manifest version field was too new (or absent).
        field: &'static str,
        /// The version the manifest declared.
        found: u32,
        /// The newest version this loader understands.
        max: u32,
    },

    /// No candidate dataset root contained a manifest file.
    #[error("no dataset manifest found; probed roots: {tried:?}")]
    ManifestNotFound {
        /// The candidate base paths that were probed, in order.
        tried: Vec<String>,
    },

    /// A range query was issued before `load_manifest` succeeded. This is
    /// a caller sequencing bug, not a data problem.
    #[error("manifest not loaded; call load_manifest before querying")]
    ManifestNotLoaded,

    /// Every requested chunk was rejected for authentication and nothing
    /// usable was cached. A *partial* auth failure is folded into the
    /// degraded-result flags instead.
    #[error("authentication required: no dataset chunk could be fetched")]
    AuthRequired,

    /// A composite cache key could not be built because a required scope
    /// field is missing. Deliberately fatal — a partial key risks cache
    /// collisions across tenants and branches.
    #[error("invalid cache key: {message}")]
    CacheKey {
        /// Which required field was missing or empty.
        message: String,
    },
}

pub use crate::loader::{DatasetLoader, DatasetScope, LoaderConfig};

#[cfg(test)]
pub(crate) mod testing;
