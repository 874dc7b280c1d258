//! Progress reporting trait for range queries.
//!
//! Decouples the loader from any rendering backend: a CLI can attach a
//! progress bar, a dashboard host can forward updates to its UI, and
//! tests stay silent with [`NullProgress`].

use std::sync::Arc;

/// Receives progress updates from a running range query.
///
/// Implementations must be `Send + Sync`; the loader calls them from
/// concurrently completing fetch futures.
pub trait ProgressCallback: Send + Sync {
    /// Total number of chunks the query will account for.
    fn set_total(&self, total: u64);

    /// One more chunk accounted for (cache hit, fetched, or classified
    /// missing/failed).
    fn inc(&self, delta: u64);

    /// Human-readable status line (e.g., which chunk is in flight).
    fn set_message(&self, msg: String);

    /// The query finished; `msg` summarizes the outcome.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
