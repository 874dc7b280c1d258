//! TTL + LRU chunk cache with composite tenant-scoped keys.
//!
//! Two clocks in tension, deliberately:
//!
//! - **Expiry** is measured from *creation* time (absolute TTL). A stale
//!   chunk that happens to be requested every minute still expires, so
//!   frequently-viewed dashboards cannot pin outdated data forever.
//! - **Eviction** at capacity removes the entry with the oldest *access*
//!   time (true LRU), which is the entry least likely to be asked for
//!   again.
//!
//! The cache is an explicitly constructed object, shared by `Arc` where
//! process-wide sharing is wanted; there is no hidden module-level state.
//! The map sits behind a `Mutex` because loaders run on a multi-threaded
//! runtime. The clock is injectable so tests control time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::DatasetError;
use crate::loader::DatasetScope;

/// Default capacity: one calendar year of weekly chunks.
pub const DEFAULT_CAPACITY: usize = 52;
/// Default absolute TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Branch component used when the scope does not pin one.
const DEFAULT_BRANCH: &str = "any";
/// API version component used when the scope does not pin one.
const DEFAULT_API_VERSION: &str = "7.1";

/// Time source for cache expiry. Injectable for deterministic tests.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// The real clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A composite cache key scoping a chunk to its tenant.
///
/// Built from required `{organization, project, repository}` scope fields
/// plus the chunk identifier (week or year), with fixed defaults for the
/// optional branch and API version components. Construction fails rather
/// than degrading when a required field is empty — a partial key would
/// collide across tenants and branches, which is worse than no cache at
/// all.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds a key for one chunk under a tenant scope.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::CacheKey`] when the chunk identifier or
    /// any required scope field is empty.
    pub fn build(scope: &DatasetScope, chunk: &str) -> Result<Self, DatasetError> {
        let required = [
            ("chunk", chunk),
            ("organization", scope.organization.as_str()),
            ("project", scope.project.as_str()),
            ("repository", scope.repository.as_str()),
        ];
        for (name, value) in required {
            if value.is_empty() {
                return Err(DatasetError::CacheKey {
                    message: format!("required field {name} is missing or empty"),
                });
            }
        }

        let branch = scope.branch.as_deref().unwrap_or(DEFAULT_BRANCH);
        let api_version = scope.api_version.as_deref().unwrap_or(DEFAULT_API_VERSION);

        Ok(Self(format!(
            "{}|{}|{}|{branch}|{api_version}|{chunk}",
            scope.organization, scope.project, scope.repository
        )))
    }

    /// The key as its composite string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct Entry<T> {
    value: T,
    created_at: Instant,
    touched_at: Instant,
}

/// A keyed cache with absolute TTL and LRU capacity eviction.
pub struct ChunkCache<T> {
    entries: Mutex<HashMap<CacheKey, Entry<T>>>,
    capacity: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> ChunkCache<T> {
    /// Creates a cache with [`DEFAULT_CAPACITY`], [`DEFAULT_TTL`], and
    /// the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_CAPACITY, DEFAULT_TTL, Arc::new(SystemClock))
    }

    /// Creates a cache with explicit capacity, TTL, and clock.
    #[must_use]
    pub fn with_config(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
            ttl,
            clock,
        }
    }

    /// Returns the cached value for `key` if present and unexpired,
    /// refreshing its access time. Expired entries are evicted on read.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<T> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        match entries.get_mut(key) {
            Some(entry) if now.duration_since(entry.created_at) <= self.ttl => {
                entry.touched_at = now;
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Inserts (or replaces) a value. When the cache is at capacity and
    /// `key` is new, the single least-recently-accessed entry is evicted
    /// first.
    pub fn set(&self, key: CacheKey, value: T) {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let stalest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.touched_at)
                .map(|(k, _)| k.clone());
            if let Some(stalest) = stalest {
                entries.remove(&stalest);
            }
        }

        entries.insert(
            key,
            Entry {
                value,
                created_at: now,
                touched_at: now,
            },
        );
    }

    /// TTL-aware presence check: `true` only for unexpired entries.
    #[must_use]
    pub fn has(&self, key: &CacheKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries currently held, including any not yet evicted
    /// by a TTL-expiring read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> Default for ChunkCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestClock;

    fn scope() -> DatasetScope {
        DatasetScope {
            organization: "acme".to_owned(),
            project: "platform".to_owned(),
            repository: "backend".to_owned(),
            branch: None,
            api_version: None,
        }
    }

    fn key(chunk: &str) -> CacheKey {
        CacheKey::build(&scope(), chunk).unwrap()
    }

    #[test]
    fn key_concatenates_scope_and_chunk_with_defaults() {
        assert_eq!(
            key("2026-W01").as_str(),
            "acme|platform|backend|any|7.1|2026-W01"
        );
    }

    #[test]
    fn key_uses_pinned_branch_and_api_version() {
        let scope = DatasetScope {
            branch: Some("release/1.4".to_owned()),
            api_version: Some("7.2".to_owned()),
            ..scope()
        };
        let key = CacheKey::build(&scope, "2026-W01").unwrap();
        assert_eq!(key.as_str(), "acme|platform|backend|release/1.4|7.2|2026-W01");
    }

    #[test]
    fn key_fails_on_missing_required_field() {
        let mut bad = scope();
        bad.project = String::new();
        let err = CacheKey::build(&bad, "2026-W01").unwrap_err();
        assert!(matches!(err, crate::DatasetError::CacheKey { .. }));

        let err = CacheKey::build(&scope(), "").unwrap_err();
        assert!(matches!(err, crate::DatasetError::CacheKey { .. }));
    }

    #[test]
    fn set_then_get_round_trips() {
        let cache: ChunkCache<u32> = ChunkCache::new();
        cache.set(key("2026-W01"), 7);
        assert_eq!(cache.get(&key("2026-W01")), Some(7));
        assert!(cache.has(&key("2026-W01")));
        assert!(!cache.has(&key("2026-W02")));
    }

    #[test]
    fn entries_expire_on_absolute_ttl() {
        let clock = Arc::new(TestClock::new());
        let cache: ChunkCache<u32> =
            ChunkCache::with_config(4, Duration::from_millis(300_000), clock.clone());

        cache.set(key("2026-W01"), 7);
        clock.advance(Duration::from_millis(300_001));

        assert_eq!(cache.get(&key("2026-W01")), None);
        // The expiring read also evicted the entry.
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn frequent_access_does_not_extend_the_ttl() {
        let clock = Arc::new(TestClock::new());
        let cache: ChunkCache<u32> =
            ChunkCache::with_config(4, Duration::from_millis(1000), clock.clone());

        cache.set(key("2026-W01"), 7);
        clock.advance(Duration::from_millis(600));
        assert_eq!(cache.get(&key("2026-W01")), Some(7));
        clock.advance(Duration::from_millis(600));
        // 1200ms since creation: expired even though touched at 600ms.
        assert_eq!(cache.get(&key("2026-W01")), None);
    }

    #[test]
    fn capacity_eviction_removes_least_recently_accessed() {
        let clock = Arc::new(TestClock::new());
        let cache: ChunkCache<u32> =
            ChunkCache::with_config(3, Duration::from_secs(3600), clock.clone());

        cache.set(key("2026-W01"), 1);
        clock.advance(Duration::from_millis(10));
        cache.set(key("2026-W02"), 2);
        clock.advance(Duration::from_millis(10));
        cache.set(key("2026-W03"), 3);
        clock.advance(Duration::from_millis(10));

        // Touch W01 so W02 becomes the least recently accessed.
        assert_eq!(cache.get(&key("2026-W01")), Some(1));
        clock.advance(Duration::from_millis(10));

        cache.set(key("2026-W04"), 4);

        assert_eq!(cache.get(&key("2026-W02")), None);
        assert_eq!(cache.get(&key("2026-W01")), Some(1));
        assert_eq!(cache.get(&key("2026-W03")), Some(3));
        assert_eq!(cache.get(&key("2026-W04")), Some(4));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn overwriting_an_existing_key_does_not_evict() {
        let cache: ChunkCache<u32> =
            ChunkCache::with_config(2, Duration::from_secs(3600), Arc::new(SystemClock));
        cache.set(key("2026-W01"), 1);
        cache.set(key("2026-W02"), 2);
        cache.set(key("2026-W01"), 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key("2026-W01")), Some(10));
        assert_eq!(cache.get(&key("2026-W02")), Some(2));
    }

    #[test]
    fn different_scopes_never_collide() {
        let cache: ChunkCache<u32> = ChunkCache::new();
        cache.set(key("2026-W01"), 1);

        let other = DatasetScope {
            organization: "globex".to_owned(),
            ..scope()
        };
        let other_key = CacheKey::build(&other, "2026-W01").unwrap();
        assert_eq!(cache.get(&other_key), None);
    }
}
