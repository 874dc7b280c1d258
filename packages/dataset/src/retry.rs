//! Retry policy and HTTP status classification for chunk fetches.
//!
//! Retry is asymmetric on purpose: only transient server/network
//! failures can succeed on a second attempt. Auth rejections and missing
//! chunks are deterministic — retrying them wastes the concurrency
//! budget and adds latency with zero chance of a different answer.

use std::time::Duration;

/// Default extra attempts after the first failure.
pub const DEFAULT_MAX_RETRIES: u32 = 1;
/// Default fixed delay between attempts.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(200);

/// Bounded fixed-backoff retry configuration for one chunk fetch.
///
/// The backoff is a fixed delay rather than exponential; it is kept
/// configurable so callers with flakier upstreams can widen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub max_retries: u32,
    /// Delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// What an HTTP status means for the fetch attempt loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx: parse the body and finish.
    Success,
    /// 401/403: authentication rejected; never retried.
    AuthDenied,
    /// 404: the chunk does not exist; never retried.
    NotFound,
    /// 408/429/5xx: worth another attempt while budget remains.
    Transient,
    /// Any other status: deterministic client failure; never retried.
    Permanent,
}

/// Classifies an HTTP status code for the retry loop.
#[must_use]
pub const fn classify(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        401 | 403 => StatusClass::AuthDenied,
        404 => StatusClass::NotFound,
        408 | 429 | 500..=599 => StatusClass::Transient,
        _ => StatusClass::Permanent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_statuses() {
        assert_eq!(classify(200), StatusClass::Success);
        assert_eq!(classify(204), StatusClass::Success);
    }

    #[test]
    fn auth_statuses_are_never_retried() {
        assert_eq!(classify(401), StatusClass::AuthDenied);
        assert_eq!(classify(403), StatusClass::AuthDenied);
    }

    #[test]
    fn not_found_is_its_own_class() {
        assert_eq!(classify(404), StatusClass::NotFound);
    }

    #[test]
    fn server_errors_and_throttling_are_transient() {
        assert_eq!(classify(500), StatusClass::Transient);
        assert_eq!(classify(503), StatusClass::Transient);
        assert_eq!(classify(429), StatusClass::Transient);
        assert_eq!(classify(408), StatusClass::Transient);
    }

    #[test]
    fn other_client_errors_are_permanent() {
        assert_eq!(classify(400), StatusClass::Permanent);
        assert_eq!(classify(410), StatusClass::Permanent);
    }

    #[test]
    fn default_policy_matches_documented_budget() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.backoff, Duration::from_millis(200));
    }
}
