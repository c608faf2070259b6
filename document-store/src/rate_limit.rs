//! Sliding-window request throttling keyed by principal.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::Principal;

/// Admission control consulted before any provider call.
pub trait RateLimiter: Send + Sync {
    /// Record the request and return whether it is admitted.
    fn allow(&self, principal: &Principal) -> bool;

    /// Seconds a rejected caller should wait before retrying.
    fn retry_after_secs(&self) -> u64 {
        0
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum requests per principal within one window.
    pub max_requests: usize,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60,
        }
    }
}

/// Sliding-window limiter.
///
/// Keeps the timestamps of admitted requests per bucket. Anonymous callers
/// all share one bucket.
pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter from configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: Duration::from_secs(config.window_secs),
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// [`RateLimiter::allow`] with an explicit clock reading.
    ///
    /// Purge, count and record happen under one lock so concurrent callers
    /// of the same principal cannot all slip past the limit.
    pub fn allow_at(&self, principal: &Principal, now: Instant) -> bool {
        // Every mutation below completes before the guard drops, so the map
        // stays consistent even if another holder panicked.
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);

        requests.retain(|_, timestamps| {
            while timestamps
                .front()
                .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
            {
                timestamps.pop_front();
            }
            !timestamps.is_empty()
        });

        let bucket = principal.bucket();
        let in_window = requests.get(bucket).map_or(0, VecDeque::len);
        if in_window >= self.max_requests {
            warn!("Rate limit exceeded for {bucket}: {in_window} requests in window");
            return false;
        }

        requests.entry(bucket.to_string()).or_default().push_back(now);
        debug!("Admitted request {} for {bucket}", in_window + 1);
        true
    }

    /// Requests currently counted against the principal.
    pub fn in_window(&self, principal: &Principal) -> usize {
        let requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        requests.get(principal.bucket()).map_or(0, |timestamps| {
            timestamps
                .iter()
                .filter(|t| now.saturating_duration_since(**t) < self.window)
                .count()
        })
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn allow(&self, principal: &Principal) -> bool {
        self.allow_at(principal, Instant::now())
    }

    fn retry_after_secs(&self) -> u64 {
        self.window.as_secs()
    }
}

/// Admits everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn allow(&self, _principal: &Principal) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn alice() -> Principal {
        Principal::User("alice".to_string())
    }

    #[test]
    fn test_eleventh_request_is_rejected() {
        let limiter = SlidingWindowLimiter::default();
        let start = Instant::now();

        for i in 0..10 {
            assert!(limiter.allow_at(&alice(), start + Duration::from_secs(i)));
        }
        assert!(!limiter.allow_at(&alice(), start + Duration::from_secs(30)));
    }

    #[test]
    fn test_window_slides() {
        let limiter = SlidingWindowLimiter::default();
        let start = Instant::now();

        for _ in 0..10 {
            assert!(limiter.allow_at(&alice(), start));
        }
        assert!(!limiter.allow_at(&alice(), start + Duration::from_secs(59)));
        assert!(limiter.allow_at(&alice(), start + Duration::from_secs(60)));
    }

    #[test]
    fn test_rejected_requests_are_not_recorded() {
        let limiter = SlidingWindowLimiter::new(RateLimitConfig {
            max_requests: 1,
            window_secs: 10,
        });
        let start = Instant::now();

        assert!(limiter.allow_at(&alice(), start));
        assert!(!limiter.allow_at(&alice(), start + Duration::from_secs(9)));
        // Only the first request counts, so the window reopens at t=10.
        assert!(limiter.allow_at(&alice(), start + Duration::from_secs(10)));
    }

    #[test]
    fn test_principals_are_independent() {
        let limiter = SlidingWindowLimiter::new(RateLimitConfig {
            max_requests: 1,
            window_secs: 60,
        });
        let now = Instant::now();

        assert!(limiter.allow_at(&alice(), now));
        assert!(limiter.allow_at(&Principal::User("bob".to_string()), now));
        assert!(!limiter.allow_at(&alice(), now));
    }

    #[test]
    fn test_anonymous_callers_share_a_bucket() {
        let limiter = SlidingWindowLimiter::new(RateLimitConfig {
            max_requests: 2,
            window_secs: 60,
        });
        let now = Instant::now();

        assert!(limiter.allow_at(&Principal::Anonymous, now));
        assert!(limiter.allow_at(&Principal::from_user_id(None), now));
        assert!(!limiter.allow_at(&Principal::Anonymous, now));
        assert_eq!(limiter.in_window(&Principal::Anonymous), 2);
    }

    #[test]
    fn test_concurrent_callers_cannot_exceed_limit() {
        let limiter = Arc::new(SlidingWindowLimiter::default());

        let admitted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..64)
                .map(|_| {
                    let limiter = Arc::clone(&limiter);
                    scope.spawn(move || limiter.allow(&alice()))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| usize::from(handle.join().unwrap()))
                .sum()
        });

        assert_eq!(admitted, 10);
    }

    #[test]
    fn test_unlimited_always_allows() {
        let limiter = Unlimited;
        for _ in 0..100 {
            assert!(limiter.allow(&Principal::Anonymous));
        }
    }
}
