//! Fixed-Window Rate Limiter
//!
//! Counts requests per (caller, resource) in a window that starts at the
//! first increment and lasts `rate_window_secs`. The store's TTL ends the
//! window; the next increment opens a new one at 1.

use std::sync::Arc;
use std::time::Duration;

use super::config::{FailurePolicy, RateLimitConfig};
use super::error::parse_counter;
use super::key::CounterKey;
use super::store::CounterStore;
use crate::metrics;

/// Per-window request-rate gate
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    limit: i64,
    window: Duration,
    policy: FailurePolicy,
    atomic_expiry: bool,
}

impl RateLimiter {
    /// Create a rate limiter over `store`
    pub fn new(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        Self {
            store,
            limit: i64::from(config.rate_limit_per_window),
            window: config.window_duration(),
            policy: config.failure_policy,
            atomic_expiry: config.atomic_expiry,
        }
    }

    /// Maximum admissions per window
    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Record an attempt and decide whether it fits in the current window.
    ///
    /// The attempt is counted even when rejected. Store failures are logged
    /// and answered by the failure policy.
    pub async fn admit(&self, caller: Option<&str>, resource: &str) -> bool {
        self.try_admit(caller, resource).await.unwrap_or_else(|| self.policy.admits())
    }

    /// Like [`admit`](Self::admit), but `None` when the store failed
    pub(crate) async fn try_admit(&self, caller: Option<&str>, resource: &str) -> Option<bool> {
        let key = CounterKey::rate(caller, resource).to_string();

        let result = if self.atomic_expiry {
            self.store.increment_with_expiry(&key, self.window).await
        } else {
            self.two_step_increment(&key).await
        };

        match result {
            Ok(count) => {
                if count > self.limit {
                    tracing::warn!(
                        caller = ?caller,
                        resource = %resource,
                        current = count,
                        limit = self.limit,
                        "Rate limit exceeded"
                    );
                    Some(false)
                } else {
                    Some(true)
                }
            }
            Err(e) => {
                metrics::record_store_error("rate_increment", e.kind());
                tracing::warn!(
                    caller = ?caller,
                    resource = %resource,
                    backend = self.store.backend(),
                    error = %e,
                    policy = ?self.policy,
                    "Rate limit check failed, applying failure policy"
                );
                None
            }
        }
    }

    // The TTL is only set by the increment that created the counter. A failure
    // between the two calls leaves a counter without TTL.
    async fn two_step_increment(&self, key: &str) -> Result<i64, super::error::StoreError> {
        let count = self.store.increment(key).await?;
        if count == 1 {
            self.store.set_expire(key, self.window).await?;
        }
        Ok(count)
    }

    /// Requests counted in the current window, 0 if absent or unreadable
    pub async fn current_count(&self, caller: Option<&str>, resource: &str) -> i64 {
        let key = CounterKey::rate(caller, resource).to_string();
        match self.store.get(&key).await.and_then(|raw| parse_counter(&key, raw)) {
            Ok(count) => count,
            Err(e) => {
                metrics::record_store_error("rate_get", e.kind());
                tracing::debug!(key = %key, error = %e, "Failed to read rate counter");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::clock::MockClock;
    use crate::rate_limit::error::StoreError;
    use crate::rate_limit::store::InMemoryCounterStore;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct DownStore;

    #[async_trait]
    impl CounterStore for DownStore {
        async fn increment(&self, _key: &str) -> Result<i64, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn set_expire(&self, _key: &str, _ttl: Duration) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        fn backend(&self) -> &'static str {
            "down"
        }
    }

    fn limiter(limit: u32, atomic: bool) -> (RateLimiter, InMemoryCounterStore, MockClock) {
        let clock = MockClock::starting_now();
        let store = InMemoryCounterStore::with_clock(Arc::new(clock.clone()));
        let config = RateLimitConfig {
            rate_limit_per_window: limit,
            atomic_expiry: atomic,
            ..RateLimitConfig::default()
        };
        (RateLimiter::new(Arc::new(store.clone()), &config), store, clock)
    }

    #[tokio::test]
    async fn test_admit_within_limit() {
        let (limiter, _, _) = limiter(10, false);
        for _ in 0..10 {
            assert!(limiter.admit(Some("1"), "deepseek").await);
        }
        assert!(!limiter.admit(Some("1"), "deepseek").await);
    }

    #[tokio::test]
    async fn test_window_scenario() {
        // limit 2, window 1s: t=0.0, 0.1, 0.2 -> true, true, false; t=1.1 -> true
        let (limiter, _, clock) = limiter(2, false);
        assert!(limiter.admit(Some("u1"), "gpt-x").await);
        clock.advance(Duration::from_millis(100));
        assert!(limiter.admit(Some("u1"), "gpt-x").await);
        clock.advance(Duration::from_millis(100));
        assert!(!limiter.admit(Some("u1"), "gpt-x").await);
        clock.advance(Duration::from_millis(900));
        assert!(limiter.admit(Some("u1"), "gpt-x").await);
        assert_eq!(limiter.current_count(Some("u1"), "gpt-x").await, 1);
    }

    #[tokio::test]
    async fn test_rejected_attempts_still_count() {
        let (limiter, _, _) = limiter(1, false);
        assert!(limiter.admit(None, "r").await);
        assert!(!limiter.admit(None, "r").await);
        assert!(!limiter.admit(None, "r").await);
        assert_eq!(limiter.current_count(None, "r").await, 3);
    }

    #[tokio::test]
    async fn test_ttl_set_only_by_first_increment() {
        let (limiter, store, clock) = limiter(10, false);
        limiter.admit(Some("u1"), "gpt-x").await;
        clock.advance(Duration::from_millis(600));
        limiter.admit(Some("u1"), "gpt-x").await;

        let ttl = store.ttl("model:rate:u1:gpt-x").await.unwrap();
        assert_eq!(ttl, Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_atomic_expiry_same_semantics() {
        let (limiter, store, clock) = limiter(2, true);
        assert!(limiter.admit(Some("u1"), "gpt-x").await);
        assert!(limiter.admit(Some("u1"), "gpt-x").await);
        assert!(!limiter.admit(Some("u1"), "gpt-x").await);
        assert!(store.ttl("model:rate:u1:gpt-x").await.is_some());
        clock.advance(Duration::from_secs(1));
        assert!(limiter.admit(Some("u1"), "gpt-x").await);
    }

    #[tokio::test]
    async fn test_pairs_are_independent() {
        let (limiter, _, _) = limiter(1, false);
        assert!(limiter.admit(Some("a"), "m1").await);
        assert!(limiter.admit(Some("b"), "m1").await);
        assert!(limiter.admit(Some("a"), "m2").await);
        assert!(!limiter.admit(Some("a"), "m1").await);
    }

    #[tokio::test]
    async fn test_store_down_fails_open() {
        let limiter = RateLimiter::new(Arc::new(DownStore), &RateLimitConfig::default());
        for _ in 0..50 {
            assert!(limiter.admit(Some("u1"), "gpt-x").await);
        }
        assert_eq!(limiter.current_count(Some("u1"), "gpt-x").await, 0);
    }

    #[tokio::test]
    async fn test_store_down_fail_closed() {
        let config = RateLimitConfig {
            failure_policy: FailurePolicy::FailClosed,
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::new(Arc::new(DownStore), &config);
        assert!(!limiter.admit(Some("u1"), "gpt-x").await);
    }

    #[tokio::test]
    async fn test_current_count_absent() {
        let (limiter, _, _) = limiter(10, false);
        assert_eq!(limiter.current_count(Some("1"), "deepseek").await, 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_first_n_admitted_rest_rejected(limit in 1u32..20, calls in 1usize..40) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                rt.block_on(async {
                    let (limiter, _, _) = limiter(limit, false);
                    for i in 1..=calls {
                        let admitted = limiter.admit(Some("p"), "m").await;
                        prop_assert_eq!(admitted, i <= limit as usize);
                    }
                    Ok(())
                })?;
            }
        }
    }
}
