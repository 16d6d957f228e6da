//! Daily Quota Tracker
//!
//! Cumulative usage per (caller, resource) for the current calendar day.
//! Checking is read-only and recording is a separate call, so callers can
//! check, perform the metered work, and record only on success. Concurrent
//! callers that all pass the check before any records can overshoot the
//! limit; the quota is approximate.

use std::sync::Arc;
use std::time::Duration;

use super::clock::{Clock, SystemClock};
use super::config::{FailurePolicy, RateLimitConfig};
use super::error::{parse_counter, StoreError};
use super::key::CounterKey;
use super::store::CounterStore;
use crate::metrics;

/// Sentinel returned by [`QuotaTracker::remaining_quota`] for unlimited quotas
pub const UNLIMITED: i64 = -1;

/// Calendar-day usage gate
#[derive(Debug, Clone)]
pub struct QuotaTracker {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    policy: FailurePolicy,
    atomic_expiry: bool,
}

impl QuotaTracker {
    /// Create a tracker using the system clock
    pub fn new(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock::new()), config)
    }

    /// Create a tracker whose calendar date comes from `clock`
    pub fn with_clock(
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        config: &RateLimitConfig,
    ) -> Self {
        Self {
            store,
            clock,
            ttl: config.quota_ttl(),
            policy: config.failure_policy,
            atomic_expiry: config.atomic_expiry,
        }
    }

    fn key(&self, caller: Option<&str>, resource: &str) -> String {
        CounterKey::quota(caller, resource, self.clock.today()).to_string()
    }

    /// Today's recorded usage
    pub async fn used_today(&self, caller: Option<&str>, resource: &str) -> Result<i64, StoreError> {
        let key = self.key(caller, resource);
        let raw = self.store.get(&key).await?;
        parse_counter(&key, raw)
    }

    /// Whether another usage fits under `daily_limit`.
    ///
    /// `daily_limit <= 0` disables the check. Store failures are answered by
    /// the failure policy.
    pub async fn check_quota(&self, caller: Option<&str>, resource: &str, daily_limit: i64) -> bool {
        self.try_check_quota(caller, resource, daily_limit)
            .await
            .unwrap_or_else(|| self.policy.admits())
    }

    /// Like [`check_quota`](Self::check_quota), but `None` when the store failed
    pub(crate) async fn try_check_quota(
        &self,
        caller: Option<&str>,
        resource: &str,
        daily_limit: i64,
    ) -> Option<bool> {
        if daily_limit <= 0 {
            return Some(true);
        }

        match self.used_today(caller, resource).await {
            Ok(used) if used >= daily_limit => {
                tracing::warn!(
                    caller = ?caller,
                    resource = %resource,
                    used,
                    limit = daily_limit,
                    "Daily quota exhausted"
                );
                Some(false)
            }
            Ok(_) => Some(true),
            Err(e) => {
                metrics::record_store_error("quota_get", e.kind());
                tracing::warn!(
                    caller = ?caller,
                    resource = %resource,
                    backend = self.store.backend(),
                    error = %e,
                    policy = ?self.policy,
                    "Quota check failed, applying failure policy"
                );
                None
            }
        }
    }

    /// Count one usage for today. Best-effort: failures are logged only.
    pub async fn record_usage(&self, caller: Option<&str>, resource: &str) {
        let key = self.key(caller, resource);

        let result = if self.atomic_expiry {
            self.store.increment_with_expiry(&key, self.ttl).await
        } else {
            self.two_step_increment(&key).await
        };

        match result {
            Ok(count) => {
                metrics::USAGE_RECORDED_TOTAL.inc();
                tracing::debug!(key = %key, count, "Recorded usage");
            }
            Err(e) => {
                metrics::record_store_error("quota_increment", e.kind());
                tracing::error!(
                    caller = ?caller,
                    resource = %resource,
                    backend = self.store.backend(),
                    error = %e,
                    "Failed to record quota usage"
                );
            }
        }
    }

    async fn two_step_increment(&self, key: &str) -> Result<i64, StoreError> {
        let count = self.store.increment(key).await?;
        if count == 1 {
            self.store.set_expire(key, self.ttl).await?;
        }
        Ok(count)
    }

    /// Usages left today.
    ///
    /// Returns [`UNLIMITED`] when `daily_limit <= 0`. On store failure returns
    /// `daily_limit` under fail-open and 0 under fail-closed.
    pub async fn remaining_quota(&self, caller: Option<&str>, resource: &str, daily_limit: i64) -> i64 {
        if daily_limit <= 0 {
            return UNLIMITED;
        }

        match self.used_today(caller, resource).await {
            // A negative counter was not written by this service; count it as unused
            Ok(used) => daily_limit.saturating_sub(used.max(0)).max(0),
            Err(e) => {
                metrics::record_store_error("quota_get", e.kind());
                tracing::debug!(resource = %resource, error = %e, "Failed to read quota counter");
                match self.policy {
                    FailurePolicy::FailOpen => daily_limit,
                    FailurePolicy::FailClosed => 0,
                }
            }
        }
    }
}
