//! Access Gate
//!
//! Single entry point consulted before a metered call (`try_acquire`) and
//! after it succeeds (`record_usage`). Quota is checked first so an
//! exhausted caller does not consume rate window slots.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::clock::{Clock, SystemClock};
use super::config::{FailurePolicy, RateLimitConfig};
use super::dashboard::UsageSnapshot;
use super::key::caller_or_anon;
use super::limiter::RateLimiter;
use super::quota::QuotaTracker;
use super::store::CounterStore;
use crate::metrics;

/// Why a request was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Daily quota used up
    QuotaExhausted,
    /// Too many requests in the current window
    RateLimited,
    /// Store failed under the fail-closed policy
    StoreFailure,
}

impl DenyReason {
    fn as_str(&self) -> &'static str {
        match self {
            DenyReason::QuotaExhausted => "quota_exhausted",
            DenyReason::RateLimited => "rate_limited",
            DenyReason::StoreFailure => "store_failure",
        }
    }
}

/// Result of a gate check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    /// Whether the request may proceed
    pub allowed: bool,

    /// Reason for denial (if not allowed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenyReason>,

    /// Whether a store failure was absorbed while deciding
    #[serde(default)]
    pub degraded: bool,
}

impl GateDecision {
    /// Create an allowed decision
    pub fn allowed(degraded: bool) -> Self {
        Self {
            allowed: true,
            reason: None,
            degraded,
        }
    }

    /// Create a denied decision
    pub fn denied(reason: DenyReason, degraded: bool) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            degraded,
        }
    }
}

/// Rate limit and quota gate for metered resources
#[derive(Debug, Clone)]
pub struct AccessGate {
    enabled: bool,
    policy: FailurePolicy,
    limiter: RateLimiter,
    quota: QuotaTracker,
}

impl AccessGate {
    /// Create a gate over `store` using the system clock
    pub fn new(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock::new()), config)
    }

    /// Create a gate whose quota dates come from `clock`
    pub fn with_clock(
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        config: &RateLimitConfig,
    ) -> Self {
        Self {
            enabled: config.enabled,
            policy: config.failure_policy,
            limiter: RateLimiter::new(Arc::clone(&store), config),
            quota: QuotaTracker::with_clock(store, clock, config),
        }
    }

    /// Rate limiter used by this gate
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Quota tracker used by this gate
    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    /// Decide whether `caller` may invoke `resource` now
    pub async fn check(&self, caller: Option<&str>, resource: &str, daily_limit: i64) -> GateDecision {
        if !self.enabled {
            metrics::record_decision("disabled");
            return GateDecision::allowed(false);
        }

        let mut degraded = false;

        match self.quota.try_check_quota(caller, resource, daily_limit).await {
            Some(true) => {}
            Some(false) => return self.deny(DenyReason::QuotaExhausted, false),
            None if self.policy.admits() => degraded = true,
            None => return self.deny(DenyReason::StoreFailure, true),
        }

        match self.limiter.try_admit(caller, resource).await {
            Some(true) => {}
            Some(false) => return self.deny(DenyReason::RateLimited, degraded),
            None if self.policy.admits() => degraded = true,
            None => return self.deny(DenyReason::StoreFailure, true),
        }

        metrics::record_decision("admitted");
        GateDecision::allowed(degraded)
    }

    fn deny(&self, reason: DenyReason, degraded: bool) -> GateDecision {
        metrics::record_decision(reason.as_str());
        GateDecision::denied(reason, degraded)
    }

    /// Whether `caller` may invoke `resource` now.
    ///
    /// `daily_limit <= 0` means no daily quota.
    pub async fn try_acquire(&self, caller: Option<&str>, resource: &str, daily_limit: i64) -> bool {
        self.check(caller, resource, daily_limit).await.allowed
    }

    /// Count a successful invocation against today's quota.
    ///
    /// Call only after the metered call succeeded.
    pub async fn record_usage(&self, caller: Option<&str>, resource: &str) {
        if !self.enabled {
            return;
        }
        self.quota.record_usage(caller, resource).await;
    }

    /// Usages left today, -1 when unlimited
    pub async fn remaining_quota(&self, caller: Option<&str>, resource: &str, daily_limit: i64) -> i64 {
        self.quota.remaining_quota(caller, resource, daily_limit).await
    }

    /// Requests counted in the current rate window
    pub async fn current_window_count(&self, caller: Option<&str>, resource: &str) -> i64 {
        self.limiter.current_count(caller, resource).await
    }

    /// Current counters for one (caller, resource) pair
    pub async fn snapshot(&self, caller: Option<&str>, resource: &str, daily_limit: i64) -> UsageSnapshot {
        UsageSnapshot {
            timestamp: chrono::Utc::now(),
            caller: caller_or_anon(caller).to_string(),
            resource: resource.to_string(),
            window_count: self.current_window_count(caller, resource).await,
            window_limit: self.limiter.limit(),
            daily_limit,
            remaining_quota: self.remaining_quota(caller, resource, daily_limit).await,
        }
    }
}
