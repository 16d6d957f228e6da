//! Rate Limit Configuration
//!
//! Configuration for the rate window, the daily quota TTL and the policy
//! applied when the counter store fails.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default rate limits
pub const DEFAULT_RATE_LIMIT_PER_WINDOW: u32 = 10; // admissions per window
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 1;
pub const DEFAULT_DAILY_QUOTA_TTL_SECS: u64 = 25 * 3600; // longer than a day to tolerate skew

/// What a gating call answers when the counter store fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Admit and assume nothing was used
    #[default]
    FailOpen,
    /// Reject and assume the quota is exhausted
    FailClosed,
}

impl FailurePolicy {
    /// Admission answer on store failure
    pub fn admits(&self) -> bool {
        matches!(self, FailurePolicy::FailOpen)
    }
}

/// Rate limit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable gating; when disabled every call is admitted without store traffic
    pub enabled: bool,

    /// Maximum admissions per window
    pub rate_limit_per_window: u32,

    /// Window length in seconds
    pub rate_window_secs: u64,

    /// TTL applied to daily quota counters
    pub daily_quota_ttl_secs: u64,

    /// Behavior when the counter store fails
    pub failure_policy: FailurePolicy,

    /// Use the store's single-call increment+expire primitive
    pub atomic_expiry: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit_per_window: DEFAULT_RATE_LIMIT_PER_WINDOW,
            rate_window_secs: DEFAULT_RATE_WINDOW_SECS,
            daily_quota_ttl_secs: DEFAULT_DAILY_QUOTA_TTL_SECS,
            failure_policy: FailurePolicy::FailOpen,
            atomic_expiry: false,
        }
    }
}

impl RateLimitConfig {
    /// Create a new rate limit configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().apply_env_overrides()
    }

    /// Override fields from `QUOTAGUARD_*` environment variables.
    ///
    /// Unparseable values are ignored.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("QUOTAGUARD_RATE_LIMIT_ENABLED") {
            self.enabled = val.parse().unwrap_or(self.enabled);
        }

        if let Ok(val) = std::env::var("QUOTAGUARD_RATE_LIMIT_PER_WINDOW") {
            if let Ok(limit) = val.parse() {
                self.rate_limit_per_window = limit;
            }
        }

        if let Ok(val) = std::env::var("QUOTAGUARD_RATE_WINDOW_SECS") {
            if let Ok(secs) = val.parse() {
                self.rate_window_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("QUOTAGUARD_DAILY_QUOTA_TTL_SECS") {
            if let Ok(secs) = val.parse() {
                self.daily_quota_ttl_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("QUOTAGUARD_FAILURE_POLICY") {
            match val.to_lowercase().as_str() {
                "fail_open" | "open" => self.failure_policy = FailurePolicy::FailOpen,
                "fail_closed" | "closed" => self.failure_policy = FailurePolicy::FailClosed,
                _ => {}
            }
        }

        if let Ok(val) = std::env::var("QUOTAGUARD_ATOMIC_EXPIRY") {
            self.atomic_expiry = val.parse().unwrap_or(self.atomic_expiry);
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error for a zero window, a zero limit, or a quota TTL that
    /// could expire a counter before its day is over.
    pub fn validate(&self) -> Result<()> {
        if self.rate_window_secs == 0 {
            anyhow::bail!("Rate window must be > 0 seconds");
        }
        if self.rate_limit_per_window == 0 {
            anyhow::bail!("Rate limit per window must be > 0");
        }
        if self.daily_quota_ttl_secs < 24 * 3600 {
            anyhow::bail!(
                "Daily quota TTL must be at least 86400 seconds, got {}",
                self.daily_quota_ttl_secs
            );
        }
        Ok(())
    }

    /// Get window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    /// Get quota counter TTL
    pub fn quota_ttl(&self) -> Duration {
        Duration::from_secs(self.daily_quota_ttl_secs)
    }

    /// Disable gating (for testing)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
