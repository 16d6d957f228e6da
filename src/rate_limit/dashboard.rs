//! Usage Snapshots
//!
//! Read-only view of the counters for one (caller, resource) pair, served
//! by the status endpoint and the `status` CLI command.

use serde::{Deserialize, Serialize};

use super::quota::UNLIMITED;

/// Counters for one (caller, resource) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Timestamp of data generation
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Caller, `anon` when unidentified
    pub caller: String,

    /// Metered resource
    pub resource: String,

    /// Requests counted in the current rate window
    pub window_count: i64,

    /// Maximum admissions per window
    pub window_limit: i64,

    /// Daily limit the snapshot was computed against
    pub daily_limit: i64,

    /// Usages left today, -1 when unlimited
    pub remaining_quota: i64,
}

impl UsageSnapshot {
    /// Whether no daily quota applies
    pub fn is_unlimited(&self) -> bool {
        self.remaining_quota == UNLIMITED
    }

    /// Share of the daily quota used, in percent
    pub fn quota_utilization_percent(&self) -> Option<f64> {
        if self.is_unlimited() || self.daily_limit <= 0 {
            return None;
        }
        let used = (self.daily_limit - self.remaining_quota) as f64;
        Some(used / self.daily_limit as f64 * 100.0)
    }

    /// Whether the current window is full
    pub fn window_exhausted(&self) -> bool {
        self.window_count >= self.window_limit
    }
}
