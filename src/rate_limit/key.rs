//! Counter Keys
//!
//! Serialized key layout shared with existing deployments:
//!
//! ```text
//! model:rate:<caller>:<resource>
//! model:quota:<caller>:<resource>:<YYYY-MM-DD>
//! ```
//!
//! `<caller>` is `anon` when the caller is not identified.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix for fixed-window rate counters
pub const RATE_KEY_PREFIX: &str = "model:rate:";

/// Prefix for daily quota counters
pub const QUOTA_KEY_PREFIX: &str = "model:quota:";

/// Caller placeholder for unidentified callers
pub const ANONYMOUS_CALLER: &str = "anon";

/// Which counter a key addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Current fixed rate window
    RateWindow,
    /// Usage for one calendar day
    DailyQuota(NaiveDate),
}

/// Identifies one logical counter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    /// Caller identifier, already resolved to the anonymous sentinel
    pub caller: String,

    /// Metered resource (e.g. a model code)
    pub resource: String,

    /// Counter scope
    pub scope: Scope,
}

impl CounterKey {
    /// Key for the rate window counter of a (caller, resource) pair
    pub fn rate(caller: Option<&str>, resource: &str) -> Self {
        Self {
            caller: caller_or_anon(caller).to_string(),
            resource: resource.to_string(),
            scope: Scope::RateWindow,
        }
    }

    /// Key for the quota counter of a (caller, resource) pair on `date`
    pub fn quota(caller: Option<&str>, resource: &str, date: NaiveDate) -> Self {
        Self {
            caller: caller_or_anon(caller).to_string(),
            resource: resource.to_string(),
            scope: Scope::DailyQuota(date),
        }
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Scope::RateWindow => write!(f, "{}{}:{}", RATE_KEY_PREFIX, self.caller, self.resource),
            Scope::DailyQuota(date) => write!(
                f,
                "{}{}:{}:{}",
                QUOTA_KEY_PREFIX,
                self.caller,
                self.resource,
                date.format("%Y-%m-%d")
            ),
        }
    }
}

/// Resolve an optional caller to its key segment
pub fn caller_or_anon(caller: Option<&str>) -> &str {
    caller.unwrap_or(ANONYMOUS_CALLER)
}
