//! QuotaGuard Library
//!
//! Rate limiting and daily quota accounting for cost-metered model
//! invocations, backed by a shared TTL counter store.

pub mod config;
pub mod metrics;
pub mod rate_limit;
pub mod server;
