//! Rate Limiting and Quota Module
//!
//! Gates calls to cost-metered resources per (caller, resource) pair with a
//! fixed-window request rate and a calendar-day usage quota, both kept as
//! TTL counters in a shared store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Access Gate                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────┐    ┌──────────────────────┐       │
//! │  │  Quota Tracker       │    │  Rate Limiter        │       │
//! │  │  (daily, read-check) │    │  (fixed window)      │       │
//! │  └──────────────────────┘    └──────────────────────┘       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │      Counter Store (Redis / In-Memory)               │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Store failures never escape the gate; they are resolved by the
//! configured [`FailurePolicy`].

pub mod clock;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod gate;
pub mod key;
pub mod limiter;
pub mod quota;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod store;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::{FailurePolicy, RateLimitConfig};
pub use dashboard::UsageSnapshot;
pub use error::StoreError;
pub use gate::{AccessGate, DenyReason, GateDecision};
pub use key::CounterKey;
pub use limiter::RateLimiter;
pub use quota::{QuotaTracker, UNLIMITED};
#[cfg(feature = "redis")]
pub use redis_store::RedisCounterStore;
pub use store::{CounterStore, InMemoryCounterStore};
