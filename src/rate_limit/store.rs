//! Counter Store
//!
//! The narrow interface the limiter and tracker need from the shared
//! TTL-capable key-value store, plus an in-memory implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::clock::{Clock, SystemClock};
use super::error::StoreError;

/// Shared counter store port
///
/// Increments must be atomic at the store. Nothing else is assumed to be.
#[async_trait]
pub trait CounterStore: Send + Sync + Debug {
    /// Increment `key` and return the new value. Absent keys start at 1.
    async fn increment(&self, key: &str) -> Result<i64, StoreError>;

    /// Set or overwrite the TTL of an existing key. No-op if absent.
    async fn set_expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Read the raw value of `key`
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Increment `key` and give it `ttl` if this increment created it.
    ///
    /// The provided implementation issues two round-trips; a crash between
    /// them leaves a counter without TTL. Adapters with a scripted or
    /// locked primitive override this.
    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let value = self.increment(key).await?;
        if value == 1 {
            self.set_expire(key, ttl).await?;
        }
        Ok(value)
    }

    /// Backend name for logs
    fn backend(&self) -> &'static str;
}

#[derive(Debug, Clone)]
struct Entry {
    value: i64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Process-local counter store with lazy expiry
///
/// Suitable for tests and single-instance deployments. Expired entries are
/// treated as absent and dropped on the next write or by [`purge_expired`].
///
/// [`purge_expired`]: InMemoryCounterStore::purge_expired
#[derive(Debug, Clone)]
pub struct InMemoryCounterStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCounterStore {
    /// Create a store driven by the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create a store driven by `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Remaining TTL of a live key, if it has one
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Drop every expired entry, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn bump(entries: &mut HashMap<String, Entry>, key: &str, now: Instant) -> i64 {
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: 0,
            expires_at: None,
        });
        if !entry.is_live(now) {
            entry.value = 0;
            entry.expires_at = None;
        }
        entry.value += 1;
        entry.value
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        Ok(Self::bump(&mut entries, key, now))
    }

    async fn set_expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        match entries.get(key).map(|e| e.is_live(now)) {
            Some(true) => {
                if let Some(entry) = entries.get_mut(key) {
                    entry.expires_at = Some(now + ttl);
                }
            }
            Some(false) => {
                entries.remove(key);
            }
            None => {}
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.to_string()))
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let value = Self::bump(&mut entries, key, now);
        if value == 1 {
            if let Some(entry) = entries.get_mut(key) {
                entry.expires_at = Some(now + ttl);
            }
        }
        Ok(value)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
