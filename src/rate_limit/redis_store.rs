//! Redis Counter Store
//!
//! Shares counters across every instance of the service. Uses `INCR`,
//! `EXPIRE` and `GET` on plain string keys so counters written by other
//! services using the same key layout stay interoperable.
//!
//! Each call is bounded by `op_timeout`; a timed-out call surfaces as
//! [`StoreError::Timeout`] and is handled by the caller's failure policy.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use super::error::StoreError;
use super::store::CounterStore;

/// INCR, then EXPIRE only when this call created the key
const INCR_EXPIRE_ON_CREATE: &str = r#"
local n = redis.call('INCR', KEYS[1])
if n == 1 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return n
"#;

/// Redis-backed counter store
#[derive(Clone)]
pub struct RedisCounterStore {
    connection: ConnectionManager,
    op_timeout: Duration,
    script: Script,
}

impl fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisCounterStore {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1/`)
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the first connection fails.
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let connection = tokio::time::timeout(op_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(op_timeout.as_millis() as u64))??;

        tracing::info!(url = %url, "Connected to Redis counter store");

        Ok(Self {
            connection,
            op_timeout,
            script: Script::new(INCR_EXPIRE_ON_CREATE),
        })
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.op_timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.connection.clone();
        self.bounded(async move { conn.incr::<_, _, i64>(key, 1).await }).await
    }

    async fn set_expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let secs = ttl.as_secs().max(1) as i64;
        self.bounded(async move { conn.expire::<_, ()>(key, secs).await }).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        self.bounded(async move { conn.get::<_, Option<String>>(key).await }).await
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let mut conn = self.connection.clone();
        let secs = ttl.as_secs().max(1);
        let script = &self.script;
        self.bounded(async move {
            script
                .key(key)
                .arg(secs)
                .invoke_async::<i64>(&mut conn)
                .await
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
