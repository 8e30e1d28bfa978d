//! Pluggable TAT storage for the rate-limit engine.

use super::LimitName;
use crate::error::{RaError, Result};
use async_trait::async_trait;
use jiff::Timestamp;
use std::collections::HashMap;
use std::sync::RwLock;

fn bucket_key(limit: LimitName, bucket: &str) -> String {
    format!("{limit:?}:{bucket}")
}

/// A bucket with no recorded TAT behaves as though it were last spent at the
/// Unix epoch — i.e. wide open.
fn empty_tat() -> Timestamp {
    Timestamp::from_second(0).expect("epoch is a valid timestamp")
}

#[async_trait]
pub trait LimiterStore: Send + Sync {
    async fn get_tat(&self, limit: LimitName, bucket: &str) -> Result<Timestamp>;
    async fn set_tat(&self, limit: LimitName, bucket: &str, tat: Timestamp) -> Result<()>;
}

/// In-process store backed by a `RwLock<HashMap>`. The default for
/// single-node deployments and for tests.
pub struct MemoryLimiterStore {
    tats: RwLock<HashMap<String, Timestamp>>,
}

impl MemoryLimiterStore {
    pub fn new() -> Self {
        Self {
            tats: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryLimiterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LimiterStore for MemoryLimiterStore {
    async fn get_tat(&self, limit: LimitName, bucket: &str) -> Result<Timestamp> {
        let guard = self.tats.read().expect("limiter lock poisoned");
        Ok(guard.get(&bucket_key(limit, bucket)).copied().unwrap_or_else(empty_tat))
    }

    async fn set_tat(&self, limit: LimitName, bucket: &str, tat: Timestamp) -> Result<()> {
        let mut guard = self.tats.write().expect("limiter lock poisoned");
        guard.insert(bucket_key(limit, bucket), tat);
        Ok(())
    }
}

/// Redis-backed store for multi-node deployments, sharing bucket state
/// across every RA instance. Each bucket is a single key holding the TAT as
/// epoch nanoseconds, stored as a string since it can exceed Redis's native
/// 64-bit integer range.
#[cfg(feature = "redis-cache")]
pub struct RedisLimiterStore {
    client: redis::Client,
}

#[cfg(feature = "redis-cache")]
impl RedisLimiterStore {
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| RaError::connection_failure(format!("redis: {e}")))?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RaError::connection_failure(format!("redis: {e}")))
    }
}

#[cfg(feature = "redis-cache")]
#[async_trait]
impl LimiterStore for RedisLimiterStore {
    async fn get_tat(&self, limit: LimitName, bucket: &str) -> Result<Timestamp> {
        use redis::AsyncCommands;
        let mut conn = self.connection().await?;
        let key = bucket_key(limit, bucket);
        let nanos: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| RaError::connection_failure(format!("redis: {e}")))?;
        Ok(match nanos.and_then(|s| s.parse::<i128>().ok()) {
            Some(n) => Timestamp::from_nanosecond(n).unwrap_or_else(|_| empty_tat()),
            None => empty_tat(),
        })
    }

    async fn set_tat(&self, limit: LimitName, bucket: &str, tat: Timestamp) -> Result<()> {
        use redis::AsyncCommands;
        let mut conn = self.connection().await?;
        let key = bucket_key(limit, bucket);
        let _: () = conn
            .set(&key, tat.as_nanosecond().to_string())
            .await
            .map_err(|e| RaError::connection_failure(format!("redis: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_bucket_defaults_to_epoch() {
        let store = MemoryLimiterStore::new();
        let tat = store.get_tat(LimitName::NewOrdersPerAccountPerDomain, "k").await.unwrap();
        assert_eq!(tat.as_second(), 0);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryLimiterStore::new();
        let ts = Timestamp::from_second(1_700_000_000).unwrap();
        store.set_tat(LimitName::NewOrdersPerAccountPerDomain, "k", ts).await.unwrap();
        let got = store.get_tat(LimitName::NewOrdersPerAccountPerDomain, "k").await.unwrap();
        assert_eq!(got, ts);
    }
}
