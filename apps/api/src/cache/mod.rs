//! Generic key/value cache with TTL.
//!
//! `CacheStore` is the backend seam (Redis in production, in-memory for tests).
//! `Cache` adds key prefixing, JSON (de)serialization and metrics on top, and
//! never surfaces backend failures: a broken cache behaves like an empty one.

pub mod keys;
#[cfg(test)]
pub mod memory;
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{trace, warn};

use crate::monitoring::{inc, METRICS};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Atomically increments an integer key (missing counts as 0) and returns the new value.
    async fn incr(&self, key: &str) -> Result<i64, CacheError>;
    async fn ping(&self) -> Result<(), CacheError>;
}

#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    prefix: String,
    default_ttl: u64,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>, prefix: impl Into<String>, default_ttl: u64) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            default_ttl,
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Returns the cached value, or `None` on miss, decode failure or backend error.
    /// `namespace` only labels the metric.
    pub async fn get_json<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        match self.store.get(&self.full_key(key)).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    trace!("Cache hit: {key}");
                    inc(&METRICS.cache_requests_total, &[namespace, "hit"]);
                    Some(value)
                }
                Err(e) => {
                    warn!("Discarding undecodable cache entry '{key}': {e}");
                    inc(&METRICS.cache_requests_total, &[namespace, "error"]);
                    None
                }
            },
            Ok(None) => {
                trace!("Cache miss: {key}");
                inc(&METRICS.cache_requests_total, &[namespace, "miss"]);
                None
            }
            Err(e) => {
                warn!("Cache read failed for '{key}': {e}");
                inc(&METRICS.cache_requests_total, &[namespace, "error"]);
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        self.set_json_with_ttl(key, value, self.default_ttl).await
    }

    pub async fn set_json_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize cache entry '{key}': {e}");
                return;
            }
        };
        if let Err(e) = self.store.set(&self.full_key(key), raw, ttl_seconds).await {
            warn!("Cache write failed for '{key}': {e}");
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.store.delete(&self.full_key(key)).await {
            warn!("Cache delete failed for '{key}': {e}");
        }
    }

    /// Reads an integer counter; missing or unreadable counts as 0.
    pub async fn counter(&self, key: &str) -> i64 {
        match self.store.get(&self.full_key(key)).await {
            Ok(Some(raw)) => raw.trim().parse().unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                warn!("Cache counter read failed for '{key}': {e}");
                0
            }
        }
    }

    pub async fn bump(&self, key: &str) {
        if let Err(e) = self.store.incr(&self.full_key(key)).await {
            warn!("Cache counter bump failed for '{key}': {e}");
        }
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryCache;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        name: String,
        n: u32,
    }

    fn cache() -> Cache {
        Cache::new(Arc::new(MemoryCache::new()), "test:", 60)
    }

    #[tokio::test]
    async fn test_json_round_trip_and_delete() {
        let cache = cache();
        let entry = Entry {
            name: "a".into(),
            n: 1,
        };
        assert_eq!(cache.get_json::<Entry>("t", "k").await, None);
        cache.set_json("k", &entry).await;
        assert_eq!(cache.get_json::<Entry>("t", "k").await, Some(entry));
        cache.delete("k").await;
        assert_eq!(cache.get_json::<Entry>("t", "k").await, None);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let store = Arc::new(MemoryCache::new());
        store.set("test:k", "not json".into(), 60).await.unwrap();
        let cache = Cache::new(store, "test:", 60);
        assert_eq!(cache.get_json::<Entry>("t", "k").await, None);
    }

    #[tokio::test]
    async fn test_counter_bumps() {
        let cache = cache();
        assert_eq!(cache.counter("gen").await, 0);
        cache.bump("gen").await;
        cache.bump("gen").await;
        assert_eq!(cache.counter("gen").await, 2);
    }

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(serde_json::from_str::<u8>("x").unwrap_err().into())
        }
        async fn set(&self, _: &str, _: String, _: u64) -> Result<(), CacheError> {
            Err(serde_json::from_str::<u8>("x").unwrap_err().into())
        }
        async fn delete(&self, _: &str) -> Result<(), CacheError> {
            Err(serde_json::from_str::<u8>("x").unwrap_err().into())
        }
        async fn incr(&self, _: &str) -> Result<i64, CacheError> {
            Err(serde_json::from_str::<u8>("x").unwrap_err().into())
        }
        async fn ping(&self) -> Result<(), CacheError> {
            Err(serde_json::from_str::<u8>("x").unwrap_err().into())
        }
    }

    #[tokio::test]
    async fn test_broken_backend_degrades_to_miss() {
        let cache = Cache::new(Arc::new(BrokenStore), "", 60);
        cache.set_json("k", &1u32).await;
        assert_eq!(cache.get_json::<u32>("t", "k").await, None);
        assert_eq!(cache.counter("gen").await, 0);
        assert!(cache.ping().await.is_err());
    }
}
