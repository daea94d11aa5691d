use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{CacheError, CacheStore};

struct Slot {
    value: String,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Process-local cache store for tests. Expired entries are dropped on read
/// and swept on every write.
#[derive(Default)]
pub struct MemoryCache {
    slots: RwLock<HashMap<String, Slot>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        {
            let slots = self.slots.read().await;
            match slots.get(key) {
                Some(slot) if slot.is_live(now) => return Ok(Some(slot.value.clone())),
                None => return Ok(None),
                Some(_) => {}
            }
        }
        self.slots.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> Result<(), CacheError> {
        let expires_at = (ttl_seconds > 0).then(|| Instant::now() + Duration::from_secs(ttl_seconds));
        let mut slots = self.slots.write().await;
        let now = Instant::now();
        slots.retain(|_, slot| slot.is_live(now));
        slots.insert(key.to_string(), Slot { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.slots.write().await.remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let now = Instant::now();
        let mut slots = self.slots.write().await;
        let current = slots
            .get(key)
            .filter(|slot| slot.is_live(now))
            .and_then(|slot| slot.value.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + 1;
        slots.insert(
            key.to_string(),
            Slot {
                value: next.to_string(),
                expires_at: None,
            },
        );
        Ok(next)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::new();
        cache.set("k", "v".into(), 1).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_writes_sweep_expired_entries() {
        let cache = MemoryCache::new();
        cache.set("stale", "v".into(), 1).await.unwrap();
        std::thread::sleep(Duration::from_millis(1100));
        cache.set("fresh", "v".into(), 60).await.unwrap();
        let slots = cache.slots.read().await;
        assert!(!slots.contains_key("stale"));
        assert!(slots.contains_key("fresh"));
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let cache = MemoryCache::new();
        cache.set("k", "v".into(), 0).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_incr_from_missing_and_garbage() {
        let cache = MemoryCache::new();
        assert_eq!(cache.incr("n").await.unwrap(), 1);
        assert_eq!(cache.incr("n").await.unwrap(), 2);
        cache.set("g", "abc".into(), 0).await.unwrap();
        assert_eq!(cache.incr("g").await.unwrap(), 1);
    }
}
