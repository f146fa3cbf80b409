// In-process cache store with per-entry expiry, for single-instance
// deployments and tests.
use super::{CacheError, CacheStore, Ttl};
use async_trait::async_trait;
use moka::Expiry;
use moka::sync::Cache;
use std::time::{Duration, Instant};

const DEFAULT_CAPACITY: u64 = 10_000;

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    // Overwriting an entry restarts its clock, matching `SET key value EX ttl`.
    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

pub struct MemoryCache {
    cache: Cache<String, Entry>,
}

impl MemoryCache {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        MemoryCache { cache }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.cache.get(key).map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Ttl) -> Result<(), CacheError> {
        self.cache.insert(
            key.to_string(),
            Entry {
                value,
                ttl: ttl.as_duration(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = MemoryCache::default();
        assert_eq!(cache.get("key").await.unwrap(), None);

        cache
            .set("key", "value".into(), Ttl::from_secs(60).unwrap())
            .await
            .unwrap();
        assert_eq!(cache.get("key").await.unwrap().as_deref(), Some("value"));

        cache
            .set("key", "other".into(), Ttl::from_secs(60).unwrap())
            .await
            .unwrap();
        assert_eq!(cache.get("key").await.unwrap().as_deref(), Some("other"));
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = MemoryCache::default();
        cache
            .set("short", "value".into(), Ttl::from_secs(1).unwrap())
            .await
            .unwrap();
        cache
            .set("long", "value".into(), Ttl::from_secs(60).unwrap())
            .await
            .unwrap();

        std::thread::sleep(Duration::from_millis(1100));

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.get("long").await.unwrap().as_deref(), Some("value"));
    }
}
