use super::{CacheKey, CacheStore, Ttl};
use crate::metrics_defs::{CACHE_HIT, CACHE_MISS, CACHE_READ_ERROR, CACHE_WRITE_ERROR};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::counter;
use std::future::Future;
use std::sync::Arc;

/// Cache-aside reads over a [`CacheStore`].
///
/// Cache failures never reach the caller: an unreadable or malformed entry is
/// treated as a miss and a failed write is logged and dropped. There is no
/// stampede protection, so concurrent misses on one key each run the producer
/// and the last write wins.
#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        CacheAside { store }
    }

    /// Returns the cached value for `key`, or runs `producer` and writes its
    /// result through with the given `ttl`.
    ///
    /// The producer is not invoked on a hit. If it fails, its error is returned
    /// unchanged and nothing is cached.
    pub async fn resolve<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Ttl,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.read(key).await {
            tracing::debug!(%key, "Used cached response");
            counter!(CACHE_HIT, "key" => key.to_string()).increment(1);
            return Ok(value);
        }

        counter!(CACHE_MISS, "key" => key.to_string()).increment(1);
        let value = producer().await?;
        self.write(key, ttl, &value).await;
        Ok(value)
    }

    /// Writes `value` without reading first. Best effort, like the write half
    /// of [`CacheAside::resolve`].
    pub async fn write<T: Serialize>(&self, key: &CacheKey, ttl: Ttl, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(%key, error = %e, "Could not serialize value for cache");
                counter!(CACHE_WRITE_ERROR, "key" => key.to_string()).increment(1);
                return;
            }
        };

        match self.store.set(key.as_str(), payload, ttl).await {
            Ok(()) => tracing::debug!(%key, ttl = ttl.as_secs(), "Caching response"),
            Err(e) => {
                tracing::warn!(%key, error = %e, "Cache write failed");
                counter!(CACHE_WRITE_ERROR, "key" => key.to_string()).increment(1);
            }
        }
    }

    async fn read<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let payload = match self.store.get(key.as_str()).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(%key, error = %e, "Cache read failed, treating as miss");
                counter!(CACHE_READ_ERROR, "key" => key.to_string()).increment(1);
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(%key, error = %e, "Malformed cache entry, treating as miss");
                counter!(CACHE_READ_ERROR, "key" => key.to_string()).increment(1);
                None
            }
        }
    }
}
