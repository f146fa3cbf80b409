//! Side cache shielding the upstream API from repeated calls.
//!
//! [`CacheStore`] is the raw key/value store with per-key expiry (Redis in
//! production, [`MemoryCache`] for single-process setups and tests).
//! [`CacheAside`] implements the read path on top of it.

use async_trait::async_trait;
use std::borrow::Cow;
use std::fmt;
use std::num::NonZeroU64;
use std::time::Duration;

mod memory;
mod redis;
mod resolver;

pub use memory::MemoryCache;
pub use redis::RedisCache;
pub use resolver::CacheAside;

pub const ACCOUNT_BALANCE: CacheKey = CacheKey::from_static("kraken-account-balance");
pub const STAKING_TRANSACTIONS: CacheKey = CacheKey::from_static("kraken-staking-transactions");
pub const TRADE_HISTORY: CacheKey = CacheKey::from_static("kraken-trade-history");
pub const ASSET_PRICES: CacheKey = CacheKey::from_static("kraken-asset-prices");

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("cache key must not be empty")]
    EmptyKey,
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// A non-empty cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(Cow<'static, str>);

impl CacheKey {
    pub const fn from_static(key: &'static str) -> Self {
        assert!(!key.is_empty(), "cache key must not be empty");
        CacheKey(Cow::Borrowed(key))
    }

    pub fn new(key: impl Into<String>) -> Result<Self, CacheError> {
        let key = key.into();
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }
        Ok(CacheKey(Cow::Owned(key)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Time until a cache entry expires. Always at least one second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ttl(NonZeroU64);

impl Ttl {
    pub const fn from_secs(secs: u64) -> Option<Self> {
        match NonZeroU64::new(secs) {
            Some(secs) => Some(Ttl(secs)),
            None => None,
        }
    }

    pub fn as_secs(&self) -> u64 {
        self.0.get()
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0.get())
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored payload, or `None` if the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key`, replacing any previous entry. The entry
    /// expires `ttl` from now.
    async fn set(&self, key: &str, value: String, ttl: Ttl) -> Result<(), CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key() {
        assert!(matches!(CacheKey::new(""), Err(CacheError::EmptyKey)));
        assert_eq!(CacheKey::new("k").unwrap().as_str(), "k");
        assert_eq!(ACCOUNT_BALANCE.to_string(), "kraken-account-balance");
    }

    #[test]
    fn test_ttl_must_be_positive() {
        assert!(Ttl::from_secs(0).is_none());
        let ttl = Ttl::from_secs(300).unwrap();
        assert_eq!(ttl.as_secs(), 300);
        assert_eq!(ttl.as_duration(), Duration::from_secs(300));
    }
}
