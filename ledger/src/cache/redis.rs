//! Redis backed cache store. Entries are plain strings written with
//! `SET key value EX ttl`, so expiry is enforced by Redis itself.

use super::{CacheError, CacheStore, Ttl};
use ::redis::AsyncCommands;
use ::redis::Client;
use ::redis::aio::ConnectionManager;
use async_trait::async_trait;

pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connects to `url` (e.g. `redis://localhost:6379`). The connection
    /// manager reconnects on its own after the initial connection succeeds.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        tracing::info!("Connected to redis");
        Ok(RedisCache { connection })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Ttl) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }
}
