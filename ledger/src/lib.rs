//! Caching proxy in front of the Kraken private API.
//!
//! Simple account endpoints are served cache-aside ([`cache::CacheAside`]).
//! `/sync/kraken` drains the paginated ledger ([`drain::drain_all`]),
//! normalizes every entry and upserts it into a [`store::DurableStore`].

pub mod api;
pub mod cache;
pub mod config;
pub mod drain;
mod metrics_defs;
pub mod normalize;
pub mod store;
pub mod sync;

pub use metrics_defs::ALL_METRICS;

use api::AppState;
use cache::{CacheAside, CacheError, CacheStore, MemoryCache, RedisCache};
use config::{CacheBackend, Config, StoreBackend, ValidationError};
use normalize::NormalizedRecord;
use shared::admin_service::{AdminService, Readiness};
use shared::http::run_http_service;
use std::sync::Arc;
use store::{DurableStore, MemoryStore, SqlStore, StorageError};
use sync::{LedgerSync, SyncError};
use tokio::net::TcpListener;
use upstream::{CoinGecko, Kraken, UpstreamError};

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Config(#[from] ValidationError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("could not connect to cache: {0}")]
    Cache(#[from] CacheError),
    #[error("could not open store: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Connects every backend named in `config` and wires the handlers' state.
pub async fn build_state(config: &Config) -> Result<AppState, LedgerError> {
    config.validate()?;

    let exchange = Arc::new(Kraken::new(config.kraken.clone())?);
    let prices = Arc::new(CoinGecko::new(&config.coingecko)?);

    let cache_store: Arc<dyn CacheStore> = match &config.cache.backend {
        CacheBackend::Redis { url } => Arc::new(RedisCache::connect(url).await?),
        CacheBackend::Memory { max_capacity } => Arc::new(MemoryCache::new(*max_capacity)),
    };

    let durable_store: Arc<dyn DurableStore> = match &config.store.backend {
        StoreBackend::Sql { url } => Arc::new(SqlStore::connect(url).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store, synced records are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let sync = LedgerSync::new(exchange.clone(), durable_store, config.sync.limits())
        .with_write_concurrency(config.sync.write_concurrency);

    Ok(AppState {
        exchange,
        prices,
        cache: CacheAside::new(cache_store),
        sync: Arc::new(sync),
        default_ttl: config.cache.default_ttl()?,
    })
}

/// Serves the API and the admin listener until either fails.
pub async fn run(config: Config) -> Result<(), LedgerError> {
    let readiness = Readiness::new();
    let state = build_state(&config).await?;

    let api_addr = format!("{}:{}", config.listener.host, config.listener.port);
    let api_listener = TcpListener::bind(&api_addr).await?;
    let api_task = async { axum::serve(api_listener, api::router(state)).await };

    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::new(readiness.clone()),
    );

    readiness.set_ready(true);
    tracing::info!(
        api = %api_addr,
        admin = %format!("{}:{}", config.admin_listener.host, config.admin_listener.port),
        "Listening"
    );

    tokio::try_join!(api_task, admin_task)?;
    Ok(())
}

/// Runs a single ledger sync without starting any listener.
pub async fn sync_once(config: &Config) -> Result<Vec<NormalizedRecord>, LedgerError> {
    let state = build_state(config).await?;
    Ok(state.sync.sync_ledger().await?)
}
