//! Clients for the third-party APIs the ledger service sits in front of.
//!
//! [`Kraken`] talks to Kraken's private REST API (signed requests, paginated
//! ledger) and [`CoinGecko`] provides market prices. Both are consumed through
//! the [`ExchangeApi`] and [`PriceFeed`] traits so callers can swap in doubles.

use async_trait::async_trait;

pub mod coingecko;
pub mod config;
pub mod kraken;
mod metrics_defs;
mod signing;
pub mod types;

pub use coingecko::CoinGecko;
pub use kraken::Kraken;
pub use metrics_defs::ALL_METRICS;

use types::{AssetPrice, Balance, LedgerPage, StakingTransaction, TradeHistory};

#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    #[error("http client error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("{endpoint} responded with status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("{endpoint} still failing with status {status} after {retries} retries")]
    RetriesExceeded {
        endpoint: String,
        status: u16,
        retries: u32,
    },
    #[error("kraken api error: {}", .0.join(", "))]
    Api(Vec<String>),
    #[error("response from {0} carried no result")]
    MissingResult(String),
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// Account data read from the exchange. Every call is a live upstream request.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    async fn fetch_balance(&self) -> Result<Balance, UpstreamError>;

    async fn fetch_staking(&self) -> Result<Vec<StakingTransaction>, UpstreamError>;

    async fn fetch_trade_history(&self) -> Result<TradeHistory, UpstreamError>;

    /// One page of the account ledger starting at `offset`. An empty page
    /// means there are no entries at or after `offset`.
    async fn fetch_ledger(&self, offset: u64) -> Result<LedgerPage, UpstreamError>;
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch_asset_prices(&self) -> Result<Vec<AssetPrice>, UpstreamError>;
}
