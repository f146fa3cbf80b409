use crate::cache::{
    ACCOUNT_BALANCE, ASSET_PRICES, CacheAside, STAKING_TRANSACTIONS, TRADE_HISTORY, Ttl,
};
use crate::normalize::NormalizedRecord;
use crate::sync::{LedgerSync, SyncError};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use upstream::types::{AssetPrice, Balance, StakingTransaction, TradeHistory};
use upstream::{ExchangeApi, PriceFeed, UpstreamError};

/// Collaborators shared by every handler. Constructed once at startup.
#[derive(Clone)]
pub struct AppState {
    pub exchange: Arc<dyn ExchangeApi>,
    pub prices: Arc<dyn PriceFeed>,
    pub cache: CacheAside,
    pub sync: Arc<LedgerSync>,
    pub default_ttl: Ttl,
}

/// Added to every response that does not already carry them.
const DEFAULT_RESPONSE_HEADERS: &[(&str, &str)] = &[
    ("cache-control", "no-cache"),
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
         form-action 'self';frame-ancestors 'self';img-src 'self' data:;\
         object-src 'none';script-src 'self';script-src-attr 'none';\
         style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/account-balance", get(account_balance))
        .route("/staking", get(staking))
        .route("/trade-history", get(trade_history))
        .route("/sync-prices", get(sync_prices))
        .route("/sync/kraken", get(sync_kraken))
        .with_state(state);

    for &(name, value) in DEFAULT_RESPONSE_HEADERS {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }

    router.layer(CorsLayer::permissive())
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error_message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");

        let body = Json(ApiErrorResponse {
            error_message: self.to_string(),
        });

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

async fn account_balance(State(state): State<AppState>) -> Result<Json<Balance>, ApiError> {
    let balance = state
        .cache
        .resolve(&ACCOUNT_BALANCE, state.default_ttl, || {
            state.exchange.fetch_balance()
        })
        .await?;
    Ok(Json(balance))
}

async fn staking(
    State(state): State<AppState>,
) -> Result<Json<Vec<StakingTransaction>>, ApiError> {
    let transactions = state
        .cache
        .resolve(&STAKING_TRANSACTIONS, state.default_ttl, || {
            state.exchange.fetch_staking()
        })
        .await?;
    Ok(Json(transactions))
}

async fn trade_history(State(state): State<AppState>) -> Result<Json<TradeHistory>, ApiError> {
    let history = state
        .cache
        .resolve(&TRADE_HISTORY, state.default_ttl, || {
            state.exchange.fetch_trade_history()
        })
        .await?;
    Ok(Json(history))
}

/// Always fetches fresh prices and overwrites the cached copy.
async fn sync_prices(State(state): State<AppState>) -> Result<Json<Vec<AssetPrice>>, ApiError> {
    let prices = state.prices.fetch_asset_prices().await?;
    state
        .cache
        .write(&ASSET_PRICES, state.default_ttl, &prices)
        .await;
    Ok(Json(prices))
}

async fn sync_kraken(
    State(state): State<AppState>,
) -> Result<Json<Vec<NormalizedRecord>>, ApiError> {
    let records = state.sync.sync_ledger().await?;
    Ok(Json(records))
}
