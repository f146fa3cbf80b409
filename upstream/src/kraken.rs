use crate::config::KrakenConfig;
use crate::metrics_defs::{UPSTREAM_REQUEST, UPSTREAM_RETRY};
use crate::signing::Signer;
use crate::types::{Balance, Envelope, LedgerPage, StakingTransaction, TradeHistory};
use crate::{ExchangeApi, UpstreamError};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use shared::counter;
use tokio::time::{Duration, sleep};

const RETRIABLE_STATUS_CODES: &[StatusCode] = &[
    StatusCode::TOO_MANY_REQUESTS,     // 429
    StatusCode::INTERNAL_SERVER_ERROR, // 500
    StatusCode::BAD_GATEWAY,           // 502
    StatusCode::SERVICE_UNAVAILABLE,   // 503
    StatusCode::GATEWAY_TIMEOUT,       // 504
];

const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Client for Kraken's private REST API.
pub struct Kraken {
    client: reqwest::Client,
    config: KrakenConfig,
    base_url: Url,
    api_key: String,
    signer: Signer,
}

impl Kraken {
    pub fn new(config: KrakenConfig) -> Result<Self, UpstreamError> {
        let credentials = config.credentials().ok_or_else(|| {
            UpstreamError::InvalidCredentials("api key or private key not configured".into())
        })?;

        let base_url =
            Url::parse(&config.base_url).map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Kraken {
            client,
            signer: Signer::new(&credentials.private_key)?,
            api_key: credentials.api_key,
            base_url,
            config,
        })
    }

    /// Sends a signed POST to a private endpoint and unwraps Kraken's response envelope.
    /// Retriable statuses are retried with exponential backoff; every attempt gets a
    /// fresh nonce.
    async fn private_request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let path = format!(
            "/{}/{}",
            self.config.api_version.trim_matches('/'),
            endpoint.trim_start_matches('/')
        );
        let url = self
            .base_url
            .join(&path)
            .map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;

        let mut retries = 0;

        loop {
            let nonce = self.signer.next_nonce();
            let body = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("nonce", &nonce.to_string())
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
                .finish();
            let signature = self.signer.sign(&path, nonce, &body);

            counter!(UPSTREAM_REQUEST, "endpoint" => endpoint.to_string()).increment(1);
            tracing::debug!(endpoint, retries, "Sending Kraken request");

            let response = self
                .client
                .post(url.clone())
                .header("API-Key", &self.api_key)
                .header("API-Sign", signature)
                .header(
                    "Content-Type",
                    "application/x-www-form-urlencoded; charset=utf-8",
                )
                .body(body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                if !RETRIABLE_STATUS_CODES.contains(&status) {
                    return Err(UpstreamError::Status {
                        endpoint: endpoint.to_string(),
                        status: status.as_u16(),
                    });
                }
                if retries >= self.config.max_retries {
                    return Err(UpstreamError::RetriesExceeded {
                        endpoint: endpoint.to_string(),
                        status: status.as_u16(),
                        retries,
                    });
                }

                let delay = retry_delay(self.config.retry_base_delay_ms, retries);
                tracing::warn!(endpoint, %status, ?delay, "Retrying Kraken request");
                counter!(UPSTREAM_RETRY, "endpoint" => endpoint.to_string()).increment(1);
                sleep(delay).await;
                retries += 1;
                continue;
            }

            let envelope = response.json::<Envelope<T>>().await?;
            if !envelope.error.is_empty() {
                return Err(UpstreamError::Api(envelope.error));
            }

            return envelope
                .result
                .ok_or_else(|| UpstreamError::MissingResult(endpoint.to_string()));
        }
    }
}

/// Exponential backoff, `base_ms * 2^retries`, capped at [`MAX_RETRY_DELAY`].
fn retry_delay(base_ms: u64, retries: u32) -> Duration {
    let millis = base_ms.saturating_mul(2_u64.saturating_pow(retries));
    Duration::from_millis(millis).min(MAX_RETRY_DELAY)
}

#[async_trait]
impl ExchangeApi for Kraken {
    async fn fetch_balance(&self) -> Result<Balance, UpstreamError> {
        self.private_request(&self.config.endpoints.balance, &[])
            .await
    }

    async fn fetch_staking(&self) -> Result<Vec<StakingTransaction>, UpstreamError> {
        self.private_request(&self.config.endpoints.staking, &[])
            .await
    }

    async fn fetch_trade_history(&self) -> Result<TradeHistory, UpstreamError> {
        self.private_request(&self.config.endpoints.trades_history, &[])
            .await
    }

    async fn fetch_ledger(&self, offset: u64) -> Result<LedgerPage, UpstreamError> {
        self.private_request(
            &self.config.endpoints.ledgers,
            &[("ofs", offset.to_string())],
        )
        .await
    }
}
