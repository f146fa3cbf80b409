use crate::config::CoinGeckoConfig;
use crate::metrics_defs::UPSTREAM_REQUEST;
use crate::types::AssetPrice;
use crate::{PriceFeed, UpstreamError};
use async_trait::async_trait;
use reqwest::Url;
use shared::counter;
use std::time::Duration;

/// Public market data from CoinGecko. No authentication.
pub struct CoinGecko {
    client: reqwest::Client,
    url: Url,
}

impl CoinGecko {
    pub fn new(config: &CoinGeckoConfig) -> Result<Self, UpstreamError> {
        let mut url =
            Url::parse(&config.base_url).map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("vs_currency", &config.vs_currency);
        if !config.ids.is_empty() {
            url.query_pairs_mut().append_pair("ids", &config.ids.join(","));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(CoinGecko { client, url })
    }
}

#[async_trait]
impl PriceFeed for CoinGecko {
    async fn fetch_asset_prices(&self) -> Result<Vec<AssetPrice>, UpstreamError> {
        counter!(UPSTREAM_REQUEST, "endpoint" => "coingecko.markets").increment(1);

        let response = self.client.get(self.url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                endpoint: self.url.path().to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.json::<Vec<AssetPrice>>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_asset_prices() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v3/coins/markets"))
            .and(query_param("vs_currency", "eur"))
            .and(query_param("ids", "bitcoin,ethereum"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[
                    {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 61000.5},
                    {"id": "ethereum", "symbol": "eth", "name": "Ethereum", "current_price": 3100}
                ]"#,
            ))
            .mount(&mock_server)
            .await;

        let config = CoinGeckoConfig {
            base_url: format!("{}/api/v3/coins/markets", mock_server.uri()),
            vs_currency: "eur".into(),
            ids: vec!["bitcoin".into(), "ethereum".into()],
            ..Default::default()
        };
        let prices = CoinGecko::new(&config)
            .unwrap()
            .fetch_asset_prices()
            .await
            .unwrap();

        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].0["symbol"], "btc");
        assert_eq!(prices[1].0["current_price"], 3100);
    }

    #[tokio::test]
    async fn test_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let config = CoinGeckoConfig {
            base_url: mock_server.uri(),
            ..Default::default()
        };
        let err = CoinGecko::new(&config)
            .unwrap()
            .fetch_asset_prices()
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Status { status: 429, .. }));
    }
}
