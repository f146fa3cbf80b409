use serde::Deserialize;

pub const API_KEY_ENV: &str = "KRAKEN_API_KEY";
pub const PRIVATE_KEY_ENV: &str = "KRAKEN_PRIVATE_KEY";

/// Paths of the private Kraken endpoints, relative to `/{api_version}`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct KrakenEndpoints {
    pub balance: String,
    pub trades_history: String,
    pub staking: String,
    pub ledgers: String,
}

impl Default for KrakenEndpoints {
    fn default() -> Self {
        KrakenEndpoints {
            balance: "/private/Balance".into(),
            trades_history: "/private/TradesHistory".into(),
            staking: "/private/Staking/Transactions".into(),
            ledgers: "/private/Ledgers".into(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct KrakenConfig {
    pub base_url: String,
    pub api_version: String,
    /// Falls back to `KRAKEN_API_KEY` when unset.
    pub api_key: Option<String>,
    /// Base64 encoded API secret. Falls back to `KRAKEN_PRIVATE_KEY` when unset.
    pub private_key: Option<String>,
    pub endpoints: KrakenEndpoints,
    pub timeout_secs: u64,
    /// Retries per request for 429 and 5xx responses.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for KrakenConfig {
    fn default() -> Self {
        KrakenConfig {
            base_url: "https://api.kraken.com".into(),
            api_version: "0".into(),
            api_key: None,
            private_key: None,
            endpoints: KrakenEndpoints::default(),
            timeout_secs: 10,
            max_retries: 3,
            retry_base_delay_ms: 500,
        }
    }
}

pub struct Credentials {
    pub api_key: String,
    pub private_key: String,
}

impl KrakenConfig {
    /// Resolves the API credentials from the config, falling back to the
    /// environment. Returns `None` if either half is missing or empty.
    pub fn credentials(&self) -> Option<Credentials> {
        let api_key = resolve(self.api_key.as_deref(), API_KEY_ENV)?;
        let private_key = resolve(self.private_key.as_deref(), PRIVATE_KEY_ENV)?;
        Some(Credentials {
            api_key,
            private_key,
        })
    }
}

fn resolve(configured: Option<&str>, env_var: &str) -> Option<String> {
    configured
        .map(String::from)
        .or_else(|| std::env::var(env_var).ok())
        .filter(|value| !value.is_empty())
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoinGeckoConfig {
    pub base_url: String,
    pub vs_currency: String,
    /// Restrict the price sync to these coin ids. Empty means CoinGecko's default
    /// page (top coins by market cap).
    pub ids: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        CoinGeckoConfig {
            base_url: "https://api.coingecko.com/api/v3/coins/markets".into(),
            vs_currency: "usd".into(),
            ids: Vec::new(),
            timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: KrakenConfig = serde_yaml::from_str(
            r#"
            api_key: key
            private_key: c2VjcmV0
            endpoints:
                ledgers: /private/CustomLedgers
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://api.kraken.com");
        assert_eq!(config.endpoints.ledgers, "/private/CustomLedgers");
        assert_eq!(config.endpoints.balance, "/private/Balance");
        assert_eq!(config.max_retries, 3);

        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.api_key, "key");
        assert_eq!(credentials.private_key, "c2VjcmV0");
    }

    #[test]
    fn test_empty_credentials_are_missing() {
        let config = KrakenConfig {
            api_key: Some("".into()),
            private_key: Some("c2VjcmV0".into()),
            ..Default::default()
        };
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_unrouted_endpoint_keys_are_ignored() {
        let endpoints: KrakenEndpoints = serde_yaml::from_str(
            r#"
            balance: /private/Balance
            trade_balance: /private/TradeBalance
            "#,
        )
        .unwrap();

        assert_eq!(endpoints, KrakenEndpoints::default());
    }
}
