use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Asset code to balance, e.g. `"XXBT" => "0.1250000000"`.
pub type Balance = BTreeMap<String, String>;

/// A decimal value kept in its textual form.
///
/// Kraken sends most amounts as strings but some fields (notably ledger `time`)
/// as JSON numbers. Both are accepted and kept verbatim so no precision is lost.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NumericString(pub String);

impl NumericString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NumericString {
    fn from(value: &str) -> Self {
        NumericString(value.to_string())
    }
}

impl fmt::Display for NumericString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NumericString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(s) => NumericString(s),
            Repr::Number(n) => NumericString(n.to_string()),
        })
    }
}

/// A single entry of the account ledger as returned by the `Ledgers` endpoint.
///
/// Every field is optional upstream; defaults are applied when the entry is
/// normalized, not here.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(default)]
    pub refid: Option<String>,
    /// Seconds since the unix epoch.
    #[serde(default)]
    pub time: Option<NumericString>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub aclass: Option<String>,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub amount: Option<NumericString>,
    #[serde(default)]
    pub fee: Option<NumericString>,
    #[serde(default)]
    pub balance: Option<NumericString>,
}

/// One page of the ledger, keyed by ledger id in upstream order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerPage {
    #[serde(default)]
    pub ledger: IndexMap<String, LedgerEntry>,
    /// Total number of entries matching the query, across all pages.
    #[serde(default)]
    pub count: u64,
}

/// JSON object fields, kept exactly as upstream sent them.
pub type RawFields = serde_json::Map<String, serde_json::Value>;

/// One executed trade. Served through unchanged, so every upstream field
/// (`postxid`, `leverage`, `trade_id`, `maker`, ...) and its JSON type is kept.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trade(pub RawFields);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeHistory {
    #[serde(default)]
    pub trades: IndexMap<String, Trade>,
    #[serde(default)]
    pub count: u64,
}

/// One staking transaction, kept as upstream sent it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StakingTransaction(pub RawFields);

/// Market data for one coin from CoinGecko's `coins/markets` endpoint, kept as
/// upstream sent it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetPrice(pub RawFields);

/// Kraken wraps every response in `{"error": [...], "result": ...}`.
#[derive(Deserialize, Debug)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub error: Vec<String>,
    pub result: Option<T>,
}
