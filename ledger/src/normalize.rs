//! Maps raw ledger entries onto the stable record shape that is persisted and
//! returned by the sync endpoint.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use upstream::types::{LedgerEntry, NumericString};

const ZERO: &str = "0";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub amount: String,
    pub asset: String,
    pub balance: String,
    pub fee: String,
    pub refid: String,
    /// ISO-8601 with millisecond precision, always UTC (`...Z`).
    pub time: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Why a record's time fell back to the unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeFallback {
    Missing,
    /// No leading integer, e.g. `"yesterday"` or `".5"`.
    Unparseable,
    /// Parsed, but not representable as an instant.
    OutOfRange,
}

impl fmt::Display for TimeFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            TimeFallback::Missing => "missing",
            TimeFallback::Unparseable => "unparseable",
            TimeFallback::OutOfRange => "out of range",
        };
        f.write_str(reason)
    }
}

/// Normalizes one ledger entry. Never fails: missing text fields become `""`,
/// missing amounts become `"0"` and a missing or unusable time becomes the
/// unix epoch.
pub fn normalize(raw: &LedgerEntry) -> NormalizedRecord {
    normalize_checked(raw).0
}

/// Like [`normalize`], also reporting whether the time was replaced by the
/// epoch and why.
pub fn normalize_checked(raw: &LedgerEntry) -> (NormalizedRecord, Option<TimeFallback>) {
    let seconds = raw.time.as_ref().map(NumericString::as_str);
    let (time, fallback) = match epoch_seconds_to_iso(seconds) {
        Ok(time) => (time, None),
        Err(reason) => (format_instant(DateTime::UNIX_EPOCH), Some(reason)),
    };

    let record = NormalizedRecord {
        amount: numeric_or_zero(raw.amount.as_ref()),
        asset: raw.asset.clone().unwrap_or_default(),
        balance: numeric_or_zero(raw.balance.as_ref()),
        fee: numeric_or_zero(raw.fee.as_ref()),
        refid: raw.refid.clone().unwrap_or_default(),
        time,
        kind: raw.kind.clone().unwrap_or_default(),
    };
    (record, fallback)
}

fn numeric_or_zero(value: Option<&NumericString>) -> String {
    value
        .map(|v| v.as_str().to_string())
        .unwrap_or_else(|| ZERO.to_string())
}

/// Converts upstream epoch seconds to an ISO-8601 instant. Only the leading
/// integer counts, so fractional seconds are truncated toward zero.
fn epoch_seconds_to_iso(seconds: Option<&str>) -> Result<String, TimeFallback> {
    let seconds = seconds.ok_or(TimeFallback::Missing)?;
    let secs = leading_integer(seconds)?;
    let instant = secs
        .checked_mul(1000)
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or(TimeFallback::OutOfRange)?;
    Ok(format_instant(instant))
}

/// Parses an optional sign and the digits that follow it, ignoring anything
/// after the first non-digit (`"1688464484.1787"` is `1688464484`).
fn leading_integer(value: &str) -> Result<i64, TimeFallback> {
    let value = value.trim();
    let unsigned = value.trim_start_matches(['+', '-']);
    let sign_len = value.len() - unsigned.len();
    if sign_len > 1 {
        return Err(TimeFallback::Unparseable);
    }

    let digits = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if digits == 0 {
        return Err(TimeFallback::Unparseable);
    }

    value[..sign_len + digits]
        .parse::<i64>()
        .map_err(|_| TimeFallback::OutOfRange)
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(time: &str) -> LedgerEntry {
        LedgerEntry {
            refid: Some("R1".into()),
            time: Some(time.into()),
            kind: Some("deposit".into()),
            subtype: None,
            aclass: Some("currency".into()),
            asset: Some("XBT".into()),
            amount: Some("1.5".into()),
            fee: Some("0".into()),
            balance: Some("10".into()),
        }
    }

    #[test]
    fn test_normalize_deposit() {
        let record = normalize(&entry("1700000000"));

        assert_eq!(
            record,
            NormalizedRecord {
                amount: "1.5".into(),
                asset: "XBT".into(),
                balance: "10".into(),
                fee: "0".into(),
                refid: "R1".into(),
                time: "2023-11-14T22:13:20.000Z".into(),
                kind: "deposit".into(),
            }
        );
    }

    #[test]
    fn test_serialized_shape() {
        let record = normalize(&entry("1700000000"));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "amount": "1.5",
                "asset": "XBT",
                "balance": "10",
                "fee": "0",
                "refid": "R1",
                "time": "2023-11-14T22:13:20.000Z",
                "type": "deposit",
            })
        );
    }

    #[test]
    fn test_fractional_and_negative_times() {
        assert_eq!(
            normalize(&entry("1688464484.1787")).time,
            "2023-07-04T09:54:44.000Z"
        );
        assert_eq!(
            normalize(&entry("1700000000.001")).time,
            "2023-11-14T22:13:20.000Z"
        );
        assert_eq!(
            normalize(&entry("1700000000.999")).time,
            "2023-11-14T22:13:20.000Z"
        );
        assert_eq!(normalize(&entry("-1")).time, "1969-12-31T23:59:59.000Z");
        assert_eq!(normalize(&entry("-1.5")).time, "1969-12-31T23:59:59.000Z");
        assert_eq!(normalize(&entry(" 1700000000 ")).time, "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn test_numeric_time_is_truncated() {
        let mut raw = entry("0");
        raw.time = Some(serde_json::from_str("1688464484.1787").unwrap());
        assert_eq!(normalize(&raw).time, "2023-07-04T09:54:44.000Z");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let record = normalize(&LedgerEntry::default());

        assert_eq!(record.amount, "0");
        assert_eq!(record.balance, "0");
        assert_eq!(record.fee, "0");
        assert_eq!(record.asset, "");
        assert_eq!(record.refid, "");
        assert_eq!(record.kind, "");
        assert_eq!(record.time, "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_unparseable_time() {
        for time in ["yesterday", "", ".5", "--1", "+-1"] {
            let (record, fallback) = normalize_checked(&entry(time));
            assert_eq!(record.time, "1970-01-01T00:00:00.000Z", "{time:?}");
            assert_eq!(fallback, Some(TimeFallback::Unparseable), "{time:?}");
        }
    }

    #[test]
    fn test_out_of_range_time_is_reported() {
        for time in ["99999999999999", "9223372036854775808", "-99999999999999"] {
            let (record, fallback) = normalize_checked(&entry(time));
            assert_eq!(record.time, "1970-01-01T00:00:00.000Z", "{time:?}");
            assert_eq!(fallback, Some(TimeFallback::OutOfRange), "{time:?}");
        }
    }

    #[test]
    fn test_fallback_reasons() {
        assert_eq!(normalize_checked(&entry("1700000000")).1, None);
        assert_eq!(
            normalize_checked(&LedgerEntry::default()).1,
            Some(TimeFallback::Missing)
        );
        assert_eq!(TimeFallback::OutOfRange.to_string(), "out of range");
    }
}
