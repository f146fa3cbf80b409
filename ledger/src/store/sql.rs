//! SQL backed record store (SQLite or MySQL through the sqlx `Any` driver).
//!
//! ```sql
//! CREATE TABLE ledger_entries (
//!   refid VARCHAR(64) PRIMARY KEY,
//!   amount VARCHAR(64) NOT NULL,
//!   asset VARCHAR(32) NOT NULL,
//!   balance VARCHAR(64) NOT NULL,
//!   fee VARCHAR(64) NOT NULL,
//!   time VARCHAR(32) NOT NULL,   -- ISO-8601, sorts chronologically
//!   entry_type VARCHAR(32) NOT NULL
//! )
//! ```
//!
//! Amounts stay text so the upstream's decimal strings round-trip unchanged.

use super::{DurableStore, StorageError};
use crate::normalize::NormalizedRecord;
use async_trait::async_trait;
use sqlx::{AnyPool, Row, any::AnyPoolOptions};
use std::sync::Once;
use std::time::Duration;

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

pub struct SqlStore {
    pool: AnyPool,
    is_sqlite: bool,
}

impl SqlStore {
    /// Connects to `connection_string` (`sqlite://...` or `mysql://...`) and
    /// creates the table if it does not exist.
    pub async fn connect(connection_string: &str) -> Result<Self, StorageError> {
        install_drivers();

        let is_sqlite = connection_string.starts_with("sqlite:");

        let pool = AnyPoolOptions::new()
            .max_connections(if is_sqlite { 1 } else { 20 })
            .acquire_timeout(Duration::from_secs(10))
            .connect(connection_string)
            .await?;

        let store = Self { pool, is_sqlite };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let sql = if self.is_sqlite {
            r#"
            CREATE TABLE IF NOT EXISTS ledger_entries (
                refid TEXT PRIMARY KEY,
                amount TEXT NOT NULL,
                asset TEXT NOT NULL,
                balance TEXT NOT NULL,
                fee TEXT NOT NULL,
                time TEXT NOT NULL,
                entry_type TEXT NOT NULL
            )
            "#
        } else {
            r#"
            CREATE TABLE IF NOT EXISTS ledger_entries (
                refid VARCHAR(64) PRIMARY KEY,
                amount VARCHAR(64) NOT NULL,
                asset VARCHAR(32) NOT NULL,
                balance VARCHAR(64) NOT NULL,
                fee VARCHAR(64) NOT NULL,
                time VARCHAR(32) NOT NULL,
                entry_type VARCHAR(32) NOT NULL,
                INDEX idx_time (time)
            )
            "#
        };

        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn get(&self, refid: &str) -> Result<Option<NormalizedRecord>, StorageError> {
        let row = sqlx::query(
            "SELECT refid, amount, asset, balance, fee, time, entry_type \
             FROM ledger_entries WHERE refid = ?",
        )
        .bind(refid)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(NormalizedRecord {
            refid: row.try_get("refid")?,
            amount: row.try_get("amount")?,
            asset: row.try_get("asset")?,
            balance: row.try_get("balance")?,
            fee: row.try_get("fee")?,
            time: row.try_get("time")?,
            kind: row.try_get("entry_type")?,
        }))
    }
}

#[async_trait]
impl DurableStore for SqlStore {
    async fn upsert(&self, record: &NormalizedRecord) -> Result<(), StorageError> {
        let sql = if self.is_sqlite {
            "INSERT INTO ledger_entries (refid, amount, asset, balance, fee, time, entry_type) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(refid) DO UPDATE SET \
                amount = excluded.amount, \
                asset = excluded.asset, \
                balance = excluded.balance, \
                fee = excluded.fee, \
                time = excluded.time, \
                entry_type = excluded.entry_type"
        } else {
            "INSERT INTO ledger_entries (refid, amount, asset, balance, fee, time, entry_type) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE \
                amount = VALUES(amount), \
                asset = VALUES(asset), \
                balance = VALUES(balance), \
                fee = VALUES(fee), \
                time = VALUES(time), \
                entry_type = VALUES(entry_type)"
        };

        sqlx::query(sql)
            .bind(record.refid.as_str())
            .bind(record.amount.as_str())
            .bind(record.asset.as_str())
            .bind(record.balance.as_str())
            .bind(record.fee.as_str())
            .bind(record.time.as_str())
            .bind(record.kind.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM ledger_entries")
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }
}
