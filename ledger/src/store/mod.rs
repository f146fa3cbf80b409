//! Durable storage for normalized ledger records.
//!
//! Writes are upserts keyed by `refid`, so replaying a sync converges to one
//! stored copy per record instead of duplicating.

use crate::normalize::NormalizedRecord;
use async_trait::async_trait;

mod memory;
mod sql;

pub use memory::MemoryStore;
pub use sql::SqlStore;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Inserts `record`, or replaces the stored record with the same `refid`.
    async fn upsert(&self, record: &NormalizedRecord) -> Result<(), StorageError>;

    /// Number of distinct records stored.
    async fn count(&self) -> Result<u64, StorageError>;
}
