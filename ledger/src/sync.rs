//! Drains the exchange ledger, normalizes it and persists every record.

use crate::drain::{DrainError, DrainLimits, PageResult, drain_all};
use crate::metrics_defs::{STORED_RECORDS, SYNC_PERSIST_FAILURES};
use crate::normalize::{NormalizedRecord, TimeFallback, normalize_checked};
use crate::store::{DurableStore, StorageError};
use shared::{counter, gauge};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use upstream::{ExchangeApi, UpstreamError};

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("ledger drain failed: {0}")]
    Drain(#[from] DrainError<UpstreamError>),
    #[error("{failed} of {total} records could not be stored: {source}")]
    Persist {
        failed: usize,
        total: usize,
        #[source]
        source: StorageError,
    },
    #[error("persistence task panicked: {0}")]
    TaskPanicked(String),
}

/// Writes in flight at once unless overridden.
pub const DEFAULT_WRITE_CONCURRENCY: usize = 8;

pub struct LedgerSync {
    exchange: Arc<dyn ExchangeApi>,
    store: Arc<dyn DurableStore>,
    limits: DrainLimits,
    write_concurrency: usize,
}

impl LedgerSync {
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        store: Arc<dyn DurableStore>,
        limits: DrainLimits,
    ) -> Self {
        LedgerSync {
            exchange,
            store,
            limits,
            write_concurrency: DEFAULT_WRITE_CONCURRENCY,
        }
    }

    /// Caps how many upserts wait on the store at once. Zero is treated as one.
    pub fn with_write_concurrency(mut self, write_concurrency: usize) -> Self {
        self.write_concurrency = write_concurrency.max(1);
        self
    }

    /// Runs one full sync and returns the normalized records in merged-ledger
    /// order.
    ///
    /// Writes run concurrently, at most `write_concurrency` at a time, and all
    /// of them are awaited before returning.
    /// A single failed write fails the sync; writes that succeeded are kept.
    pub async fn sync_ledger(&self) -> Result<Vec<NormalizedRecord>, SyncError> {
        let exchange = &self.exchange;
        let ledger = drain_all(&self.limits, move |offset| async move {
            let page = exchange.fetch_ledger(offset).await?;
            Ok::<_, UpstreamError>(PageResult {
                items: page.ledger,
                offset,
            })
        })
        .await?;

        let records: Vec<NormalizedRecord> = ledger
            .records
            .iter()
            .map(|(ledger_id, raw)| {
                let (record, fallback) = normalize_checked(raw);
                match fallback {
                    None | Some(TimeFallback::Missing) => {}
                    Some(reason) => tracing::warn!(
                        %ledger_id,
                        time = ?raw.time,
                        %reason,
                        "Unusable ledger time, using the unix epoch"
                    ),
                }
                record
            })
            .collect();
        self.persist_all(&records).await?;

        match self.store.count().await {
            Ok(stored) => gauge!(STORED_RECORDS).set(stored as f64),
            Err(e) => tracing::warn!(error = %e, "Could not count stored records"),
        }

        tracing::info!(records = records.len(), "Ledger sync complete");
        Ok(records)
    }

    async fn persist_all(&self, records: &[NormalizedRecord]) -> Result<(), SyncError> {
        let mut join_set = JoinSet::new();
        let write_permits = Arc::new(Semaphore::new(self.write_concurrency));

        for record in records.iter().cloned() {
            let store = self.store.clone();
            let write_permits = write_permits.clone();
            join_set.spawn(async move {
                // The semaphore is never closed.
                let _permit = write_permits.acquire_owned().await;
                let result = store.upsert(&record).await;
                (record.refid, result)
            });
        }

        let total = records.len();
        let mut failed = 0;
        let mut first_error = None;
        let mut panicked = None;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((refid, Err(e))) => {
                    tracing::error!(%refid, error = %e, "Failed to store ledger record");
                    counter!(SYNC_PERSIST_FAILURES).increment(1);
                    failed += 1;
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    tracing::error!("Task panicked: {}", e);
                    counter!(SYNC_PERSIST_FAILURES).increment(1);
                    panicked.get_or_insert(e.to_string());
                }
            }
        }

        if let Some(message) = panicked {
            return Err(SyncError::TaskPanicked(message));
        }

        match first_error {
            Some(source) => Err(SyncError::Persist {
                failed,
                total,
                source,
            }),
            None => Ok(()),
        }
    }
}
