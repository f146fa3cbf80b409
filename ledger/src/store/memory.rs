use super::{DurableStore, StorageError};
use crate::normalize::NormalizedRecord;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Keeps records in process memory. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, NormalizedRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, refid: &str) -> Option<NormalizedRecord> {
        self.records.read().get(refid).cloned()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn upsert(&self, record: &NormalizedRecord) -> Result<(), StorageError> {
        self.records
            .write()
            .insert(record.refid.clone(), record.clone());
        Ok(())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(self.records.read().len() as u64)
    }
}
