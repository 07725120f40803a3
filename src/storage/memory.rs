//! In-memory sink, for tests and callers that need no persistence

use crate::extract::ProductRecord;
use crate::storage::traits::{RecordSink, StorageResult};
use crate::storage::{PartitionSummary, SavedRecord};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Keeps every partition in a map guarded by one mutex
#[derive(Debug, Default)]
pub struct MemorySink {
    partitions: Mutex<BTreeMap<String, Vec<SavedRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordSink for MemorySink {
    fn append(&self, record: ProductRecord) -> StorageResult<SavedRecord> {
        let saved = SavedRecord::new(record);
        self.partitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(saved.partition())
            .or_default()
            .push(saved.clone());
        Ok(saved)
    }

    fn partitions(&self) -> StorageResult<Vec<PartitionSummary>> {
        let partitions = self.partitions.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(partitions
            .iter()
            .map(|(partition, records)| PartitionSummary {
                partition: partition.clone(),
                records: records.len() as u64,
            })
            .collect())
    }

    fn records(&self, partition: &str) -> StorageResult<Vec<SavedRecord>> {
        let partitions = self.partitions.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(partitions.get(partition).cloned().unwrap_or_default())
    }
}
