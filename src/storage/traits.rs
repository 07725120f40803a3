//! Sink trait and error types

use crate::extract::ProductRecord;
use crate::state::CrawlRequest;
use crate::storage::{PartitionSummary, SavedRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid timestamp in stored record: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Append-only, brand-partitioned record store
///
/// Implementations are shared by every worker and must accept concurrent
/// appends, including to the same partition, without losing any.
pub trait RecordSink: Send + Sync {
    /// Appends a record to its brand partition, stamping it with the
    /// capture time
    ///
    /// No deduplication: a product appended twice is stored twice.
    fn append(&self, record: ProductRecord) -> StorageResult<SavedRecord>;

    /// Every partition with its record count, ordered by key
    fn partitions(&self) -> StorageResult<Vec<PartitionSummary>>;

    /// Records of one partition in append order
    fn records(&self, partition: &str) -> StorageResult<Vec<SavedRecord>>;

    /// Total number of records across all partitions
    fn count(&self) -> StorageResult<u64> {
        Ok(self.partitions()?.iter().map(|p| p.records).sum())
    }
}

/// A request read back from a stored frontier
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Key of the stored row
    pub key: i64,
    pub request: CrawlRequest,
    pub retries: u32,
}

/// Durable copy of the crawl frontier
///
/// A request stays stored from the moment it is enqueued until its handler
/// is done with it, so an interrupted crawl can pick up where it stopped.
pub trait FrontierStore: Send + Sync {
    /// Stores a request behind every request already stored
    ///
    /// Returns the key used to remove it again.
    fn add_to_frontier(&self, request: &CrawlRequest, retries: u32) -> StorageResult<i64>;

    /// Removes a request whose handler has finished
    fn remove_from_frontier(&self, key: i64) -> StorageResult<()>;

    /// Every stored request of the current run, oldest first
    fn load_frontier(&self) -> StorageResult<Vec<PendingRequest>>;

    /// Removes every stored request
    fn clear_frontier(&self) -> StorageResult<()>;
}
