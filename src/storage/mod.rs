//! Storage module for persisting product records
//!
//! This module handles the record sink, including:
//! - The `RecordSink` trait shared by all backends
//! - SQLite database initialization and run tracking
//! - The durable frontier an interrupted crawl resumes from
//! - An in-memory sink for tests and embedding callers
//! - Brand partition keys

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemorySink;
pub use sqlite::SqliteSink;
pub use traits::{FrontierStore, PendingRequest, RecordSink, StorageError, StorageResult};

use crate::extract::ProductRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Partition used when a brand name has no alphanumeric characters
pub const UNKNOWN_PARTITION: &str = "unknown";

/// Opens or creates the record database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
pub fn open_sink(path: &Path) -> StorageResult<SqliteSink> {
    SqliteSink::open(path)
}

/// Derives the partition key of a brand
///
/// Case-folds the name and drops every character outside `[a-z0-9]`.
///
/// # Examples
///
/// ```
/// use catalog_sweep::storage::partition_key;
///
/// assert_eq!(partition_key("Drunk Elephant"), "drunkelephant");
/// assert_eq!(partition_key("SK-II"), "skii");
/// assert_eq!(partition_key("???"), "unknown");
/// ```
pub fn partition_key(brand: &str) -> String {
    let key: String = brand
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();

    if key.is_empty() {
        UNKNOWN_PARTITION.to_string()
    } else {
        key
    }
}

/// A record as stored in its partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRecord {
    #[serde(flatten)]
    pub record: ProductRecord,

    /// Capture time, set when the record was appended
    pub saved_at: DateTime<Utc>,
}

impl SavedRecord {
    pub fn new(record: ProductRecord) -> Self {
        Self {
            record,
            saved_at: Utc::now(),
        }
    }

    pub fn partition(&self) -> String {
        partition_key(&self.record.brand)
    }
}

/// Number of records stored under one partition key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSummary {
    pub partition: String,
    pub records: u64,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }

    /// Returns true if a crawl stopped in this state can be picked up again
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Running | Self::Aborted)
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
