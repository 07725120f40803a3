//! Statistics generation from the record database
//!
//! This module provides functionality for extracting and displaying
//! per-partition statistics from a record sink.

use crate::crawler::CrawlReport;
use crate::storage::{PartitionSummary, RecordSink, RunRecord, StorageResult};

/// Record sink statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct SinkStatistics {
    /// Total number of records across all partitions
    pub total_records: u64,

    /// Record count of every partition, ordered by key
    pub partitions: Vec<PartitionSummary>,
}

impl SinkStatistics {
    /// The partitions holding the most records, largest first
    pub fn largest(&self, n: usize) -> Vec<&PartitionSummary> {
        let mut by_size: Vec<_> = self.partitions.iter().collect();
        by_size.sort_by(|a, b| b.records.cmp(&a.records).then(a.partition.cmp(&b.partition)));
        by_size.truncate(n);
        by_size
    }
}

/// Loads statistics from a sink
///
/// # Arguments
///
/// * `sink` - The record sink to query
pub fn load_statistics(sink: &dyn RecordSink) -> StorageResult<SinkStatistics> {
    let partitions = sink.partitions()?;
    let total_records = partitions.iter().map(|p| p.records).sum();

    Ok(SinkStatistics {
        total_records,
        partitions,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
/// * `run` - The most recent run, if any
pub fn print_statistics(stats: &SinkStatistics, run: Option<&RunRecord>) {
    println!("=== Catalog Statistics ===\n");

    if let Some(run) = run {
        println!("Latest Run:");
        println!("  Run ID: {}", run.id);
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!("  Status: {}", run.status.to_db_string());
        println!();
    }

    println!("Overview:");
    println!("  Total records: {}", stats.total_records);
    println!("  Brand partitions: {}", stats.partitions.len());
    println!();

    if stats.partitions.is_empty() {
        return;
    }

    println!("Records by Partition:");
    for partition in stats.largest(stats.partitions.len()) {
        let percentage = (partition.records as f64 / stats.total_records as f64) * 100.0;
        println!(
            "  {}: {} ({:.1}%)",
            partition.partition, partition.records, percentage
        );
    }
}

/// Prints the counters of a finished crawl
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");
    println!("  Requests handled: {}", report.handled);
    println!("  Requests enqueued: {}", report.enqueued);
    println!("  Records saved: {}", report.saved);
    println!("  Products skipped: {}", report.skipped);
    println!("  Retries: {}", report.retried);
    println!("  Dropped: {}", report.dropped);
}
