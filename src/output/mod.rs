//! Output module for crawl reports and record exports
//!
//! This module handles:
//! - Printing the counters of a finished crawl
//! - Per-partition statistics read back from a record sink
//! - Exporting partitions as JSON files

mod export;
pub mod stats;

pub use export::export_partitions;
pub use stats::{load_statistics, print_report, print_statistics, SinkStatistics};
