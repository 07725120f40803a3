//! Partition export
//!
//! Writes every brand partition to `<dir>/<partition>.json` as a pretty
//! printed JSON array, records in append order.

use crate::storage::{RecordSink, StorageResult};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Exports all partitions of `sink` into `dir`, creating it if needed
///
/// # Returns
///
/// The paths of the written files, ordered by partition key
pub fn export_partitions(sink: &dyn RecordSink, dir: &Path) -> StorageResult<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for summary in sink.partitions()? {
        let records = sink.records(&summary.partition)?;
        let path = dir.join(format!("{}.json", summary.partition));

        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &records)?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        tracing::debug!("Exported {} records to {}", records.len(), path.display());
        written.push(path);
    }

    Ok(written)
}
