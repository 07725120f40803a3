//! SQLite sink implementation
//!
//! This module provides a SQLite-based implementation of the RecordSink
//! and FrontierStore traits, plus run bookkeeping.

use crate::extract::ProductRecord;
use crate::state::{Continuation, CrawlRequest};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    FrontierStore, PendingRequest, RecordSink, StorageError, StorageResult,
};
use crate::storage::{PartitionSummary, RunRecord, RunStatus, SavedRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct SinkState {
    conn: Connection,
    run_id: Option<i64>,
}

/// SQLite record sink
///
/// One connection guarded by a mutex; appends from concurrent workers are
/// serialized, so none is lost.
pub struct SqliteSink {
    state: Mutex<SinkState>,
}

impl SqliteSink {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self::from_connection(conn))
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            state: Mutex::new(SinkState { conn, run_id: None }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Run Management =====

    /// Starts a new run; records appended from now on belong to it
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    pub fn begin_run(&self, config_hash: &str) -> StorageResult<i64> {
        let mut state = self.lock();
        let now = Utc::now().to_rfc3339();
        state.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        let run_id = state.conn.last_insert_rowid();
        state.run_id = Some(run_id);
        Ok(run_id)
    }

    /// Makes an earlier run current again so an interrupted crawl can go on
    ///
    /// The run is marked running and its finish timestamp cleared; records
    /// and frontier rows from now on belong to it.
    pub fn resume_run(&self, run_id: i64) -> StorageResult<()> {
        let mut state = self.lock();
        let updated = state.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = NULL WHERE id = ?2",
            params![RunStatus::Running.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        state.run_id = Some(run_id);
        Ok(())
    }

    /// Closes the current run with a final status and finish timestamp
    pub fn finish_run(&self, status: RunStatus) -> StorageResult<()> {
        let mut state = self.lock();
        let Some(run_id) = state.run_id.take() else {
            return Err(StorageError::Database("no run in progress".to_string()));
        };

        let now = Utc::now().to_rfc3339();
        state.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        Ok(())
    }

    /// Gets a run by ID
    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let state = self.lock();
        state
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    /// Gets the most recent run
    pub fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let state = self.lock();
        let run = state
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }
}

impl RecordSink for SqliteSink {
    fn append(&self, record: ProductRecord) -> StorageResult<SavedRecord> {
        let payload = serde_json::to_string(&record)?;
        let saved = SavedRecord::new(record);

        let state = self.lock();
        state.conn.execute(
            "INSERT INTO records (run_id, partition_key, product_id, payload, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                state.run_id,
                saved.partition(),
                saved.record.id,
                payload,
                saved.saved_at.to_rfc3339()
            ],
        )?;

        Ok(saved)
    }

    fn partitions(&self) -> StorageResult<Vec<PartitionSummary>> {
        let state = self.lock();
        let mut stmt = state.conn.prepare(
            "SELECT partition_key, COUNT(*) FROM records GROUP BY partition_key ORDER BY partition_key",
        )?;

        let partitions = stmt
            .query_map([], |row| {
                Ok(PartitionSummary {
                    partition: row.get(0)?,
                    records: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(partitions)
    }

    fn records(&self, partition: &str) -> StorageResult<Vec<SavedRecord>> {
        let state = self.lock();
        let mut stmt = state.conn.prepare(
            "SELECT payload, saved_at FROM records WHERE partition_key = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![partition], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(payload, saved_at)| {
                Ok::<_, StorageError>(SavedRecord {
                    record: serde_json::from_str(&payload)?,
                    saved_at: DateTime::parse_from_rfc3339(&saved_at)?.with_timezone(&Utc),
                })
            })
            .collect()
    }

    fn count(&self) -> StorageResult<u64> {
        let state = self.lock();
        let count: i64 = state
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl FrontierStore for SqliteSink {
    fn add_to_frontier(&self, request: &CrawlRequest, retries: u32) -> StorageResult<i64> {
        let continuation = serde_json::to_string(&request.continuation)?;

        let state = self.lock();
        state.conn.execute(
            "INSERT INTO frontier (run_id, url, continuation, retries) VALUES (?1, ?2, ?3, ?4)",
            params![state.run_id, request.url, continuation, retries],
        )?;
        Ok(state.conn.last_insert_rowid())
    }

    fn remove_from_frontier(&self, key: i64) -> StorageResult<()> {
        let state = self.lock();
        state
            .conn
            .execute("DELETE FROM frontier WHERE id = ?1", params![key])?;
        Ok(())
    }

    fn load_frontier(&self) -> StorageResult<Vec<PendingRequest>> {
        let state = self.lock();
        let mut stmt = state.conn.prepare(
            "SELECT id, url, continuation, retries FROM frontier WHERE run_id IS ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![state.run_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(key, url, continuation, retries)| {
                let continuation: Continuation = serde_json::from_str(&continuation)?;
                Ok::<_, StorageError>(PendingRequest {
                    key,
                    request: CrawlRequest { url, continuation },
                    retries,
                })
            })
            .collect()
    }

    fn clear_frontier(&self) -> StorageResult<()> {
        let state = self.lock();
        state.conn.execute("DELETE FROM frontier", [])?;
        Ok(())
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
    })
}
