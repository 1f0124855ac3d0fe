//! Merger - Inserts every record of a row source into an existing table
//!
//! Records are written in batches; each batch is one transaction. A batch
//! that fails is rolled back, but batches committed before it stay in the
//! table. The `MergeAborted` error reports how many rows that is.

use crate::db::{Database, TableHandle};
use crate::error::{EditorError, Result};
use crate::ingestion::source::RowSource;
use crate::value::Record;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_BATCH_SIZE: usize = 1024;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum MergeStatus {
    Complete,
    /// Stopped between batches because the interrupt flag was set
    Interrupted,
}

/// Merge result
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeReport {
    /// Merge run ID
    pub run_id: String,

    pub table: String,

    /// Rows committed to the table
    pub rows_inserted: u64,

    pub batches_committed: u64,

    pub status: MergeStatus,
}

/// Merger - Appends rows to one target table. It never updates existing
/// rows.
pub struct Merger {
    table: TableHandle,
    batch_size: usize,
    interrupt: Option<Arc<AtomicBool>>,
}

impl Merger {
    pub fn new(table: TableHandle) -> Self {
        Self {
            table,
            batch_size: DEFAULT_BATCH_SIZE,
            interrupt: None,
        }
    }

    /// Rows per transaction (at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// A flag checked before every batch; once set, the merge stops with
    /// `MergeStatus::Interrupted` and keeps what it has committed.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn table(&self) -> &TableHandle {
        &self.table
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn check_columns(&self, columns: &[String]) -> Result<()> {
        match columns.iter().find(|c| !self.table.has_column(c)) {
            Some(column) => Err(EditorError::UnknownColumn {
                table: self.table.name().to_string(),
                column: column.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Drive `source` to exhaustion, inserting each record as a new row.
    ///
    /// Column names are validated before anything is written, so an unknown
    /// column leaves the table untouched. Any later failure rolls back the
    /// current batch and returns `MergeAborted` with the number of rows
    /// already committed.
    pub fn merge<S: RowSource + ?Sized>(&self, db: &mut Database, source: &mut S) -> Result<MergeReport> {
        let run_id = Uuid::new_v4().to_string();
        let table = self.table.name().to_string();

        self.check_columns(source.columns())?;

        info!(
            run_id = %run_id,
            table = %table,
            source = source.source_type(),
            batch_size = self.batch_size,
            "Starting merge"
        );

        let mut report = MergeReport {
            run_id,
            table,
            rows_inserted: 0,
            batches_committed: 0,
            status: MergeStatus::Complete,
        };

        let mut batch: Vec<Record> = Vec::with_capacity(self.batch_size.min(DEFAULT_BATCH_SIZE));
        let mut exhausted = false;

        while !exhausted {
            if self.interrupted() {
                warn!(run_id = %report.run_id, rows = report.rows_inserted, "Merge interrupted");
                report.status = MergeStatus::Interrupted;
                return Ok(report);
            }

            batch.clear();
            while batch.len() < self.batch_size {
                match source.produce_next() {
                    Ok(record) => {
                        if let Err(e) = self.check_columns(record.keys()) {
                            return Err(self.abort(&report, e));
                        }
                        batch.push(record);
                    }
                    Err(EditorError::Exhausted) => {
                        exhausted = true;
                        break;
                    }
                    Err(e) => return Err(self.abort(&report, e)),
                }
            }

            if batch.is_empty() {
                break;
            }

            if let Err(e) = db.insert_batch(self.table.name(), &batch) {
                return Err(self.abort(&report, e));
            }

            report.rows_inserted += batch.len() as u64;
            report.batches_committed += 1;
            debug!(
                run_id = %report.run_id,
                batch = report.batches_committed,
                rows = batch.len(),
                "Committed batch"
            );
        }

        info!(
            run_id = %report.run_id,
            rows = report.rows_inserted,
            batches = report.batches_committed,
            "Merge complete"
        );
        Ok(report)
    }

    fn abort(&self, report: &MergeReport, cause: EditorError) -> EditorError {
        warn!(
            run_id = %report.run_id,
            committed_rows = report.rows_inserted,
            error = %cause,
            "Merge aborted"
        );
        EditorError::MergeAborted {
            table: report.table.clone(),
            committed_rows: report.rows_inserted,
            source: Box::new(cause),
        }
    }
}
