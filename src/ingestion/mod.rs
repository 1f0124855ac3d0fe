//! Ingestion - Row sources and the merger that writes them into tables
//!
//! A row source yields records (header -> value) one at a time from a CSV
//! file or a spreadsheet worksheet. The merger drains a source into an
//! existing table in batched transactions.

pub mod csv_source;
pub mod merger;
pub mod source;
pub mod xls_source;

pub use csv_source::CsvSource;
pub use merger::{MergeReport, MergeStatus, Merger, DEFAULT_BATCH_SIZE};
pub use source::{Records, RowSource};
pub use xls_source::XlsSource;

use crate::db::Database;
use crate::error::{EditorError, Result};
use std::path::Path;
use tracing::debug;

const CSV_EXTENSIONS: &[&str] = &["csv", "txt"];
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Open a row source for `path`, picking the reader from the file extension.
///
/// For spreadsheets `worksheet` selects the sheet; without one the first
/// sheet of the workbook is used. CSV files ignore it.
pub fn open_source(path: impl AsRef<Path>, worksheet: Option<&str>) -> Result<Box<dyn RowSource>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    debug!(path = %path.display(), extension = %extension, "Opening row source");

    if CSV_EXTENSIONS.contains(&extension.as_str()) {
        return Ok(Box::new(CsvSource::open(path)?));
    }

    if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        let source = match worksheet {
            Some(worksheet) => XlsSource::open(path, worksheet)?,
            None => XlsSource::open_first(path)?,
        };
        return Ok(Box::new(source));
    }

    Err(EditorError::UnsupportedSource {
        path: path.display().to_string(),
    })
}

/// Merge every record of `source` into the existing table `table_name`.
pub fn import_to_table(
    db: &mut Database,
    table_name: &str,
    source: &mut dyn RowSource,
    batch_size: usize,
) -> Result<MergeReport> {
    let table = db.get_table(table_name)?;
    Merger::new(table)
        .with_batch_size(batch_size)
        .merge(db, source)
}
