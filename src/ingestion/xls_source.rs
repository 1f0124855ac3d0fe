//! Spreadsheet Source - Reads one worksheet of a workbook into records
//!
//! Every cell is converted to its display text, whatever its underlying
//! type. Ingestion stays string-typed and leaves type conversion to the
//! target column's affinity.

use crate::error::{EditorError, Result};
use crate::ingestion::source::RowSource;
use crate::value::{Record, Value, DATETIME_FORMAT};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, DataType, Range, Reader, Sheets};
use std::collections::HashSet;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Spreadsheet Source - The first row of the worksheet is the header.
pub struct XlsSource {
    worksheet: String,
    range: Range<Data>,
    header: Arc<[String]>,
    next_row: usize,
    /// Sheet line number (1-based) of the range's first row
    first_line: u64,
}

impl XlsSource {
    /// Open a workbook file (xlsx, xlsm, xlsb, xls, ods) and select a worksheet.
    pub fn open(path: impl AsRef<Path>, worksheet: &str) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), worksheet, "Opening spreadsheet source");
        let mut workbook = open_workbook_auto(path)?;
        Self::from_workbook(&mut workbook, worksheet)
    }

    /// Open a workbook file and select its first worksheet.
    pub fn open_first(path: impl AsRef<Path>) -> Result<Self> {
        let mut workbook = open_workbook_auto(path.as_ref())?;
        let first = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| EditorError::WorksheetNotFound {
                worksheet: "<first>".to_string(),
                available: Vec::new(),
            })?;
        Self::from_workbook(&mut workbook, &first)
    }

    /// Read a workbook held in memory.
    pub fn from_bytes(bytes: Vec<u8>, worksheet: &str) -> Result<Self> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
        Self::from_workbook(&mut workbook, worksheet)
    }

    fn from_workbook<RS: Read + Seek>(workbook: &mut Sheets<RS>, worksheet: &str) -> Result<Self> {
        let available = workbook.sheet_names();
        if !available.iter().any(|name| name == worksheet) {
            return Err(EditorError::WorksheetNotFound {
                worksheet: worksheet.to_string(),
                available,
            });
        }

        let range = workbook.worksheet_range(worksheet)?;
        Self::from_range(worksheet, range)
    }

    /// Build a source over an already decoded cell range.
    pub fn from_range(worksheet: impl Into<String>, range: Range<Data>) -> Result<Self> {
        // The header ends at its last non-blank cell.
        let width = if range.height() == 0 {
            0
        } else {
            last_filled_column(&range, 0, 0).map_or(0, |col| col + 1)
        };
        let header: Vec<String> = (0..width)
            .map(|col| range.get((0, col)).map(cell_to_text).unwrap_or_default())
            .collect();

        let mut seen = HashSet::new();
        for name in &header {
            if !seen.insert(name.as_str()) {
                return Err(EditorError::DuplicateField { name: name.clone() });
            }
        }

        let first_line = range.start().map_or(1, |(row, _)| u64::from(row) + 1);

        Ok(Self {
            worksheet: worksheet.into(),
            range,
            header: header.into(),
            next_row: 1,
            first_line,
        })
    }

    pub fn worksheet(&self) -> &str {
        &self.worksheet
    }
}

impl RowSource for XlsSource {
    fn produce_next(&mut self) -> Result<Record> {
        if self.next_row >= self.range.height() {
            return Err(EditorError::Exhausted);
        }

        let row = self.next_row;
        self.next_row += 1;

        if let Some(col) = last_filled_column(&self.range, row, self.header.len()) {
            return Err(EditorError::MalformedRow {
                line: self.first_line + row as u64,
                expected: self.header.len(),
                found: col + 1,
            });
        }

        let values = (0..self.header.len())
            .map(|col| {
                let text = self.range.get((row, col)).map(cell_to_text).unwrap_or_default();
                Value::Text(text)
            })
            .collect();

        Ok(Record::from_parts(Arc::clone(&self.header), values))
    }

    fn columns(&self) -> &[String] {
        &self.header
    }

    fn source_type(&self) -> &str {
        "spreadsheet"
    }
}

fn is_blank(cell: Option<&Data>) -> bool {
    match cell {
        None | Some(Data::Empty) => true,
        Some(Data::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Relative index of the last non-blank cell of `row` at or after `from`.
fn last_filled_column(range: &Range<Data>, row: usize, from: usize) -> Option<usize> {
    (from..range.width())
        .rev()
        .find(|&col| !is_blank(range.get((row, col))))
}

/// Display text of a cell, as the spreadsheet would show it.
pub fn cell_to_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => float_to_text(*f),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(dt) => match cell.as_datetime() {
            Some(datetime) => datetime.format(DATETIME_FORMAT).to_string(),
            None => float_to_text(dt.as_f64()),
        },
        Data::Error(e) => e.to_string(),
    }
}

// Workbooks store every number as a float; integral values print without
// the fractional part.
fn float_to_text(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}
