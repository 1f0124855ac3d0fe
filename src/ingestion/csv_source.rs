//! CSV Source - Reads delimited text into records, one line at a time

use crate::error::{EditorError, Result};
use crate::ingestion::source::RowSource;
use crate::value::{Record, Value};
use csv::{Reader, ReaderBuilder, StringRecord};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// CSV Source - The first line is the header; every following line becomes
/// one record of text values zipped with that header.
pub struct CsvSource<R: Read> {
    reader: Reader<R>,
    header: Arc<[String]>,
    buffer: StringRecord,
    exhausted: bool,
}

impl CsvSource<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening CSV source");
        Self::from_reader(File::open(path)?)
    }
}

impl<'a> CsvSource<&'a [u8]> {
    pub fn from_text(text: &'a str) -> Result<Self> {
        Self::from_reader(text.as_bytes())
    }
}

impl<R: Read> CsvSource<R> {
    pub fn from_reader(reader: R) -> Result<Self> {
        // Row lengths are checked here rather than by the csv crate so the
        // error can name the line and both counts.
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut seen = HashSet::new();
        for name in &header {
            if !seen.insert(name.as_str()) {
                return Err(EditorError::DuplicateField { name: name.clone() });
            }
        }

        Ok(Self {
            reader,
            header: header.into(),
            buffer: StringRecord::new(),
            exhausted: false,
        })
    }
}

impl<R: Read> RowSource for CsvSource<R> {
    fn produce_next(&mut self) -> Result<Record> {
        if self.exhausted {
            return Err(EditorError::Exhausted);
        }

        if !self.reader.read_record(&mut self.buffer)? {
            self.exhausted = true;
            return Err(EditorError::Exhausted);
        }

        if self.buffer.len() != self.header.len() {
            let line = self.buffer.position().map(|p| p.line()).unwrap_or(0);
            return Err(EditorError::MalformedRow {
                line,
                expected: self.header.len(),
                found: self.buffer.len(),
            });
        }

        let values = self
            .buffer
            .iter()
            .map(|field| Value::Text(field.to_string()))
            .collect();

        Ok(Record::from_parts(Arc::clone(&self.header), values))
    }

    fn columns(&self) -> &[String] {
        &self.header
    }

    fn source_type(&self) -> &str {
        "csv"
    }
}
