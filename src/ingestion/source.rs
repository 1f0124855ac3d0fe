//! Row Source trait - Abstract interface for tabular inputs

use crate::error::{EditorError, Result};
use crate::value::Record;

/// A lazy, finite, non-restartable sequence of records read from an
/// external resource.
///
/// Implementations:
/// - CsvSource: delimited text with a header line
/// - XlsSource: one worksheet of a spreadsheet workbook
pub trait RowSource {
    /// Produce the next record, or `EditorError::Exhausted` once the
    /// resource has no more rows. Every call after exhaustion returns
    /// `Exhausted` again.
    fn produce_next(&mut self) -> Result<Record>;

    /// Field names established from the first line/row of the resource.
    fn columns(&self) -> &[String];

    /// Source type (e.g. "csv", "spreadsheet")
    fn source_type(&self) -> &str;

    /// Iterate over the remaining records. Iteration ends at exhaustion;
    /// any other error is yielded once and ends the iteration too.
    fn records(&mut self) -> Records<'_, Self>
    where
        Self: Sized,
    {
        Records {
            source: self,
            done: false,
        }
    }
}

impl<S: RowSource + ?Sized> RowSource for Box<S> {
    fn produce_next(&mut self) -> Result<Record> {
        (**self).produce_next()
    }

    fn columns(&self) -> &[String] {
        (**self).columns()
    }

    fn source_type(&self) -> &str {
        (**self).source_type()
    }
}

/// Iterator adapter returned by [`RowSource::records`].
pub struct Records<'a, S: RowSource + ?Sized> {
    source: &'a mut S,
    done: bool,
}

impl<S: RowSource + ?Sized> Iterator for Records<'_, S> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.source.produce_next() {
            Ok(record) => Some(Ok(record)),
            Err(EditorError::Exhausted) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
