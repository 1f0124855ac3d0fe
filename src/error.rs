use crate::value::Record;
use std::fmt;
use thiserror::Error;

/// What a colliding table name is already used by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existing {
    /// A builder for the name is still in progress.
    InProgress,
    /// The catalog already has a materialized table with that name.
    Table,
}

impl fmt::Display for Existing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Existing::InProgress => write!(f, "a table builder in progress"),
            Existing::Table => write!(f, "an existing table"),
        }
    }
}

#[derive(Error, Debug)]
pub enum EditorError {
    /// Normal end of a row source. Not a failure.
    #[error("Row source exhausted")]
    Exhausted,

    #[error("Malformed row at line {line}: expected {expected} fields, found {found}")]
    MalformedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Duplicate field name in header: {name}")]
    DuplicateField { name: String },

    #[error("Worksheet not found: {worksheet} (available: {})", .available.join(", "))]
    WorksheetNotFound {
        worksheet: String,
        available: Vec<String>,
    },

    #[error("Unsupported source file: {path}")]
    UnsupportedSource { path: String },

    #[error("Unknown column '{column}' for table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Column '{column}' already exists in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    #[error("Invalid column '{column}': {reason}")]
    InvalidColumn { column: String, reason: String },

    #[error("Name '{name}' collides with {existing}")]
    NameCollision { name: String, existing: Existing },

    #[error("Table '{table}' has no columns")]
    EmptyTable { table: String },

    #[error("No table builder for '{name}'")]
    NotFound { name: String },

    #[error("Table not found: {table}")]
    TableNotFound { table: String },

    #[error("Refusing to address rows of '{table}' with an empty predicate")]
    EmptyPredicate { table: String },

    #[error("Builder registry belongs to a different database")]
    CatalogMismatch,

    #[error("Invalid database URI: {0}")]
    InvalidUri(String),

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        /// The record being written when the store rejected it.
        record: Option<Box<Record>>,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Merge into '{table}' aborted after {committed_rows} committed rows")]
    MergeAborted {
        table: String,
        committed_rows: u64,
        #[source]
        source: Box<EditorError>,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EditorError {
    pub fn storage(message: impl Into<String>, source: rusqlite::Error) -> Self {
        EditorError::Storage {
            message: message.into(),
            record: None,
            source,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, EditorError::Exhausted)
    }

    /// Unwraps `MergeAborted` down to the error that stopped the merge.
    pub fn root_cause(&self) -> &EditorError {
        match self {
            EditorError::MergeAborted { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The record attached to a storage failure, if any.
    pub fn offending_record(&self) -> Option<&Record> {
        match self.root_cause() {
            EditorError::Storage { record, .. } => record.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_merge_aborted() {
        let err = EditorError::MergeAborted {
            table: "second".to_string(),
            committed_rows: 3,
            source: Box::new(EditorError::MalformedRow {
                line: 5,
                expected: 2,
                found: 3,
            }),
        };

        assert!(matches!(
            err.root_cause(),
            EditorError::MalformedRow { line: 5, .. }
        ));
        assert!(err.offending_record().is_none());
        assert_eq!(
            err.to_string(),
            "Merge into 'second' aborted after 3 committed rows"
        );
    }

    #[test]
    fn test_worksheet_not_found_lists_available_sheets() {
        let err = EditorError::WorksheetNotFound {
            worksheet: "Missing".to_string(),
            available: vec!["Sheet1".to_string(), "Types".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Worksheet not found: Missing (available: Sheet1, Types)"
        );
    }
}
