pub mod config;
pub mod error;
pub mod value;

// Bulk row ingestion (CSV and spreadsheet sources, batched merge)
pub mod ingestion;

// Table building and the in-progress builder registry
pub mod schema;

// Database module for SQLite
pub mod db;

pub use config::EditorConfig;
pub use db::{Database, TableHandle};
pub use error::{EditorError, Result};
pub use ingestion::{import_to_table, open_source, MergeReport, Merger, RowSource};
pub use schema::{BuilderRegistry, ColumnDef, ColumnType, TableBuilder};
pub use value::{Record, Value};
