//! Schema building - describe a table, then materialize it
//!
//! Column definitions accumulate in a `TableBuilder`; a `BuilderRegistry`
//! tracks the builders in progress for one database and turns them into
//! real tables.

pub mod column;
pub mod registry;
pub mod table_builder;

pub use column::{ColumnDef, ColumnType, Constraints};
pub use registry::BuilderRegistry;
pub use table_builder::{TableBuilder, TableDefinition};
