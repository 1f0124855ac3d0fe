//! Database module for the SQLite connection and catalog operations
//!
//! This module wraps the storage engine connection and exposes table
//! introspection, row CRUD, raw statements and DDL to the rest of the crate.

pub mod database;
pub mod uri_builder;

pub use database::{ColumnInfo, Database, QueryResult, TableHandle};
pub use uri_builder::{build_uri, protocol, DatabaseKind, Netloc};

/// Quote an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("name"), "\"name\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
