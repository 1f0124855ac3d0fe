//! Table Builder - Accumulates the columns of a table before it exists
//!
//! Building is two-phase: columns are added one at a time (the UI can render
//! an empty grid from `column_names()` meanwhile), then `describe` turns them
//! into a `TableDefinition` and `materialize` issues the DDL.

use crate::db::{quote_ident, Database, TableHandle};
use crate::error::{EditorError, Result};
use crate::schema::column::ColumnDef;
use itertools::Itertools;
use serde::Serialize;

/// A complete, validated description of a table, ready for DDL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDefinition {
    name: String,
    columns: Vec<ColumnDef>,
    primary_key: Vec<String>,
}

impl TableDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// The `CREATE TABLE` statement for this definition. A single-column
    /// primary key is declared inline, a composite one as a table constraint.
    pub fn create_sql(&self) -> String {
        let inline_pk = self.primary_key.len() == 1;
        let mut clauses: Vec<String> = self
            .columns
            .iter()
            .map(|c| c.to_sql(inline_pk && c.is_primary_key()))
            .collect();

        if self.primary_key.len() > 1 {
            clauses.push(format!(
                "PRIMARY KEY ({})",
                self.primary_key.iter().map(|c| quote_ident(c)).join(", ")
            ));
        }

        format!("CREATE TABLE {} ({})", quote_ident(&self.name), clauses.join(", "))
    }
}

/// Table Builder - Owns the column definitions of one not-yet-created table.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    columns: Vec<ColumnDef>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a column. Fails without touching the builder if the definition is
    /// invalid or its name is already taken.
    pub fn add_column(&mut self, column: ColumnDef) -> Result<()> {
        column.validate()?;

        if self.columns.iter().any(|c| c.name() == column.name()) {
            return Err(EditorError::DuplicateColumn {
                table: self.name.clone(),
                column: column.name().to_string(),
            });
        }

        self.columns.push(column);
        Ok(())
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(ColumnDef::name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Validate the accumulated columns as a whole and produce the table
    /// definition. A table without columns is never described.
    pub fn describe(&self) -> Result<TableDefinition> {
        if self.columns.is_empty() {
            return Err(EditorError::EmptyTable {
                table: self.name.clone(),
            });
        }

        let primary_key: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.is_primary_key())
            .map(|c| c.name().to_string())
            .collect();

        if primary_key.len() > 1 {
            if let Some(column) = self.columns.iter().find(|c| c.constraints().autoincrement) {
                return Err(EditorError::InvalidColumn {
                    column: column.name().to_string(),
                    reason: "autoincrement cannot be part of a composite primary key".to_string(),
                });
            }
        }

        Ok(TableDefinition {
            name: self.name.clone(),
            columns: self.columns.clone(),
            primary_key,
        })
    }

    /// Create the table in the database, consuming the builder.
    pub fn materialize(self, db: &mut Database) -> Result<TableHandle> {
        let definition = self.describe()?;
        db.create_table(&definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::ColumnType;

    fn example_builder() -> TableBuilder {
        let mut builder = TableBuilder::new("example");
        builder
            .add_column(ColumnDef::new("id", ColumnType::Integer).primary_key().autoincrement())
            .unwrap();
        builder
            .add_column(ColumnDef::new("name", ColumnType::Text))
            .unwrap();
        builder
    }

    #[test]
    fn test_add_column_keeps_declaration_order() {
        let mut builder = example_builder();
        builder
            .add_column(ColumnDef::new("amount", ColumnType::Numeric))
            .unwrap();
        assert_eq!(builder.column_names(), vec!["id", "name", "amount"]);
        assert_eq!(builder.column_count(), 3);
    }

    #[test]
    fn test_add_duplicate_column_leaves_builder_unchanged() {
        let mut builder = example_builder();
        let before = builder.columns().to_vec();

        let err = builder
            .add_column(ColumnDef::new("name", ColumnType::Integer))
            .unwrap_err();
        assert!(matches!(
            err,
            EditorError::DuplicateColumn { ref table, ref column } if table == "example" && column == "name"
        ));
        assert_eq!(builder.columns(), before.as_slice());
    }

    #[test]
    fn test_invalid_column_is_not_added() {
        let mut builder = TableBuilder::new("example");
        assert!(builder
            .add_column(ColumnDef::new("id", ColumnType::Integer).autoincrement())
            .is_err());
        assert!(builder.is_empty());
    }

    #[test]
    fn test_empty_builder_cannot_be_described() {
        let builder = TableBuilder::new("example");
        assert!(matches!(
            builder.describe(),
            Err(EditorError::EmptyTable { ref table }) if table == "example"
        ));
    }

    #[test]
    fn test_empty_builder_cannot_be_materialized() {
        let mut db = Database::open_in_memory().unwrap();
        let err = TableBuilder::new("example").materialize(&mut db).unwrap_err();
        assert!(matches!(err, EditorError::EmptyTable { .. }));
        assert!(db.get_tables().unwrap().is_empty());
    }

    #[test]
    fn test_create_sql_inline_primary_key() {
        let definition = example_builder().describe().unwrap();
        assert_eq!(definition.primary_key(), &["id".to_string()]);
        assert_eq!(
            definition.create_sql(),
            "CREATE TABLE \"example\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"name\" TEXT)"
        );
    }

    #[test]
    fn test_create_sql_composite_primary_key() {
        let mut builder = TableBuilder::new("pairs");
        builder
            .add_column(ColumnDef::new("a", ColumnType::Text).primary_key())
            .unwrap();
        builder
            .add_column(ColumnDef::new("b", ColumnType::Integer).primary_key())
            .unwrap();
        assert_eq!(
            builder.describe().unwrap().create_sql(),
            "CREATE TABLE \"pairs\" (\"a\" TEXT, \"b\" INTEGER, PRIMARY KEY (\"a\", \"b\"))"
        );
    }

    #[test]
    fn test_autoincrement_in_composite_key_is_rejected() {
        let mut builder = TableBuilder::new("pairs");
        builder
            .add_column(ColumnDef::new("a", ColumnType::Integer).primary_key().autoincrement())
            .unwrap();
        builder
            .add_column(ColumnDef::new("b", ColumnType::Integer).primary_key())
            .unwrap();
        assert!(matches!(
            builder.describe(),
            Err(EditorError::InvalidColumn { ref column, .. }) if column == "a"
        ));
    }

    #[test]
    fn test_materialize_creates_table() {
        let mut db = Database::open_in_memory().unwrap();
        let handle = example_builder().materialize(&mut db).unwrap();

        assert_eq!(handle.name(), "example");
        assert_eq!(handle.column_names(), vec!["id", "name"]);
        assert_eq!(handle.pk_column_names(), &["id".to_string()]);
        assert_eq!(db.get_tables().unwrap(), vec!["example"]);
    }
}
