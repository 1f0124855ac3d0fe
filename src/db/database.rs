//! Database - Connection and catalog facade over SQLite
//!
//! The ingestion core only needs `get_table_column_names`,
//! `get_pk_column_names`, `insert_batch` and `create_table`; the remaining
//! operations back the editor's table browsing and ad-hoc queries.

use crate::db::quote_ident;
use crate::error::{EditorError, Result};
use crate::schema::TableDefinition;
use crate::value::{Record, Value};
use itertools::Itertools;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Column metadata as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,

    /// Declared type text, as written in the table's DDL
    pub declared_type: String,

    pub not_null: bool,

    /// Default expression, as written in the table's DDL
    pub default: Option<String>,

    /// 1-based position within the primary key, if part of it
    pub primary_key_position: Option<u32>,
}

/// Snapshot of a materialized table's columns and primary key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableHandle {
    name: String,
    columns: Vec<ColumnInfo>,
    primary_key: Vec<String>,
}

impl TableHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn pk_column_names(&self) -> &[String] {
        &self.primary_key
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    fn check_columns<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for name in names {
            if !self.has_column(name) {
                return Err(EditorError::UnknownColumn {
                    table: self.name.clone(),
                    column: name.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Result of a raw statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Rows changed by a statement that returns no columns
    pub rows_affected: usize,
}

/// Database - Owns one SQLite connection.
///
/// Not designed for concurrent use; write operations take `&mut self`.
pub struct Database {
    conn: Connection,
    catalog_id: Uuid,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .map_err(|e| EditorError::storage(format!("Failed to open database {}", path.display()), e))?;
        info!(path = %path.display(), "Opened database");
        Ok(Self {
            conn,
            catalog_id: Uuid::new_v4(),
            path: Some(path),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EditorError::storage("Failed to open in-memory database", e))?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap a connection opened by the caller.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            catalog_id: Uuid::new_v4(),
            path: None,
        }
    }

    /// Identifies this database's catalog for the lifetime of the connection.
    pub fn catalog_id(&self) -> Uuid {
        self.catalog_id
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// User tables in creation order.
    pub fn get_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
                 ORDER BY rowid",
            )
            .map_err(|e| EditorError::storage("Failed to list tables", e))?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| EditorError::storage("Failed to list tables", e))?;

        Ok(names)
    }

    /// Table names are matched the way SQLite resolves them, ignoring ASCII case.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master \
                 WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                [table],
                |row| row.get(0),
            )
            .map_err(|e| EditorError::storage(format!("Failed to look up table '{}'", table), e))?;
        Ok(count > 0)
    }

    pub fn get_table(&self, table: &str) -> Result<TableHandle> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name, type, \"notnull\", dflt_value, pk \
                 FROM pragma_table_info(?1) ORDER BY cid",
            )
            .map_err(|e| EditorError::storage("Failed to read table info", e))?;

        let columns = stmt
            .query_map([table], |row| {
                let pk: u32 = row.get(4)?;
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    declared_type: row.get(1)?,
                    not_null: row.get(2)?,
                    default: row.get(3)?,
                    primary_key_position: (pk > 0).then_some(pk),
                })
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| EditorError::storage(format!("Failed to read columns of '{}'", table), e))?;

        if columns.is_empty() {
            return Err(EditorError::TableNotFound {
                table: table.to_string(),
            });
        }

        let primary_key = columns
            .iter()
            .filter_map(|c| c.primary_key_position.map(|pos| (pos, c.name.clone())))
            .sorted()
            .map(|(_, name)| name)
            .collect();

        Ok(TableHandle {
            name: table.to_string(),
            columns,
            primary_key,
        })
    }

    pub fn get_table_column_names(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.get_table(table)?.column_names())
    }

    /// Primary-key columns in key order.
    pub fn get_pk_column_names(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.get_table(table)?.primary_key)
    }

    pub fn select_all(&self, table: &str) -> Result<Vec<Vec<Value>>> {
        let handle = self.get_table(table)?;
        let sql = format!("SELECT * FROM {}", quote_ident(handle.name()));
        let result = self.execute_raw(&sql, &[])?;
        Ok(result.rows)
    }

    pub fn insert_row(&mut self, table: &str, fields: &[(&str, Value)]) -> Result<usize> {
        let record = Record::from_pairs(fields.iter().map(|(k, v)| (*k, v.clone())));
        self.insert_batch(table, std::slice::from_ref(&record))
    }

    /// Insert all records in one transaction. Either every record is written
    /// or none is; a rejected record is attached to the returned error.
    pub fn insert_batch(&mut self, table: &str, records: &[Record]) -> Result<usize> {
        let handle = self.get_table(table)?;
        for record in records {
            handle.check_columns(record.keys().iter().map(String::as_str))?;
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| EditorError::storage("Failed to start transaction", e))?;

        let mut sql = String::new();
        let mut last_keys: Option<&[String]> = None;
        for record in records {
            if last_keys != Some(record.keys()) {
                sql = insert_sql(handle.name(), record.keys());
                last_keys = Some(record.keys());
            }

            let mut stmt = tx
                .prepare_cached(&sql)
                .map_err(|e| EditorError::storage(format!("Failed to prepare insert into '{}'", table), e))?;
            stmt.execute(params_from_iter(record.values().iter()))
                .map_err(|e| EditorError::Storage {
                    message: format!("Failed to insert row into '{}'", table),
                    record: Some(Box::new(record.clone())),
                    source: e,
                })?;
        }

        tx.commit()
            .map_err(|e| EditorError::storage("Failed to commit transaction", e))?;

        debug!(table, rows = records.len(), "Inserted batch");
        Ok(records.len())
    }

    /// Delete rows matching every `(column, value)` pair of the predicate.
    pub fn delete_row(&mut self, table: &str, predicate: &[(&str, Value)]) -> Result<usize> {
        let handle = self.get_table(table)?;
        if predicate.is_empty() {
            return Err(EditorError::EmptyPredicate {
                table: table.to_string(),
            });
        }
        handle.check_columns(predicate.iter().map(|(k, _)| *k))?;

        let sql = format!(
            "DELETE FROM {} WHERE {}",
            quote_ident(handle.name()),
            where_clause(predicate, 1)
        );

        self.conn
            .execute(&sql, params_from_iter(predicate.iter().map(|(_, v)| v)))
            .map_err(|e| EditorError::storage(format!("Failed to delete from '{}'", table), e))
    }

    /// Set `values` on rows matching every `(column, value)` pair of the predicate.
    pub fn update_row(
        &mut self,
        table: &str,
        predicate: &[(&str, Value)],
        values: &[(&str, Value)],
    ) -> Result<usize> {
        let handle = self.get_table(table)?;
        if predicate.is_empty() {
            return Err(EditorError::EmptyPredicate {
                table: table.to_string(),
            });
        }
        handle.check_columns(predicate.iter().chain(values).map(|(k, _)| *k))?;
        if values.is_empty() {
            return Ok(0);
        }

        let assignments = values
            .iter()
            .enumerate()
            .map(|(idx, (column, _))| format!("{} = ?{}", quote_ident(column), idx + 1))
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(handle.name()),
            assignments,
            where_clause(predicate, values.len() + 1)
        );

        let params = values.iter().chain(predicate).map(|(_, v)| v);
        self.conn
            .execute(&sql, params_from_iter(params))
            .map_err(|e| EditorError::storage(format!("Failed to update '{}'", table), e))
    }

    /// Run one DDL statement for the definition inside a transaction and
    /// return the resulting table handle.
    pub fn create_table(&mut self, definition: &TableDefinition) -> Result<TableHandle> {
        let sql = definition.create_sql();
        info!(table = definition.name(), sql = %sql, "Creating table");

        let tx = self
            .conn
            .transaction()
            .map_err(|e| EditorError::storage("Failed to start transaction", e))?;
        tx.execute(&sql, [])
            .map_err(|e| EditorError::storage(format!("Failed to create table '{}'", definition.name()), e))?;
        tx.commit()
            .map_err(|e| EditorError::storage("Failed to commit transaction", e))?;

        self.get_table(definition.name())
    }

    /// Run a raw statement with named parameters (`:name`; the colon may be
    /// omitted).
    pub fn execute_raw(&self, sql: &str, params: &[(&str, Value)]) -> Result<QueryResult> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| EditorError::storage("Failed to prepare statement", e))?;

        for (name, value) in params {
            let key = if name.starts_with([':', '@', '$']) {
                name.to_string()
            } else {
                format!(":{}", name)
            };
            let index = stmt
                .parameter_index(&key)
                .map_err(|e| EditorError::storage("Failed to bind parameter", e))?
                .ok_or_else(|| {
                    EditorError::storage(
                        "Failed to bind parameter",
                        rusqlite::Error::InvalidParameterName(key.clone()),
                    )
                })?;
            stmt.raw_bind_parameter(index, value)
                .map_err(|e| EditorError::storage("Failed to bind parameter", e))?;
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        if columns.is_empty() {
            let rows_affected = stmt
                .raw_execute()
                .map_err(|e| EditorError::storage("Failed to execute statement", e))?;
            return Ok(QueryResult {
                columns,
                rows: Vec::new(),
                rows_affected,
            });
        }

        let mut rows = Vec::new();
        let mut cursor = stmt.raw_query();
        while let Some(row) = cursor
            .next()
            .map_err(|e| EditorError::storage("Failed to read row", e))?
        {
            let values = (0..columns.len())
                .map(|idx| row.get_ref(idx).map(Value::from))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| EditorError::storage("Failed to read row", e))?;
            rows.push(values);
        }

        Ok(QueryResult {
            columns,
            rows,
            rows_affected: 0,
        })
    }

    /// Run a batch of `;`-separated statements.
    pub fn execute_script(&self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|e| EditorError::storage("Failed to execute script", e))
    }
}

fn insert_sql(table: &str, columns: &[String]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table));
    }
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.iter().map(|c| quote_ident(c)).join(", "),
        (1..=columns.len()).map(|idx| format!("?{}", idx)).join(", ")
    )
}

// `IS` also matches NULL key values.
fn where_clause(predicate: &[(&str, Value)], first_param: usize) -> String {
    predicate
        .iter()
        .enumerate()
        .map(|(idx, (column, _))| format!("{} IS ?{}", quote_ident(column), first_param + idx))
        .join(" AND ")
}
