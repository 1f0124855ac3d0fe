//! Builder Registry - In-progress table builders of one open database

use crate::db::{Database, TableHandle};
use crate::error::{EditorError, Existing, Result};
use crate::schema::table_builder::TableBuilder;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Holds at most one builder per table name, for tables that do not exist in
/// the catalog yet. The registry is bound to the database it was created
/// for and is dropped together with that connection.
///
/// Names are compared ignoring ASCII case, as SQLite compares table names.
#[derive(Debug)]
pub struct BuilderRegistry {
    catalog_id: Uuid,
    /// Keyed by the ASCII-lowercased name; each builder keeps the name as given.
    builders: BTreeMap<String, TableBuilder>,
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl BuilderRegistry {
    pub fn for_database(db: &Database) -> Self {
        Self {
            catalog_id: db.catalog_id(),
            builders: BTreeMap::new(),
        }
    }

    fn check_catalog(&self, db: &Database) -> Result<()> {
        if db.catalog_id() != self.catalog_id {
            return Err(EditorError::CatalogMismatch);
        }
        Ok(())
    }

    fn check_not_materialized(db: &Database, name: &str) -> Result<()> {
        if db.table_exists(name)? {
            return Err(EditorError::NameCollision {
                name: name.to_string(),
                existing: Existing::Table,
            });
        }
        Ok(())
    }

    /// Start an empty builder for `name`.
    pub fn start_building(&mut self, db: &Database, name: &str) -> Result<&mut TableBuilder> {
        self.check_catalog(db)?;

        if self.contains(name) {
            return Err(EditorError::NameCollision {
                name: name.to_string(),
                existing: Existing::InProgress,
            });
        }
        Self::check_not_materialized(db, name)?;

        debug!(table = name, "Started table builder");
        Ok(self
            .builders
            .entry(key(name))
            .or_insert_with(|| TableBuilder::new(name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(&key(name))
    }

    pub fn get(&self, name: &str) -> Result<&TableBuilder> {
        self.builders.get(&key(name)).ok_or_else(|| EditorError::NotFound {
            name: name.to_string(),
        })
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut TableBuilder> {
        self.builders.get_mut(&key(name)).ok_or_else(|| EditorError::NotFound {
            name: name.to_string(),
        })
    }

    /// Drop the builder for `name` without creating anything.
    pub fn discard(&mut self, name: &str) -> Result<TableBuilder> {
        let builder = self.builders.remove(&key(name)).ok_or_else(|| EditorError::NotFound {
            name: name.to_string(),
        })?;
        debug!(table = name, "Discarded table builder");
        Ok(builder)
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Builder names as they were given to `start_building`.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.builders.values().map(TableBuilder::name)
    }

    /// Create the table for `name` and remove its builder. On any failure the
    /// builder stays registered exactly as it was, so the caller can fix it
    /// and retry.
    pub fn finalize(&mut self, name: &str, db: &mut Database) -> Result<TableHandle> {
        self.check_catalog(db)?;

        let definition = self.get(name)?.describe()?;
        Self::check_not_materialized(db, name)?;

        let handle = match db.create_table(&definition) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(table = name, error = %e, "Failed to create table, keeping builder");
                return Err(e);
            }
        };

        self.builders.remove(&key(name));
        info!(table = name, columns = handle.columns().len(), "Finalized table");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::column::{ColumnDef, ColumnType};

    const SCRIPT: &str = r#"
        CREATE TABLE first (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT);
        CREATE TABLE second (id INTEGER PRIMARY KEY AUTOINCREMENT, amount INT, name TEXT);
    "#;

    fn setup() -> (Database, BuilderRegistry) {
        let db = Database::open_in_memory().unwrap();
        db.execute_script(SCRIPT).unwrap();
        let mut group = BuilderRegistry::for_database(&db);
        group
            .start_building(&db, "example")
            .unwrap()
            .add_column(ColumnDef::new("id", ColumnType::Integer).primary_key().autoincrement())
            .unwrap();
        (db, group)
    }

    #[test]
    fn test_contains() {
        let (_db, group) = setup();
        assert!(group.contains("example"));
        assert!(!group.contains("Lorem"));
    }

    #[test]
    fn test_get() {
        let (_db, group) = setup();
        assert_eq!(group.get("example").unwrap().column_names(), vec!["id"]);
        assert!(matches!(
            group.get("item"),
            Err(EditorError::NotFound { ref name }) if name == "item"
        ));
    }

    #[test]
    fn test_discard() {
        let (_db, mut group) = setup();
        let builder = group.discard("example").unwrap();
        assert_eq!(builder.name(), "example");
        assert!(!group.contains("example"));
        assert!(group.discard("example").is_err());
    }

    #[test]
    fn test_len() {
        let (_db, group) = setup();
        assert_eq!(group.len(), 1);
        assert_eq!(group.names().collect::<Vec<_>>(), vec!["example"]);
    }

    #[test]
    fn test_start_building() {
        let (db, mut group) = setup();
        assert!(!group.contains("new_table"));
        group.start_building(&db, "new_table").unwrap();
        assert!(group.contains("new_table"));
        assert!(group.get("new_table").unwrap().is_empty());
    }

    #[test]
    fn test_start_building_twice_collides_with_builder() {
        let (db, mut group) = setup();
        group.start_building(&db, "new_table").unwrap();
        assert!(matches!(
            group.start_building(&db, "new_table"),
            Err(EditorError::NameCollision { existing: Existing::InProgress, .. })
        ));
    }

    #[test]
    fn test_start_building_existing_table_collides_with_table() {
        let (db, mut group) = setup();
        assert!(matches!(
            group.start_building(&db, "first"),
            Err(EditorError::NameCollision { existing: Existing::Table, .. })
        ));
        assert!(!group.contains("first"));
    }

    #[test]
    fn test_finalize_creates_table() {
        let (mut db, mut group) = setup();
        let handle = group.finalize("example", &mut db).unwrap();
        assert_eq!(handle.pk_column_names(), &["id".to_string()]);
        assert_eq!(db.get_tables().unwrap(), vec!["first", "second", "example"]);
        assert!(!group.contains("example"));
    }

    #[test]
    fn test_finalize_empty_builder_keeps_it() {
        let (mut db, mut group) = setup();
        group.start_building(&db, "empty").unwrap();
        assert!(matches!(
            group.finalize("empty", &mut db),
            Err(EditorError::EmptyTable { .. })
        ));
        assert!(group.contains("empty"));
        assert!(!db.table_exists("empty").unwrap());
    }

    #[test]
    fn test_finalize_after_concurrent_create_keeps_builder() {
        let (mut db, mut group) = setup();
        db.execute_script("CREATE TABLE example (other TEXT);").unwrap();

        assert!(matches!(
            group.finalize("example", &mut db),
            Err(EditorError::NameCollision { existing: Existing::Table, .. })
        ));
        assert_eq!(group.get("example").unwrap().column_names(), vec!["id"]);
        assert_eq!(db.get_table_column_names("example").unwrap(), vec!["other"]);
    }

    #[test]
    fn test_start_building_case_variant_of_existing_table() {
        let (db, mut group) = setup();
        assert!(matches!(
            group.start_building(&db, "FIRST"),
            Err(EditorError::NameCollision { existing: Existing::Table, ref name }) if name == "FIRST"
        ));
        assert!(!group.contains("FIRST"));
    }

    #[test]
    fn test_start_building_case_variant_of_builder_in_progress() {
        let (db, mut group) = setup();
        group.start_building(&db, "Other").unwrap();
        assert!(matches!(
            group.start_building(&db, "other"),
            Err(EditorError::NameCollision { existing: Existing::InProgress, .. })
        ));
        assert!(group.contains("OTHER"));
        assert_eq!(group.get("other").unwrap().name(), "Other");
        assert_eq!(group.names().collect::<Vec<_>>(), vec!["example", "Other"]);
    }

    #[test]
    fn test_finalize_case_variant_after_concurrent_create() {
        let (mut db, mut group) = setup();
        db.execute_script("CREATE TABLE EXAMPLE (other TEXT);").unwrap();

        assert!(matches!(
            group.finalize("example", &mut db),
            Err(EditorError::NameCollision { existing: Existing::Table, .. })
        ));
        assert!(group.contains("example"));
    }

    #[test]
    fn test_finalize_failed_ddl_keeps_builder() {
        let (mut db, mut group) = setup();
        group
            .get_mut("example")
            .unwrap()
            .add_column(ColumnDef::new("name", ColumnType::Text))
            .unwrap();
        let before = group.get("example").unwrap().columns().to_vec();

        // Reads still work, so only the CREATE TABLE itself is rejected.
        db.execute_script("PRAGMA query_only = ON;").unwrap();

        let err = group.finalize("example", &mut db).unwrap_err();
        assert!(matches!(err, EditorError::Storage { .. }));
        assert!(group.contains("example"));
        assert_eq!(group.get("example").unwrap().columns(), before.as_slice());

        db.execute_script("PRAGMA query_only = OFF;").unwrap();
        assert!(!db.table_exists("example").unwrap());
        group.finalize("example", &mut db).unwrap();
        assert!(!group.contains("example"));
    }

    #[test]
    fn test_registry_is_bound_to_its_database() {
        let (_db, mut group) = setup();
        let other = Database::open_in_memory().unwrap();
        assert!(matches!(
            group.start_building(&other, "x"),
            Err(EditorError::CatalogMismatch)
        ));
    }
}
