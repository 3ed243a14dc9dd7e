//! System Catalog for fdstore
//!
//! The catalog is the whole database as plain data: every table with its
//! rows. It is cloned to take a transaction snapshot and is the unit written
//! to disk.

use super::schema::Schema;
use super::validator::ValidatorRegistry;
use crate::error::{Error, Result};
use crate::executor::{self, JoinMode};
use crate::storage::{Row, TableDefinition};
use indexmap::IndexMap;

/// All tables of a database, in creation order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    tables: IndexMap<String, TableDefinition>,
}

impl Catalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new empty table. Every validator the schema names must be
    /// registered.
    pub fn create_table(
        &mut self,
        name: &str,
        schema: Schema,
        validators: &ValidatorRegistry,
    ) -> Result<&TableDefinition> {
        if self.tables.contains_key(name) {
            return Err(Error::DuplicateTable(name.to_string()));
        }
        for validator in schema.validators() {
            validators.resolve(validator)?;
        }

        let index = self
            .tables
            .insert_full(name.to_string(), TableDefinition::new(name, schema))
            .0;
        Ok(&self.tables[index])
    }

    /// Insert a fully built table, as read from disk
    pub fn restore_table(&mut self, table: TableDefinition) -> Result<()> {
        if self.tables.contains_key(table.name()) {
            return Err(Error::DuplicateTable(table.name().to_string()));
        }
        self.tables.insert(table.name().to_string(), table);
        Ok(())
    }

    /// Get a table by name
    pub fn get_table(&self, name: &str) -> Result<&TableDefinition> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::NoSuchTable(name.to_string()))
    }

    /// Get a table by name for mutation
    pub fn get_table_mut(&mut self, name: &str) -> Result<&mut TableDefinition> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::NoSuchTable(name.to_string()))
    }

    /// Check if a table exists
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Drop a table
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        self.tables
            .shift_remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NoSuchTable(name.to_string()))
    }

    /// Remove all rows from a table
    pub fn truncate_table(&mut self, name: &str) -> Result<()> {
        self.get_table_mut(name)?.truncate();
        Ok(())
    }

    /// List all table names in creation order
    pub fn list_tables(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Iterate tables in creation order
    pub fn tables(&self) -> impl Iterator<Item = &TableDefinition> {
        self.tables.values()
    }

    /// Join two tables by name
    pub fn join<P>(&self, left: &str, right: &str, predicate: P, mode: JoinMode) -> Result<Vec<Row>>
    where
        P: Fn(&Row, &Row) -> bool,
    {
        let left = self.get_table(left)?;
        let right = self.get_table(right)?;
        Ok(executor::join(left, right, predicate, mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDefinition;

    fn schema() -> Schema {
        Schema::new()
            .column("id", ColumnDefinition::int().auto_increment())
            .column("email", ColumnDefinition::email())
    }

    #[test]
    fn test_create_and_get_table() {
        let mut catalog = Catalog::new();
        let validators = ValidatorRegistry::with_builtins();

        let table = catalog.create_table("users", schema(), &validators).unwrap();
        assert_eq!(table.name(), "users");
        assert_eq!(table.next_id(), 0);
        assert_eq!(table.count(), 0);

        let retrieved = catalog.get_table("users").unwrap();
        assert_eq!(retrieved.schema().column_count(), 2);
    }

    #[test]
    fn test_table_already_exists() {
        let mut catalog = Catalog::new();
        let validators = ValidatorRegistry::with_builtins();

        catalog.create_table("test", Schema::new(), &validators).unwrap();
        let result = catalog.create_table("test", Schema::new(), &validators);
        assert!(matches!(result, Err(Error::DuplicateTable(_))));
    }

    #[test]
    fn test_unknown_validator() {
        let mut catalog = Catalog::new();
        let result = catalog.create_table("users", schema(), &ValidatorRegistry::new());
        assert!(matches!(result, Err(Error::UnknownValidator(name)) if name == "email"));
        assert!(!catalog.table_exists("users"));
    }

    #[test]
    fn test_drop_table() {
        let mut catalog = Catalog::new();
        let validators = ValidatorRegistry::new();

        catalog.create_table("a", Schema::new(), &validators).unwrap();
        catalog.create_table("b", Schema::new(), &validators).unwrap();
        catalog.create_table("c", Schema::new(), &validators).unwrap();

        catalog.drop_table("b").unwrap();
        assert_eq!(catalog.list_tables(), ["a", "c"]);
        assert!(matches!(catalog.drop_table("b"), Err(Error::NoSuchTable(_))));
        assert!(matches!(catalog.truncate_table("b"), Err(Error::NoSuchTable(_))));
    }
}
