//! Database handle
//!
//! A [`Database`] owns the catalog behind one mutex together with the store
//! file configuration. Every call holds the lock for its whole duration,
//! including the save that follows a mutation.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::catalog::{Catalog, Schema, ValidatorRegistry};
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::executor::{Condition, JoinMode};
use crate::storage::{disk, Row};
use crate::transaction::Transaction;

/// Live state guarded by the database lock
#[derive(Debug)]
pub(crate) struct State {
    pub(crate) catalog: Catalog,
    /// Set while a [`Transaction`] holds a snapshot
    pub(crate) in_transaction: bool,
}

#[derive(Debug)]
struct Shared {
    config: DatabaseConfig,
    validators: ValidatorRegistry,
    state: Mutex<State>,
}

/// Handle to an embedded store. Clones share the same state.
#[derive(Debug, Clone)]
pub struct Database {
    shared: Arc<Shared>,
}

impl Database {
    /// Open the store at `path`, or start empty if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(DatabaseConfig::new(path), ValidatorRegistry::with_builtins())
    }

    /// Open with an explicit configuration and validator registry
    pub fn open_with(config: DatabaseConfig, validators: ValidatorRegistry) -> Result<Self> {
        let catalog = disk::load(&config.path, &validators)?;
        info!(
            path = %config.path.display(),
            tables = catalog.list_tables().len(),
            "database opened"
        );
        Ok(Self::from_parts(config, validators, catalog))
    }

    /// Create a fresh empty store at `path`, replacing any existing file
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with(DatabaseConfig::new(path), ValidatorRegistry::with_builtins())
    }

    /// Create with an explicit configuration. The empty store is written
    /// immediately regardless of `autosave`.
    pub fn create_with(config: DatabaseConfig, validators: ValidatorRegistry) -> Result<Self> {
        let catalog = Catalog::new();
        disk::save(&catalog, &config.path, config.pretty)?;
        info!(path = %config.path.display(), "database created");
        Ok(Self::from_parts(config, validators, catalog))
    }

    fn from_parts(config: DatabaseConfig, validators: ValidatorRegistry, catalog: Catalog) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                validators,
                state: Mutex::new(State {
                    catalog,
                    in_transaction: false,
                }),
            }),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.shared.config
    }

    pub fn path(&self) -> &Path {
        &self.shared.config.path
    }

    pub fn validators(&self) -> &ValidatorRegistry {
        &self.shared.validators
    }

    // ========== Catalog ==========

    /// Create a table and return a handle to it
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<Table<'_>> {
        self.write(|catalog, validators| {
            catalog.create_table(name, schema, validators).map(|_| ())
        })?;
        info!(table = name, "table created");
        Ok(Table::new(self, name))
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        self.write(|catalog, _| catalog.drop_table(name))?;
        info!(table = name, "table dropped");
        Ok(())
    }

    /// Remove every row of a table. The autoincrement counter is kept.
    pub fn truncate_table(&self, name: &str) -> Result<()> {
        self.write(|catalog, _| catalog.truncate_table(name))?;
        info!(table = name, "table truncated");
        Ok(())
    }

    /// Get a handle to an existing table
    pub fn get_table(&self, name: &str) -> Result<Table<'_>> {
        self.read(|catalog| catalog.get_table(name).map(|_| ()))?;
        Ok(Table::new(self, name))
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.lock().catalog.table_exists(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.lock().catalog.list_tables()
    }

    pub fn schema(&self, table: &str) -> Result<Schema> {
        self.read(|catalog| Ok(catalog.get_table(table)?.schema().clone()))
    }

    // ========== Rows ==========

    pub fn insert(&self, table: &str, row: Row) -> Result<Row> {
        self.write(|catalog, validators| catalog.get_table_mut(table)?.insert(row, validators))
    }

    /// Insert rows in order. The batch is not atomic: on failure the rows
    /// inserted before it are kept and saved, and the error is returned.
    pub fn insert_many(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let (inserted, failure) = self.write(|catalog, validators| {
            let target = catalog.get_table_mut(table)?;
            let mut inserted = Vec::with_capacity(rows.len());
            for row in rows {
                match target.insert(row, validators) {
                    Ok(row) => inserted.push(row),
                    Err(e) => return Ok((inserted, Some(e))),
                }
            }
            Ok((inserted, None))
        })?;

        match failure {
            Some(e) => {
                debug!(table, kept = inserted.len(), error = %e, "batch insert stopped");
                Err(e)
            }
            None => Ok(inserted),
        }
    }

    /// Apply `changes` to every matching row, returning the number updated
    pub fn update(&self, table: &str, condition: &Condition, changes: &Row) -> Result<usize> {
        self.write(|catalog, validators| {
            catalog
                .get_table_mut(table)?
                .update(condition, changes, validators)
        })
    }

    /// Delete every matching row, returning the number removed
    pub fn delete(&self, table: &str, condition: &Condition) -> Result<usize> {
        self.write(|catalog, _| catalog.get_table_mut(table)?.delete(condition))
    }

    /// Copies of the matching rows, or of all rows
    pub fn select(&self, table: &str, condition: Option<&Condition>) -> Result<Vec<Row>> {
        self.read(|catalog| catalog.get_table(table)?.select(condition))
    }

    pub fn count(&self, table: &str) -> Result<usize> {
        self.read(|catalog| Ok(catalog.get_table(table)?.count()))
    }

    /// Join two tables, see [`crate::executor::join`]
    pub fn join<P>(&self, left: &str, right: &str, predicate: P, mode: JoinMode) -> Result<Vec<Row>>
    where
        P: Fn(&Row, &Row) -> bool,
    {
        self.read(|catalog| catalog.join(left, right, predicate, mode))
    }

    // ========== Persistence ==========

    /// Write the live state to the store file
    pub fn save(&self) -> Result<()> {
        let state = self.lock();
        self.store(&state.catalog)
    }

    // ========== Transactions ==========

    /// An idle transaction handle; call [`Transaction::begin`] to open it
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    /// Open a transaction
    pub fn begin(&self) -> Result<Transaction<'_>> {
        let mut transaction = self.transaction();
        transaction.begin()?;
        Ok(transaction)
    }

    // ========== Internals ==========

    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        // Mutations are staged before being applied, so a poisoned state is
        // still consistent
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Write `catalog` to the store file
    pub(crate) fn store(&self, catalog: &Catalog) -> Result<()> {
        disk::save(catalog, self.path(), self.shared.config.pretty)
    }

    /// Save after a live mutation, unless autosave is off
    fn persist(&self, catalog: &Catalog) -> Result<()> {
        if self.shared.config.autosave {
            self.store(catalog)?;
        }
        Ok(())
    }

    fn read<T>(&self, op: impl FnOnce(&Catalog) -> Result<T>) -> Result<T> {
        op(&self.lock().catalog)
    }

    /// Run a mutation against the live catalog and save it. Live mutations
    /// are refused while a transaction is open, since its commit would
    /// overwrite them.
    fn write<T>(&self, op: impl FnOnce(&mut Catalog, &ValidatorRegistry) -> Result<T>) -> Result<T> {
        let mut state = self.lock();
        if state.in_transaction {
            return Err(Error::TransactionInProgress);
        }
        let value = op(&mut state.catalog, &self.shared.validators)?;
        self.persist(&state.catalog)?;
        Ok(value)
    }
}

/// A handle to one table of a [`Database`]. Every call goes to the live
/// table, so a handle to a dropped table reports [`Error::NoSuchTable`].
#[derive(Debug, Clone)]
pub struct Table<'db> {
    db: &'db Database,
    name: String,
}

impl<'db> Table<'db> {
    fn new(db: &'db Database, name: &str) -> Self {
        Self {
            db,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Result<Schema> {
        self.db.schema(&self.name)
    }

    pub fn insert(&self, row: Row) -> Result<Row> {
        self.db.insert(&self.name, row)
    }

    pub fn insert_many(&self, rows: Vec<Row>) -> Result<Vec<Row>> {
        self.db.insert_many(&self.name, rows)
    }

    pub fn update(&self, condition: &Condition, changes: &Row) -> Result<usize> {
        self.db.update(&self.name, condition, changes)
    }

    pub fn delete(&self, condition: &Condition) -> Result<usize> {
        self.db.delete(&self.name, condition)
    }

    pub fn select(&self, condition: Option<&Condition>) -> Result<Vec<Row>> {
        self.db.select(&self.name, condition)
    }

    /// All rows
    pub fn show(&self) -> Result<Vec<Row>> {
        self.select(None)
    }

    pub fn count(&self) -> Result<usize> {
        self.db.count(&self.name)
    }

    pub fn truncate(&self) -> Result<()> {
        self.db.truncate_table(&self.name)
    }

    /// Join this table (left) with `other` (right)
    pub fn join<P>(&self, other: &Table<'_>, predicate: P, mode: JoinMode) -> Result<Vec<Row>>
    where
        P: Fn(&Row, &Row) -> bool,
    {
        self.db.join(&self.name, &other.name, predicate, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDefinition;
    use crate::row;
    use crate::storage::Value;
    use tempfile::TempDir;

    fn users_schema() -> Schema {
        Schema::new()
            .column("id", ColumnDefinition::int().auto_increment())
            .column("name", ColumnDefinition::str())
    }

    #[test]
    fn test_create_table_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let db = Database::create(&path).unwrap();

        db.create_table("user", users_schema()).unwrap();
        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.list_tables(), ["user"]);
    }

    #[test]
    fn test_duplicate_and_missing_tables() {
        let dir = TempDir::new().unwrap();
        let db = Database::create(dir.path().join("index.json")).unwrap();

        db.create_table("user", users_schema()).unwrap();
        assert!(matches!(
            db.create_table("user", users_schema()),
            Err(Error::DuplicateTable(_))
        ));
        assert!(matches!(db.get_table("nope"), Err(Error::NoSuchTable(_))));
        assert!(matches!(db.drop_table("nope"), Err(Error::NoSuchTable(_))));
    }

    #[test]
    fn test_table_handle_follows_live_table() {
        let dir = TempDir::new().unwrap();
        let db = Database::create(dir.path().join("index.json")).unwrap();

        let table = db.create_table("user", users_schema()).unwrap();
        table.insert(row! { "name" => "a" }).unwrap();
        assert_eq!(db.get_table("user").unwrap().count().unwrap(), 1);

        db.drop_table("user").unwrap();
        assert!(matches!(table.show(), Err(Error::NoSuchTable(_))));
    }

    #[test]
    fn test_autosave_disabled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let config = DatabaseConfig::new(&path).autosave(false);
        let db = Database::create_with(config, ValidatorRegistry::with_builtins()).unwrap();

        db.create_table("user", users_schema()).unwrap();
        assert!(Database::open(&path).unwrap().list_tables().is_empty());

        db.save().unwrap();
        assert_eq!(Database::open(&path).unwrap().list_tables(), ["user"]);
    }

    #[test]
    fn test_failed_save_keeps_mutation_in_memory() {
        let dir = TempDir::new().unwrap();
        let store_dir = dir.path().join("store");
        let moved_dir = dir.path().join("moved");
        std::fs::create_dir(&store_dir).unwrap();
        let path = store_dir.join("index.json");

        let db = Database::create(&path).unwrap();
        let table = db.create_table("user", users_schema()).unwrap();
        table.insert(row! { "name" => "a" }).unwrap();
        let bytes_before = std::fs::read(&path).unwrap();

        // Take the directory away so the save cannot create its temporary file
        std::fs::rename(&store_dir, &moved_dir).unwrap();
        let err = table.insert(row! { "name" => "b" }).unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert_eq!(table.count().unwrap(), 2);

        std::fs::rename(&moved_dir, &store_dir).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), bytes_before);
        assert_eq!(Database::open(&path).unwrap().count("user").unwrap(), 1);

        // The next successful save carries the kept row
        db.save().unwrap();
        assert_eq!(Database::open(&path).unwrap().count("user").unwrap(), 2);
    }

    #[test]
    fn test_update_and_delete() {
        let dir = TempDir::new().unwrap();
        let db = Database::create(dir.path().join("index.json")).unwrap();
        let table = db.create_table("user", users_schema()).unwrap();
        table
            .insert_many(vec![row! { "name" => "a" }, row! { "name" => "b" }])
            .unwrap();

        let updated = table
            .update(&Condition::eq("name", "b"), &row! { "name" => "c" })
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(table.delete(&Condition::eq("id", 1)).unwrap(), 1);

        let rows = table.show().unwrap();
        assert_eq!(rows, vec![row! { "id" => 2, "name" => "c" }]);
        assert_eq!(rows[0]["name"], Value::from("c"));
    }
}
