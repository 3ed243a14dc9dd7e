//! Transaction Manager
//!
//! Handles transaction lifecycle (Begin, Commit, Rollback). A transaction
//! stages its work on a private copy of the catalog; the live database only
//! changes when the copy is committed.

use tracing::{debug, info};

use crate::catalog::{Catalog, Schema};
use crate::database::Database;
use crate::error::{Error, Result};
use crate::executor::{Condition, JoinMode};
use crate::storage::Row;

/// Transaction State
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No snapshot held
    Idle,
    /// Snapshot held, mutations go to it
    Open,
}

/// A transaction over a [`Database`].
///
/// While open, the database refuses live mutations and other `begin` calls
/// with [`Error::TransactionInProgress`]; reads through the database still
/// see the last committed state. Dropping an open transaction rolls it back.
#[derive(Debug)]
pub struct Transaction<'db> {
    db: &'db Database,
    snapshot: Option<Catalog>,
}

impl<'db> Transaction<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self { db, snapshot: None }
    }

    pub fn state(&self) -> TransactionState {
        if self.snapshot.is_some() {
            TransactionState::Open
        } else {
            TransactionState::Idle
        }
    }

    pub fn is_open(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Take a snapshot of the live database
    pub fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(Error::TransactionInProgress);
        }

        let db = self.db;
        let mut state = db.lock();
        if state.in_transaction {
            return Err(Error::TransactionInProgress);
        }
        state.in_transaction = true;
        self.snapshot = Some(state.catalog.clone());
        info!(path = %db.path().display(), "transaction started");
        Ok(())
    }

    /// Replace the live database with the snapshot and save it.
    ///
    /// The snapshot is written before it becomes live, whether or not
    /// autosave is on. If the save fails the live database is untouched and
    /// the transaction stays open, so the caller can retry or roll back.
    pub fn commit(&mut self) -> Result<()> {
        let snapshot = self.snapshot.take().ok_or(Error::NoTransaction)?;

        let db = self.db;
        let mut state = db.lock();
        if let Err(e) = db.store(&snapshot) {
            self.snapshot = Some(snapshot);
            return Err(e);
        }
        state.catalog = snapshot;
        state.in_transaction = false;
        info!(path = %db.path().display(), "transaction committed");
        Ok(())
    }

    /// Discard the snapshot. The live database and file are unchanged.
    pub fn rollback(&mut self) -> Result<()> {
        self.snapshot.take().ok_or(Error::NoTransaction)?;
        self.db.lock().in_transaction = false;
        info!(path = %self.db.path().display(), "transaction rolled back");
        Ok(())
    }

    fn catalog(&self) -> Result<&Catalog> {
        self.snapshot.as_ref().ok_or(Error::NoTransaction)
    }

    fn catalog_mut(&mut self) -> Result<&mut Catalog> {
        self.snapshot.as_mut().ok_or(Error::NoTransaction)
    }

    // ========== Catalog ==========

    /// Create a table in the snapshot; it becomes visible on commit
    pub fn create_table(&mut self, name: &str, schema: Schema) -> Result<()> {
        let db = self.db;
        let validators = db.validators();
        self.catalog_mut()?
            .create_table(name, schema, validators)
            .map(|_| ())
    }

    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        self.catalog_mut()?.drop_table(name)
    }

    pub fn truncate_table(&mut self, name: &str) -> Result<()> {
        self.catalog_mut()?.truncate_table(name)
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.catalog()?.table_exists(name))
    }

    pub fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.catalog()?.list_tables())
    }

    // ========== Rows ==========

    pub fn insert(&mut self, table: &str, row: Row) -> Result<Row> {
        let db = self.db;
        let validators = db.validators();
        self.catalog_mut()?.get_table_mut(table)?.insert(row, validators)
    }

    /// Insert rows in order, stopping at the first failure. Earlier rows stay
    /// in the snapshot; roll back to discard them.
    pub fn insert_many(&mut self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>> {
        let db = self.db;
        let validators = db.validators();
        self.catalog_mut()?
            .get_table_mut(table)?
            .insert_many(rows, validators)
    }

    pub fn update(&mut self, table: &str, condition: &Condition, changes: &Row) -> Result<usize> {
        let db = self.db;
        let validators = db.validators();
        self.catalog_mut()?
            .get_table_mut(table)?
            .update(condition, changes, validators)
    }

    pub fn delete(&mut self, table: &str, condition: &Condition) -> Result<usize> {
        self.catalog_mut()?.get_table_mut(table)?.delete(condition)
    }

    pub fn select(&self, table: &str, condition: Option<&Condition>) -> Result<Vec<Row>> {
        self.catalog()?.get_table(table)?.select(condition)
    }

    pub fn count(&self, table: &str) -> Result<usize> {
        Ok(self.catalog()?.get_table(table)?.count())
    }

    pub fn join<P>(&self, left: &str, right: &str, predicate: P, mode: JoinMode) -> Result<Vec<Row>>
    where
        P: Fn(&Row, &Row) -> bool,
    {
        self.catalog()?.join(left, right, predicate, mode)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.snapshot.take().is_some() {
            self.db.lock().in_transaction = false;
            debug!(path = %self.db.path().display(), "open transaction dropped, rolled back");
        }
    }
}
