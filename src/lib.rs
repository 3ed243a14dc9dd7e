//! fdstore - a minimal embedded document store
//!
//! A single JSON file holds a database of named tables, each with a fixed
//! column schema and a list of rows:
//! - Catalog (column types, schemas, validators, table set)
//! - Storage (values, row store, single-file persistence)
//! - Query execution (condition matching, joins)
//! - Transactions (snapshot, commit, rollback)
//!
//! ```no_run
//! use fdstore::{row, ColumnDefinition, Condition, Database, Operator, Schema};
//!
//! # fn main() -> fdstore::Result<()> {
//! let db = Database::create("index.json")?;
//! let users = db.create_table(
//!     "user",
//!     Schema::new()
//!         .column("id", ColumnDefinition::int().auto_increment())
//!         .column("name", ColumnDefinition::str())
//!         .column("email", ColumnDefinition::email()),
//! )?;
//!
//! for i in 1..=30 {
//!     users.insert(row! {
//!         "name" => format!("user {}", i),
//!         "email" => format!("user{}@gmail.com", i),
//!     })?;
//! }
//!
//! let first = users.select(Some(&Condition::op("id", Operator::Lt, 15)))?;
//! assert_eq!(first.len(), 14);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod executor;
pub mod storage;
pub mod transaction;

pub use catalog::{ColumnDefinition, ColumnType, Constraint, Schema, ValidatorRegistry};
pub use config::DatabaseConfig;
pub use database::{Database, Table};
pub use error::{Error, Result};
pub use executor::{Condition, JoinMode, Operator};
pub use storage::{Row, Value};
pub use transaction::{Transaction, TransactionState};
