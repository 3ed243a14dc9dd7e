//! Catalog module
//!
//! This module contains the table catalog, schema definitions, column types
//! and the validator registry.

pub mod catalog;
pub mod schema;
pub mod types;
pub mod validator;

pub use catalog::Catalog;
pub use schema::{ColumnDefinition, Constraint, Schema};
pub use types::ColumnType;
pub use validator::{ValidatorFn, ValidatorRegistry};
