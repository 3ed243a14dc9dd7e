//! Storage module
//!
//! This module contains the in-memory row store and the persistence layer:
//! - Values and rows
//! - Table storage (row operations, constraints)
//! - The single-file JSON store

pub mod disk;
pub mod table;
pub mod value;

pub use table::TableDefinition;
pub use value::{Number, Row, Value};
