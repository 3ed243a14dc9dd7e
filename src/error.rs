//! Error types for fdstore
//!
//! This module defines all error types used throughout the store.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for fdstore
#[derive(Error, Debug)]
pub enum Error {
    // ========== Catalog Errors ==========
    #[error("Catalog error: table '{0}' already exists")]
    DuplicateTable(String),

    #[error("Catalog error: table '{0}' not found")]
    NoSuchTable(String),

    #[error("Catalog error: column '{0}' not found")]
    MissingColumn(String),

    #[error("Catalog error: column '{column}' is not declared in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Catalog error: validator '{0}' is not registered")]
    UnknownValidator(String),

    // ========== Constraint Errors ==========
    #[error("Constraint error: duplicate value {value} for {constraint} column '{column}' in table '{table}'")]
    ConstraintViolation {
        table: String,
        column: String,
        constraint: String,
        value: String,
    },

    #[error("Validation error: column '{column}': {reason}")]
    Validation { column: String, reason: String },

    // ========== Query Errors ==========
    #[error("Type error: cannot apply '{operator}' to {left} and {right}")]
    TypeMismatch {
        operator: String,
        left: String,
        right: String,
    },

    #[error("Query error: invalid condition - {0}")]
    InvalidCondition(String),

    #[error("Query error: unknown join mode '{0}'")]
    InvalidJoinMode(String),

    // ========== Transaction Errors ==========
    #[error("Transaction error: a transaction is already in progress")]
    TransactionInProgress,

    #[error("Transaction error: no transaction in progress")]
    NoTransaction,

    // ========== Persistence Errors ==========
    #[error("Storage error: store file '{}' is corrupt: {reason}", path.display())]
    CorruptStore { path: PathBuf, reason: String },

    #[error("Storage error: failed to write '{}': {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::CorruptStore {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Persistence {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for fdstore operations
pub type Result<T> = std::result::Result<T, Error>;
