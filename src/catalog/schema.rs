//! Schema definitions for fdstore
//!
//! This module defines table schemas and column metadata. Column definitions
//! serialize as `{"type": ..., "options": [...], "validate"?: name}`.

use super::types::ColumnType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-column constraint flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Constraint {
    /// Missing values are filled from the table counter
    AutoIncrement,
    /// Unique and non-null
    Primary,
    /// Unique
    Unique,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::AutoIncrement => write!(f, "AUTOINCREMENT"),
            Constraint::Primary => write!(f, "PRIMARY"),
            Constraint::Unique => write!(f, "UNIQUE"),
        }
    }
}

/// Column definition in a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Value type
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Constraint flags, at most one of each kind
    #[serde(rename = "options", default)]
    pub constraints: Vec<Constraint>,
    /// Name of a validator in the [`ValidatorRegistry`](super::ValidatorRegistry)
    #[serde(rename = "validate", default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
}

impl ColumnDefinition {
    /// Create a column of the given type with no constraints
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            constraints: Vec::new(),
            validator: None,
        }
    }

    pub fn int() -> Self {
        Self::new(ColumnType::Int)
    }

    pub fn str() -> Self {
        Self::new(ColumnType::Str)
    }

    pub fn float() -> Self {
        Self::new(ColumnType::Float)
    }

    pub fn bool() -> Self {
        Self::new(ColumnType::Bool)
    }

    pub fn any() -> Self {
        Self::new(ColumnType::Any)
    }

    /// String column checked by the built-in `email` validator
    pub fn email() -> Self {
        Self::str().validate(super::validator::EMAIL)
    }

    /// Add a constraint; applying the same kind twice keeps one copy
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
        self
    }

    pub fn auto_increment(self) -> Self {
        self.constraint(Constraint::AutoIncrement)
    }

    pub fn primary(self) -> Self {
        self.constraint(Constraint::Primary)
    }

    pub fn unique(self) -> Self {
        self.constraint(Constraint::Unique)
    }

    /// Attach a validator by registry name
    pub fn validate(mut self, name: impl Into<String>) -> Self {
        self.validator = Some(name.into());
        self
    }

    /// Check whether a constraint is declared
    pub fn has(&self, constraint: Constraint) -> bool {
        self.constraints.contains(&constraint)
    }

    pub fn is_auto_increment(&self) -> bool {
        self.has(Constraint::AutoIncrement)
    }

    pub fn is_primary(&self) -> bool {
        self.has(Constraint::Primary)
    }

    /// The key constraint enforced on this column, PRIMARY taking precedence
    pub fn key_constraint(&self) -> Option<Constraint> {
        if self.has(Constraint::Primary) {
            Some(Constraint::Primary)
        } else if self.has(Constraint::Unique) {
            Some(Constraint::Unique)
        } else {
            None
        }
    }
}

/// Table schema - ordered column name to definition mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    columns: IndexMap<String, ColumnDefinition>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column, builder style
    pub fn column(mut self, name: impl Into<String>, definition: ColumnDefinition) -> Self {
        self.add_column(name, definition);
        self
    }

    /// Add or replace a column
    pub fn add_column(&mut self, name: impl Into<String>, definition: ColumnDefinition) {
        self.columns.insert(name.into(), definition);
    }

    /// Get column by name
    pub fn get_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.get(name)
    }

    /// Check if column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Iterate columns in declaration order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnDefinition)> {
        self.columns.iter().map(|(name, def)| (name.as_str(), def))
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    /// Get number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Columns carrying the AUTOINCREMENT flag
    pub fn auto_increment_columns(&self) -> Vec<&str> {
        self.columns()
            .filter(|(_, def)| def.is_auto_increment())
            .map(|(name, _)| name)
            .collect()
    }

    /// Validator names referenced by this schema
    pub fn validators(&self) -> impl Iterator<Item = &str> {
        self.columns.values().filter_map(|def| def.validator.as_deref())
    }
}

impl<K: Into<String>> FromIterator<(K, ColumnDefinition)> for Schema {
    fn from_iter<I: IntoIterator<Item = (K, ColumnDefinition)>>(iter: I) -> Self {
        let mut schema = Schema::new();
        for (name, def) in iter {
            schema.add_column(name, def);
        }
        schema
    }
}
