//! Column types for fdstore
//!
//! This module defines the type tags a column can declare.

use crate::storage::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Integer
    Int,
    /// String
    #[serde(alias = "string")]
    Str,
    /// Floating point (integers are accepted too)
    Float,
    /// Boolean
    Bool,
    /// Any JSON value, including lists and nested mappings
    Any,
}

impl ColumnType {
    /// Check whether a value can be stored in a column of this type.
    /// NULL is accepted by every type; nullability is a constraint concern.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnType::Any, _) => true,
            (ColumnType::Int, Value::Integer(_)) => true,
            (ColumnType::Float, Value::Integer(_) | Value::Float(_)) => true,
            (ColumnType::Str, Value::String(_)) => true,
            (ColumnType::Bool, Value::Boolean(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Int => write!(f, "int"),
            ColumnType::Str => write!(f, "str"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Bool => write!(f, "bool"),
            ColumnType::Any => write!(f, "any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_accepts() {
        assert!(ColumnType::Int.accepts(&Value::from(3)));
        assert!(!ColumnType::Int.accepts(&Value::from(3.5)));
        assert!(ColumnType::Float.accepts(&Value::from(3)));
        assert!(ColumnType::Str.accepts(&Value::Null));
        assert!(!ColumnType::Bool.accepts(&Value::from("true")));
        assert!(ColumnType::Any.accepts(&Value::from(vec![1, 2])));
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(serde_json::to_string(&ColumnType::Str).unwrap(), "\"str\"");
        let parsed: ColumnType = serde_json::from_str("\"string\"").unwrap();
        assert_eq!(parsed, ColumnType::Str);
    }
}
