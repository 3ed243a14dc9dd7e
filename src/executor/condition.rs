//! Condition matching
//!
//! A condition is a mapping of column to predicate, or a list of conditions
//! that must all hold. As a JSON document:
//!
//! ```text
//! {"name": "x"}                      equality shorthand
//! {"id": {"gt": 1, "lt": 15}}        operator map
//! [{"id": {"gt": 1}}, {"name": "x"}] conjunction
//! ```

use crate::error::{Error, Result};
use crate::storage::{Row, Value};
use indexmap::IndexMap;
use serde::Deserialize;
use std::cmp::Ordering;
use std::fmt;
use std::mem;
use std::str::FromStr;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Numeric greater-than
    Gt,
    /// Numeric less-than
    Lt,
    Eq,
    Ne,
    /// Membership in a list operand
    In,
    /// Substring containment
    Like,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::In => "in",
            Operator::Like => "like",
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gt" => Ok(Operator::Gt),
            // "st" is the spelling used by older store files
            "lt" | "st" => Ok(Operator::Lt),
            "eq" => Ok(Operator::Eq),
            "ne" => Ok(Operator::Ne),
            "in" => Ok(Operator::In),
            "like" => Ok(Operator::Like),
            other => Err(Error::InvalidCondition(format!("unknown operator '{}'", other))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicate applied to one column
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Column value equals the operand
    Equals(Value),
    /// Every operator holds
    Compare(Vec<(Operator, Value)>),
}

/// A predicate tree evaluated against a row
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum Condition {
    /// Per-column predicates, all of which must hold
    Fields(IndexMap<String, Predicate>),
    /// Sub-conditions, all of which must hold
    All(Vec<Condition>),
}

impl Default for Condition {
    fn default() -> Self {
        Self::new()
    }
}

impl Condition {
    /// A condition with no predicates; matches every row
    pub fn new() -> Self {
        Condition::Fields(IndexMap::new())
    }

    /// `column == value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().and_eq(column, value)
    }

    /// `column <op> operand`
    pub fn op(column: impl Into<String>, op: Operator, operand: impl Into<Value>) -> Self {
        Self::new().and_op(column, op, operand)
    }

    /// Conjunction of sub-conditions
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Condition::All(conditions.into_iter().collect())
    }

    /// Add an equality predicate on `column`
    pub fn and_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_predicate(column.into(), Predicate::Equals(value.into()))
    }

    /// Add an operator predicate on `column`. Predicates on the same column
    /// accumulate.
    pub fn and_op(self, column: impl Into<String>, op: Operator, operand: impl Into<Value>) -> Self {
        self.with_predicate(column.into(), Predicate::Compare(vec![(op, operand.into())]))
    }

    fn with_predicate(self, column: String, predicate: Predicate) -> Self {
        match self {
            Condition::Fields(mut fields) => {
                match fields.get_mut(&column) {
                    Some(existing) => {
                        let current = mem::replace(existing, Predicate::Compare(Vec::new()));
                        *existing = current.and(predicate);
                    }
                    None => {
                        fields.insert(column, predicate);
                    }
                }
                Condition::Fields(fields)
            }
            all => {
                let mut fields = IndexMap::new();
                fields.insert(column, predicate);
                Condition::All(vec![all, Condition::Fields(fields)])
            }
        }
    }

    /// Parse a condition document
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items
                .into_iter()
                .map(Condition::from_value)
                .collect::<Result<Vec<_>>>()
                .map(Condition::All),
            Value::Map(map) => map
                .into_iter()
                .map(|(column, operand)| Ok((column, parse_predicate(operand)?)))
                .collect::<Result<IndexMap<_, _>>>()
                .map(Condition::Fields),
            other => Err(Error::InvalidCondition(format!(
                "expected a mapping or a list, found {}",
                other.type_name()
            ))),
        }
    }

    /// Parse a condition from a JSON value
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        Self::from_value(Value::from(json))
    }

    /// Evaluate against a row. Every predicate is evaluated, so a type error
    /// anywhere in the condition is reported even if another predicate fails.
    pub fn matches(&self, row: &Row) -> Result<bool> {
        match self {
            Condition::All(conditions) => {
                let mut all = true;
                for condition in conditions {
                    all &= condition.matches(row)?;
                }
                Ok(all)
            }
            Condition::Fields(fields) => {
                let mut all = true;
                for (column, predicate) in fields {
                    let value = row
                        .get(column)
                        .ok_or_else(|| Error::MissingColumn(column.clone()))?;
                    all &= predicate.matches(value)?;
                }
                Ok(all)
            }
        }
    }
}

impl TryFrom<Value> for Condition {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        Condition::from_value(value)
    }
}

/// A nested mapping is an operator map when its keys are operators, and an
/// equality operand otherwise. Mixing the two is rejected.
fn parse_predicate(operand: Value) -> Result<Predicate> {
    let Value::Map(map) = operand else {
        return Ok(Predicate::Equals(operand));
    };

    let operators: Vec<Option<Operator>> = map.keys().map(|k| k.parse().ok()).collect();
    if operators.iter().all(Option::is_none) {
        return Ok(Predicate::Equals(Value::Map(map)));
    }

    let mut ops = Vec::with_capacity(map.len());
    for ((key, operand), op) in map.into_iter().zip(operators) {
        let op = op.ok_or_else(|| {
            Error::InvalidCondition(format!("unknown operator '{}' next to operators", key))
        })?;
        ops.push((op, operand));
    }
    Ok(Predicate::Compare(ops))
}

impl Predicate {
    /// Conjunction of two predicates on the same column
    pub fn and(self, other: Predicate) -> Predicate {
        let mut ops = self.into_ops();
        ops.extend(other.into_ops());
        Predicate::Compare(ops)
    }

    fn into_ops(self) -> Vec<(Operator, Value)> {
        match self {
            Predicate::Equals(expected) => vec![(Operator::Eq, expected)],
            Predicate::Compare(ops) => ops,
        }
    }

    pub fn matches(&self, value: &Value) -> Result<bool> {
        match self {
            Predicate::Equals(expected) => Ok(value.loose_eq(expected)),
            Predicate::Compare(ops) => {
                let mut all = true;
                for (op, operand) in ops {
                    all &= apply(*op, value, operand)?;
                }
                Ok(all)
            }
        }
    }
}

fn apply(op: Operator, value: &Value, operand: &Value) -> Result<bool> {
    let mismatch = || Error::TypeMismatch {
        operator: op.to_string(),
        left: value.type_name().to_string(),
        right: operand.type_name().to_string(),
    };

    match op {
        Operator::Gt | Operator::Lt => {
            let (left, right) = value
                .to_number()
                .zip(operand.to_number())
                .ok_or_else(mismatch)?;
            let wanted = if op == Operator::Gt {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            Ok(left.compare(right) == Some(wanted))
        }
        Operator::Eq => Ok(value.loose_eq(operand)),
        Operator::Ne => Ok(!value.loose_eq(operand)),
        Operator::In => {
            let items = operand.as_list().ok_or_else(mismatch)?;
            Ok(items.iter().any(|item| value.loose_eq(item)))
        }
        Operator::Like => {
            let haystack = value.as_str().ok_or_else(mismatch)?;
            let needle = operand.as_str().ok_or_else(mismatch)?;
            Ok(haystack.contains(needle))
        }
    }
}
