//! Table storage for fdstore
//!
//! This module combines a schema with its rows and autoincrement counter and
//! implements the row operations. It performs no I/O.

use super::value::{Row, Value};
use crate::catalog::{ColumnDefinition, Constraint, Schema, ValidatorRegistry};
use crate::error::{Error, Result};
use crate::executor::Condition;
use tracing::warn;

/// A table: schema, rows in insertion order and the autoincrement counter
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    /// Table name
    name: String,
    /// Column definitions
    schema: Schema,
    /// Rows in insertion order
    rows: Vec<Row>,
    /// One past the highest autoincrement value stored so far
    next_id: i64,
}

impl TableDefinition {
    /// Create a new empty table
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
            rows: Vec::new(),
            next_id: 0,
        }
    }

    /// Rebuild a table from stored parts. A counter that lags behind the
    /// stored autoincrement values is raised to `1 + max`.
    pub fn from_parts(
        name: impl Into<String>,
        schema: Schema,
        rows: Vec<Row>,
        next_id: i64,
    ) -> Self {
        let mut table = Self {
            name: name.into(),
            schema,
            rows,
            next_id,
        };
        let floor = table.auto_increment_floor();
        if table.next_id < floor {
            warn!(
                table = %table.name,
                stored = table.next_id,
                repaired = floor,
                "autoincrement counter behind stored rows"
            );
            table.next_id = floor;
        }
        table
    }

    /// Get table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get table schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Stored rows in insertion order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Autoincrement counter
    pub fn next_id(&self) -> i64 {
        self.next_id
    }

    /// Number of stored rows
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Insert a row, filling autoincrement columns and enforcing key
    /// constraints and validators. Returns the stored row.
    pub fn insert(&mut self, mut row: Row, validators: &ValidatorRegistry) -> Result<Row> {
        if let Some(column) = row.keys().find(|c| !self.schema.has_column(c)) {
            return Err(Error::UnknownColumn {
                table: self.name.clone(),
                column: column.clone(),
            });
        }

        let mut finalized = Row::with_capacity(self.schema.column_count());
        for (column, def) in self.schema.columns() {
            let value = match row.shift_remove(column) {
                Some(value) if !(value.is_null() && def.is_auto_increment()) => value,
                _ if def.is_auto_increment() => Value::Integer(self.next_auto_value(column)?),
                _ => return Err(Error::MissingColumn(column.to_string())),
            };
            self.check_value(column, def, &value, validators)?;
            self.check_unique(column, def, &value, &self.rows, None)?;
            finalized.insert(column.to_string(), value);
        }

        self.advance_counter(&finalized);
        self.rows.push(finalized.clone());
        Ok(finalized)
    }

    /// Insert rows in order, stopping at the first failure. Rows inserted
    /// before the failure stay in the table.
    pub fn insert_many(
        &mut self,
        rows: impl IntoIterator<Item = Row>,
        validators: &ValidatorRegistry,
    ) -> Result<Vec<Row>> {
        rows.into_iter()
            .map(|row| self.insert(row, validators))
            .collect()
    }

    /// Apply `changes` to every row matching `condition`. Keys outside the
    /// schema are ignored. Either every matching row is updated or none is.
    pub fn update(
        &mut self,
        condition: &Condition,
        changes: &Row,
        validators: &ValidatorRegistry,
    ) -> Result<usize> {
        let matched = self.matching_indices(condition)?;
        let changes: Vec<(&str, &ColumnDefinition, &Value)> = changes
            .iter()
            .filter_map(|(column, value)| {
                self.schema
                    .get_column(column)
                    .map(|def| (column.as_str(), def, value))
            })
            .collect();
        if matched.is_empty() || changes.is_empty() {
            return Ok(matched.len());
        }

        let mut staged = self.rows.clone();
        for &index in &matched {
            for &(column, _, value) in &changes {
                staged[index].insert(column.to_string(), value.clone());
            }
        }

        for &index in &matched {
            for &(column, def, value) in &changes {
                self.check_value(column, def, value, validators)?;
                self.check_unique(column, def, value, &staged, Some(index))?;
            }
        }

        for &index in &matched {
            self.advance_counter(&staged[index]);
        }
        self.rows = staged;
        Ok(matched.len())
    }

    /// Remove every row matching `condition`, returning how many were removed
    pub fn delete(&mut self, condition: &Condition) -> Result<usize> {
        let matched = self.matching_indices(condition)?;
        if matched.is_empty() {
            return Ok(0);
        }

        let mut remove = matched.iter().peekable();
        let mut index = 0;
        self.rows.retain(|_| {
            let keep = remove.next_if_eq(&&index).is_none();
            index += 1;
            keep
        });
        Ok(matched.len())
    }

    /// Copies of the rows matching `condition`, or of all rows
    pub fn select(&self, condition: Option<&Condition>) -> Result<Vec<Row>> {
        match condition {
            None => Ok(self.rows.clone()),
            Some(condition) => {
                let mut selected = Vec::new();
                for row in &self.rows {
                    if condition.matches(row)? {
                        selected.push(row.clone());
                    }
                }
                Ok(selected)
            }
        }
    }

    /// Remove all rows. The autoincrement counter is kept.
    pub fn truncate(&mut self) {
        self.rows.clear();
    }

    fn matching_indices(&self, condition: &Condition) -> Result<Vec<usize>> {
        let mut matched = Vec::new();
        for (index, row) in self.rows.iter().enumerate() {
            if condition.matches(row)? {
                matched.push(index);
            }
        }
        Ok(matched)
    }

    /// Highest stored value of an autoincrement column, 0 when empty
    fn max_auto_value(&self, column: &str) -> i64 {
        self.rows
            .iter()
            .filter_map(|row| row.get(column).and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
    }

    /// `max(existing values, default 0) + 1`
    fn next_auto_value(&self, column: &str) -> Result<i64> {
        let max = self.max_auto_value(column);
        max.checked_add(1)
            .ok_or_else(|| self.violation(column, Constraint::AutoIncrement, &Value::Integer(max)))
    }

    /// Smallest counter value consistent with the stored rows
    fn auto_increment_floor(&self) -> i64 {
        self.schema
            .auto_increment_columns()
            .into_iter()
            .map(|column| self.max_auto_value(column).saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    fn advance_counter(&mut self, row: &Row) {
        for column in self.schema.auto_increment_columns() {
            if let Some(value) = row.get(column).and_then(Value::as_i64) {
                self.next_id = self.next_id.max(value.saturating_add(1));
            }
        }
    }

    fn check_value(
        &self,
        column: &str,
        def: &ColumnDefinition,
        value: &Value,
        validators: &ValidatorRegistry,
    ) -> Result<()> {
        if !def.column_type.accepts(value) {
            return Err(Error::Validation {
                column: column.to_string(),
                reason: format!(
                    "expected {}, found {}",
                    def.column_type,
                    value.type_name()
                ),
            });
        }

        if value.is_null() {
            if def.is_primary() {
                return Err(self.violation(column, Constraint::Primary, value));
            }
            return Ok(());
        }

        if let Some(name) = &def.validator {
            let validator = validators.resolve(name)?;
            if !validator(value) {
                return Err(Error::Validation {
                    column: column.to_string(),
                    reason: format!("value {} rejected by validator '{}'", value, name),
                });
            }
        }
        Ok(())
    }

    /// Fail if another row in `rows` holds an equal value in a PRIMARY or
    /// UNIQUE column. NULLs never collide.
    fn check_unique(
        &self,
        column: &str,
        def: &ColumnDefinition,
        value: &Value,
        rows: &[Row],
        skip: Option<usize>,
    ) -> Result<()> {
        let Some(constraint) = def.key_constraint() else {
            return Ok(());
        };
        if value.is_null() {
            return Ok(());
        }

        let duplicate = rows
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != skip)
            .any(|(_, row)| row.get(column).is_some_and(|v| v.loose_eq(value)));
        if duplicate {
            return Err(self.violation(column, constraint, value));
        }
        Ok(())
    }

    fn violation(&self, column: &str, constraint: Constraint, value: &Value) -> Error {
        Error::ConstraintViolation {
            table: self.name.clone(),
            column: column.to_string(),
            constraint: constraint.to_string(),
            value: value.to_string(),
        }
    }
}
