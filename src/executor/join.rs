//! Nested loop join
//!
//! Rows are merged left then right, so right-hand fields win on a key
//! collision. Missing sides are padded with NULLs for the other table's
//! columns.

use crate::error::{Error, Result};
use crate::storage::{Row, TableDefinition, Value};
use std::fmt;
use std::str::FromStr;

/// Join mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JoinMode {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl FromStr for JoinMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinMode::Inner),
            "left" => Ok(JoinMode::Left),
            "right" => Ok(JoinMode::Right),
            "full" => Ok(JoinMode::Full),
            _ => Err(Error::InvalidJoinMode(s.to_string())),
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinMode::Inner => write!(f, "inner"),
            JoinMode::Left => write!(f, "left"),
            JoinMode::Right => write!(f, "right"),
            JoinMode::Full => write!(f, "full"),
        }
    }
}

/// Join two tables.
///
/// `Inner`, `Left` and `Full` iterate left rows in insertion order and, for
/// each, the right rows in insertion order. `Right` mirrors `Left` and
/// iterates right rows first. `Full` appends unmatched right rows after all
/// left groups; matches are tracked by row position, not by value.
pub fn join<P>(left: &TableDefinition, right: &TableDefinition, predicate: P, mode: JoinMode) -> Vec<Row>
where
    P: Fn(&Row, &Row) -> bool,
{
    let left_rows = left.rows();
    let right_rows = right.rows();
    let mut result = Vec::new();

    match mode {
        JoinMode::Inner | JoinMode::Left | JoinMode::Full => {
            let mut right_matched = vec![false; right_rows.len()];
            for l_row in left_rows {
                let mut matched = false;
                for (r_index, r_row) in right_rows.iter().enumerate() {
                    if predicate(l_row, r_row) {
                        result.push(merge(l_row, r_row));
                        right_matched[r_index] = true;
                        matched = true;
                    }
                }
                if !matched && mode != JoinMode::Inner {
                    result.push(pad_right(l_row, right));
                }
            }

            if mode == JoinMode::Full {
                for (r_row, _) in right_rows
                    .iter()
                    .zip(&right_matched)
                    .filter(|(_, matched)| !**matched)
                {
                    result.push(pad_left(left, r_row));
                }
            }
        }
        JoinMode::Right => {
            for r_row in right_rows {
                let mut matched = false;
                for l_row in left_rows {
                    if predicate(l_row, r_row) {
                        result.push(merge(l_row, r_row));
                        matched = true;
                    }
                }
                if !matched {
                    result.push(pad_left(left, r_row));
                }
            }
        }
    }

    result
}

fn merge(l_row: &Row, r_row: &Row) -> Row {
    let mut row = l_row.clone();
    row.extend(r_row.iter().map(|(k, v)| (k.clone(), v.clone())));
    row
}

/// Left row plus NULL for every right column it does not already carry
fn pad_right(l_row: &Row, right: &TableDefinition) -> Row {
    let mut row = l_row.clone();
    for column in right.schema().column_names() {
        if !row.contains_key(column) {
            row.insert(column.to_string(), Value::Null);
        }
    }
    row
}

/// NULL for every left column, overridden by the right row
fn pad_left(left: &TableDefinition, r_row: &Row) -> Row {
    let mut row: Row = left
        .schema()
        .column_names()
        .into_iter()
        .map(|column| (column.to_string(), Value::Null))
        .collect();
    row.extend(r_row.iter().map(|(k, v)| (k.clone(), v.clone())));
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDefinition, Schema, ValidatorRegistry};
    use crate::row;
    use pretty_assertions::assert_eq;

    fn table(name: &str, schema: Schema, rows: Vec<Row>) -> TableDefinition {
        let mut table = TableDefinition::new(name, schema);
        table.insert_many(rows, &ValidatorRegistry::new()).unwrap();
        table
    }

    fn a_and_b() -> (TableDefinition, TableDefinition) {
        let a = table(
            "a",
            Schema::new()
                .column("id", ColumnDefinition::int())
                .column("name", ColumnDefinition::str()),
            vec![row! { "id" => 1, "name" => "x" }, row! { "id" => 2, "name" => "y" }],
        );
        let b = table(
            "b",
            Schema::new()
                .column("id", ColumnDefinition::int())
                .column("val", ColumnDefinition::str()),
            vec![row! { "id" => 1, "val" => "a" }],
        );
        (a, b)
    }

    fn same_id(l: &Row, r: &Row) -> bool {
        l["id"] == r["id"]
    }

    #[test]
    fn test_inner_join() {
        let (a, b) = a_and_b();
        assert_eq!(
            join(&a, &b, same_id, JoinMode::Inner),
            vec![row! { "id" => 1, "name" => "x", "val" => "a" }]
        );
    }

    #[test]
    fn test_left_join_pads_with_null() {
        let (a, b) = a_and_b();
        let rows = join(&a, &b, same_id, JoinMode::Left);
        assert_eq!(
            rows,
            vec![
                row! { "id" => 1, "name" => "x", "val" => "a" },
                row! { "id" => 2, "name" => "y", "val" => () },
            ]
        );
        assert_eq!(join(&a, &b, same_id, JoinMode::Full), rows);
    }

    #[test]
    fn test_right_join() {
        let (a, b) = a_and_b();
        assert_eq!(
            join(&a, &b, same_id, JoinMode::Right),
            vec![row! { "id" => 1, "name" => "x", "val" => "a" }]
        );

        let (a, b) = a_and_b();
        let rows = join(&b, &a, same_id, JoinMode::Right);
        assert_eq!(
            rows,
            vec![
                row! { "id" => 1, "val" => "a", "name" => "x" },
                row! { "id" => 2, "val" => (), "name" => "y" },
            ]
        );
    }

    #[test]
    fn test_full_join_keeps_value_equal_rows() {
        let schema = || Schema::new().column("k", ColumnDefinition::int());
        let left = table("l", Schema::new().column("id", ColumnDefinition::int()), vec![row! { "id" => 1 }]);
        let right = table("r", schema(), vec![row! { "k" => 7 }, row! { "k" => 7 }, row! { "k" => 1 }]);

        let rows = join(&left, &right, |l, r| l["id"] == r["k"], JoinMode::Full);
        assert_eq!(
            rows,
            vec![
                row! { "id" => 1, "k" => 1 },
                row! { "id" => (), "k" => 7 },
                row! { "id" => (), "k" => 7 },
            ]
        );
    }

    #[test]
    fn test_right_fields_win_on_collision() {
        let (a, b) = a_and_b();
        let rows = join(&a, &b, |_, _| true, JoinMode::Inner);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["id"], Value::Integer(1));
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("LEFT".parse::<JoinMode>().unwrap(), JoinMode::Left);
        assert_eq!("full".parse::<JoinMode>().unwrap(), JoinMode::Full);
        assert!(matches!("outer".parse::<JoinMode>(), Err(Error::InvalidJoinMode(_))));
    }
}
