//! Store file persistence
//!
//! The whole catalog is written as one JSON document:
//!
//! ```text
//! { "type": "database", "tables": {
//!     "<name>": { "type": "table", "columns": {..}, "data": [..], "current_id": 0 }
//! } }
//! ```
//!
//! Saves go to a temporary file in the target directory which is synced and
//! then renamed over the target, so a crash never leaves a partial file.

use super::table::TableDefinition;
use super::value::Row;
use crate::catalog::{Catalog, Schema, ValidatorRegistry};
use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

const DATABASE_TAG: &str = "database";
const TABLE_TAG: &str = "table";

#[derive(Serialize)]
struct DatabaseDocument<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    tables: IndexMap<&'a str, TableDocument<'a>>,
}

#[derive(Serialize)]
struct TableDocument<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    columns: &'a Schema,
    data: &'a [Row],
    current_id: i64,
}

#[derive(Deserialize)]
struct StoredDatabase {
    #[serde(rename = "type")]
    kind: String,
    tables: IndexMap<String, StoredTable>,
}

#[derive(Deserialize)]
struct StoredTable {
    #[serde(rename = "type")]
    kind: String,
    columns: Schema,
    data: Vec<Row>,
    #[serde(default)]
    current_id: i64,
}

/// Serialize a catalog to the store document
pub fn encode(catalog: &Catalog, pretty: bool) -> serde_json::Result<Vec<u8>> {
    let document = DatabaseDocument {
        kind: DATABASE_TAG,
        tables: catalog
            .tables()
            .map(|table| {
                let doc = TableDocument {
                    kind: TABLE_TAG,
                    columns: table.schema(),
                    data: table.rows(),
                    current_id: table.next_id(),
                };
                (table.name(), doc)
            })
            .collect(),
    };

    if pretty {
        serde_json::to_vec_pretty(&document)
    } else {
        serde_json::to_vec(&document)
    }
}

/// Atomically replace the file at `path` with the encoded catalog
pub fn save(catalog: &Catalog, path: &Path, pretty: bool) -> Result<()> {
    let bytes = encode(catalog, pretty).map_err(|e| Error::persistence(path, e.into()))?;
    write_atomic(path, &bytes).map_err(|e| Error::persistence(path, e))?;
    debug!(path = %path.display(), bytes = bytes.len(), "store saved");
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    if let Ok(meta) = fs::metadata(path) {
        file.as_file().set_permissions(meta.permissions())?;
    }
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;

    // Make the rename itself durable where the platform allows it
    if let Ok(dir) = File::open(dir) {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// Parse a store document. Validator names are resolved against `validators`.
pub fn decode(path: &Path, content: &str, validators: &ValidatorRegistry) -> Result<Catalog> {
    if content.trim().is_empty() {
        return Ok(Catalog::new());
    }

    let stored: StoredDatabase =
        serde_json::from_str(content).map_err(|e| Error::corrupt(path, e))?;
    if stored.kind != DATABASE_TAG {
        return Err(Error::corrupt(
            path,
            format!("expected type '{}', found '{}'", DATABASE_TAG, stored.kind),
        ));
    }

    let mut catalog = Catalog::new();
    for (name, table) in stored.tables {
        if table.kind != TABLE_TAG {
            return Err(Error::corrupt(
                path,
                format!("table '{}': expected type '{}', found '{}'", name, TABLE_TAG, table.kind),
            ));
        }
        for validator in table.columns.validators() {
            validators.resolve(validator)?;
        }
        for (position, row) in table.data.iter().enumerate() {
            check_row_shape(&table.columns, row).map_err(|reason| {
                Error::corrupt(path, format!("table '{}' row {}: {}", name, position, reason))
            })?;
        }
        catalog.restore_table(TableDefinition::from_parts(
            name,
            table.columns,
            table.data,
            table.current_id,
        ))?;
    }
    Ok(catalog)
}

fn check_row_shape(schema: &Schema, row: &Row) -> std::result::Result<(), String> {
    if let Some(column) = row.keys().find(|c| !schema.has_column(c)) {
        return Err(format!("undeclared column '{}'", column));
    }
    if let Some(column) = schema.column_names().into_iter().find(|c| !row.contains_key(*c)) {
        return Err(format!("missing column '{}'", column));
    }
    Ok(())
}

/// Load the store at `path`. An absent file is an empty database.
pub fn load(path: &Path, validators: &ValidatorRegistry) -> Result<Catalog> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "store file absent, starting empty");
            return Ok(Catalog::new());
        }
        Err(e) => return Err(Error::corrupt(path, e)),
    };

    let catalog = decode(path, &content, validators)?;
    debug!(path = %path.display(), tables = catalog.list_tables().len(), "store loaded");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDefinition;
    use crate::row;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample(validators: &ValidatorRegistry) -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .create_table(
                "user",
                Schema::new()
                    .column("id", ColumnDefinition::int().auto_increment())
                    .column("email", ColumnDefinition::email()),
                validators,
            )
            .unwrap();
        let table = catalog.get_table_mut("user").unwrap();
        table.insert(row! { "email" => "a@b.co" }, validators).unwrap();
        table.insert(row! { "email" => "c@d.co" }, validators).unwrap();
        catalog
    }

    #[test]
    fn test_document_layout() {
        let validators = ValidatorRegistry::with_builtins();
        let bytes = encode(&sample(&validators), false).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "database",
                "tables": {
                    "user": {
                        "type": "table",
                        "columns": {
                            "id": {"type": "int", "options": ["autoincrement"]},
                            "email": {"type": "str", "options": [], "validate": "email"}
                        },
                        "data": [{"id": 1, "email": "a@b.co"}, {"id": 2, "email": "c@d.co"}],
                        "current_id": 3
                    }
                }
            })
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let validators = ValidatorRegistry::with_builtins();
        let catalog = sample(&validators);

        save(&catalog, &path, true).unwrap();
        let loaded = load(&path, &validators).unwrap();
        assert_eq!(loaded, catalog);

        // No temporary files are left behind
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_load_absent_and_blank() {
        let dir = TempDir::new().unwrap();
        let validators = ValidatorRegistry::new();

        let absent = load(&dir.path().join("missing.json"), &validators).unwrap();
        assert!(absent.list_tables().is_empty());

        let blank = dir.path().join("blank.json");
        fs::write(&blank, "  \n").unwrap();
        assert!(load(&blank, &validators).unwrap().list_tables().is_empty());
    }

    #[test]
    fn test_load_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let validators = ValidatorRegistry::new();

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path, &validators), Err(Error::CorruptStore { .. })));

        fs::write(&path, r#"{"type": "table", "tables": {}}"#).unwrap();
        assert!(matches!(load(&path, &validators), Err(Error::CorruptStore { .. })));

        fs::write(
            &path,
            r#"{"type": "database", "tables": {"t": {"type": "table",
                "columns": {"id": {"type": "int", "options": []}},
                "data": [{"other": 1}], "current_id": 0}}}"#,
        )
        .unwrap();
        assert!(matches!(load(&path, &validators), Err(Error::CorruptStore { .. })));

        // The unreadable file is left as it was
        assert!(fs::read_to_string(&path).unwrap().contains("other"));
    }

    #[test]
    fn test_load_legacy_counter() {
        let validators = ValidatorRegistry::with_builtins();
        let content = r#"{"type": "database", "tables": {"user": {"type": "table",
            "columns": {"id": {"type": "int", "options": ["autoincrement"]}},
            "data": [{"id": 1}, {"id": 2}], "current_id": 0}}}"#;

        let catalog = decode(Path::new("legacy.json"), content, &validators).unwrap();
        assert_eq!(catalog.get_table("user").unwrap().next_id(), 3);
    }

    #[test]
    fn test_load_unknown_validator() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        save(&sample(&ValidatorRegistry::with_builtins()), &path, false).unwrap();

        let result = load(&path, &ValidatorRegistry::new());
        assert!(matches!(result, Err(Error::UnknownValidator(_))));
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope").join("index.json");
        let result = save(&Catalog::new(), &path, false);
        assert!(matches!(result, Err(Error::Persistence { .. })));
    }
}
