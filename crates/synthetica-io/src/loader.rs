use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value as JsonValue};
use synthetica_core::{Table, TableRegistry, Value};
use tracing::{info, warn};

use crate::errors::{DataError, Result};

/// File extensions probed for each table, in order.
pub const SOURCE_EXTENSIONS: [&str; 3] = ["csv", "json", "jsonl"];

/// Loads source tables from `<dir>/<table>.<ext>` files.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dir: PathBuf,
}

impl DataLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First existing file for `table`, probing csv, json, jsonl.
    pub fn locate(&self, table: &str) -> Option<PathBuf> {
        SOURCE_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{table}.{ext}")))
            .find(|path| path.is_file())
    }

    /// Load every named table that has a file. Tables without a file are
    /// skipped with a warning.
    pub fn load<I, S>(&self, tables: I) -> Result<TableRegistry>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = TableRegistry::new();

        for table in tables {
            let table = table.as_ref();
            if registry.contains(table) {
                continue;
            }
            let Some(path) = self.locate(table) else {
                warn!(
                    table = %table,
                    dir = %self.dir.display(),
                    "no source file found for table; skipping"
                );
                continue;
            };

            let loaded = read_table(table, &path)?;
            info!(
                table = %table,
                path = %path.display(),
                rows = loaded.row_count(),
                columns = loaded.columns().len(),
                "table loaded"
            );
            registry.insert(loaded)?;
        }

        Ok(registry)
    }
}

/// Read one table file, choosing the parser by extension.
pub fn read_table(name: &str, path: &Path) -> Result<Table> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => read_csv(name, path),
        Some("json") => read_json(name, path),
        Some("jsonl") => read_json_lines(name, path),
        other => Err(DataError::Format {
            path: path.to_path_buf(),
            message: format!("unsupported extension {other:?}"),
        }),
    }
}

fn read_csv(name: &str, path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut table = Table::new(name, columns);
    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(Value::parse).collect())?;
    }
    Ok(table)
}

fn read_json(name: &str, path: &Path) -> Result<Table> {
    let contents = fs::read_to_string(path)?;
    match serde_json::from_str::<JsonValue>(&contents) {
        Ok(JsonValue::Array(items)) => records_to_table(name, path, items),
        _ => parse_json_lines(name, path, &contents),
    }
}

fn read_json_lines(name: &str, path: &Path) -> Result<Table> {
    let contents = fs::read_to_string(path)?;
    parse_json_lines(name, path, &contents)
}

fn parse_json_lines(name: &str, path: &Path, contents: &str) -> Result<Table> {
    let records = contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str::<JsonValue>)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    records_to_table(name, path, records)
}

fn records_to_table(name: &str, path: &Path, records: Vec<JsonValue>) -> Result<Table> {
    let mut objects: Vec<Map<String, JsonValue>> = Vec::with_capacity(records.len());
    let mut columns: Vec<String> = Vec::new();

    for (idx, record) in records.into_iter().enumerate() {
        let JsonValue::Object(object) = record else {
            return Err(DataError::Format {
                path: path.to_path_buf(),
                message: format!("record {idx} is not a JSON object"),
            });
        };
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
        objects.push(object);
    }

    let mut table = Table::new(name, columns.clone());
    for object in objects {
        let row = columns
            .iter()
            .map(|column| object.get(column).map(Value::from_json).unwrap_or(Value::Null))
            .collect();
        table.push_row(row)?;
    }
    Ok(table)
}
