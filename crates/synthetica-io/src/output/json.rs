use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Value as JsonValue};
use synthetica_core::Table;

use super::CountingWriter;
use crate::errors::Result;

fn record(table: &Table, row: &[synthetica_core::Value]) -> JsonValue {
    let object: Map<String, JsonValue> = table
        .columns()
        .iter()
        .zip(row)
        .map(|(column, value)| (column.clone(), value.to_json()))
        .collect();
    JsonValue::Object(object)
}

/// Write a table as a JSON array of records.
pub fn write_table_json(path: &Path, table: &Table) -> Result<u64> {
    let mut writer = CountingWriter::new(BufWriter::new(File::create(path)?));
    let records: Vec<JsonValue> = table
        .rows()
        .iter()
        .map(|row| record(table, row))
        .collect();
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(writer.bytes_written())
}

/// Write a table as JSON lines, one record per line.
pub fn write_table_json_lines(path: &Path, table: &Table) -> Result<u64> {
    let mut writer = CountingWriter::new(BufWriter::new(File::create(path)?));
    for row in table.rows() {
        serde_json::to_writer(&mut writer, &record(table, row))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(writer.bytes_written())
}
