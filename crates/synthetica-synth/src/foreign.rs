use std::collections::BTreeMap;

use rand::Rng;
use synthetica_core::{Table, TableSchema, Value};

use crate::errors::{Result, SynthError};

/// Source of parent key values for foreign-key columns.
pub trait ForeignContext {
    /// Generated values of `table.column`, if that table was generated.
    fn candidates(&self, table: &str, column: &str) -> Option<&[Value]>;

    /// Draw one parent key uniformly.
    fn pick<R: Rng>(&self, table: &str, column: &str, rng: &mut R) -> Result<Value> {
        let values = self.candidates(table, column).unwrap_or_default();
        if values.is_empty() {
            return Err(SynthError::Unsatisfiable(format!(
                "no parent rows for foreign key target {table}.{column}"
            )));
        }
        Ok(values[rng.random_range(0..values.len())].clone())
    }
}

/// Primary-key values of already generated tables.
#[derive(Debug, Default)]
pub struct InMemoryForeignContext {
    keys: BTreeMap<String, BTreeMap<String, Vec<Value>>>,
}

impl InMemoryForeignContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the non-null primary-key values of a generated table.
    pub fn ingest_table(&mut self, table: &Table, schema: &TableSchema) {
        let Some(pk) = schema.primary_key() else {
            return;
        };
        let values: Vec<Value> = table
            .column_values(&pk.name)
            .map(|values| values.filter(|value| !value.is_null()).cloned().collect())
            .unwrap_or_default();
        self.keys
            .entry(table.name().to_string())
            .or_default()
            .insert(pk.name.clone(), values);
    }
}

impl ForeignContext for InMemoryForeignContext {
    fn candidates(&self, table: &str, column: &str) -> Option<&[Value]> {
        self.keys
            .get(table)
            .and_then(|columns| columns.get(column))
            .map(Vec::as_slice)
    }
}
