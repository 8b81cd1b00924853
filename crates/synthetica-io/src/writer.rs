use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use synthetica_core::TableRegistry;
use tracing::info;

use crate::errors::{DataError, Result};
use crate::output::csv::write_table_csv;
use crate::output::json::{write_table_json, write_table_json_lines};

/// Output file format for synthesized tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
    Jsonl,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Jsonl => "jsonl",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = DataError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "jsonl" => Ok(OutputFormat::Jsonl),
            other => Err(DataError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// One written output artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenTable {
    pub table: String,
    pub path: PathBuf,
    pub rows: u64,
    pub bytes: u64,
}

/// Writes every table of a registry to `<dir>/<table>.<ext>`.
#[derive(Debug, Clone)]
pub struct DataWriter {
    dir: PathBuf,
    format: OutputFormat,
}

impl DataWriter {
    pub fn new(dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Create the output directory and write one file per table, in
    /// registry order.
    pub fn write(&self, tables: &TableRegistry) -> Result<Vec<WrittenTable>> {
        fs::create_dir_all(&self.dir)?;

        let mut written = Vec::with_capacity(tables.len());
        for table in tables.iter() {
            let path = self
                .dir
                .join(format!("{}.{}", table.name(), self.format.extension()));
            let bytes = match self.format {
                OutputFormat::Csv => write_table_csv(&path, table)?,
                OutputFormat::Json => write_table_json(&path, table)?,
                OutputFormat::Jsonl => write_table_json_lines(&path, table)?,
            };
            info!(
                table = %table.name(),
                path = %path.display(),
                rows = table.row_count(),
                bytes,
                "table written"
            );
            written.push(WrittenTable {
                table: table.name().to_string(),
                path,
                rows: table.row_count() as u64,
                bytes,
            });
        }

        Ok(written)
    }
}
