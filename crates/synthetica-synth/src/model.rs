use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use synthetica_core::TableRegistry;

/// How many rows to synthesize per table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowCount {
    /// Exactly `n` rows for every table.
    Fixed(u64),
    /// `ceil(source_rows * factor)` rows, at least one.
    Scale(f64),
}

impl Default for RowCount {
    fn default() -> Self {
        RowCount::Scale(1.0)
    }
}

impl RowCount {
    pub fn resolve(self, source_rows: usize) -> u64 {
        match self {
            RowCount::Fixed(rows) => rows,
            RowCount::Scale(factor) => {
                let scaled = (source_rows as f64 * factor.max(0.0)).ceil();
                (scaled as u64).max(1)
            }
        }
    }
}

/// Options for the empirical synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthOptions {
    /// Run seed; each table derives its own stream from it.
    pub seed: u64,
    /// Maximum attempts to build a single row that passes every check.
    pub max_attempts_row: u32,
    /// Upper bound for unbounded repetition when sampling regex patterns.
    pub regex_max_repeat: u32,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            max_attempts_row: 50,
            regex_max_repeat: 8,
        }
    }
}

/// Summary of a synthesized table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub rows_source: u64,
    pub rows_requested: u64,
    pub rows_generated: u64,
    pub retries: u64,
}

/// Structured synthesis issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationIssue {
    pub level: String,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

/// Report for a synthesis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub seed: u64,
    pub compilation_fingerprint: String,
    pub table_order: Vec<String>,
    pub tables: Vec<TableReport>,
    pub retries_total: u64,
    pub fallback_count: u64,
    pub warnings_by_code: BTreeMap<String, u64>,
    pub warnings: Vec<GenerationIssue>,
}

impl GenerationReport {
    pub fn new(seed: u64, compilation_fingerprint: impl Into<String>) -> Self {
        Self {
            seed,
            compilation_fingerprint: compilation_fingerprint.into(),
            table_order: Vec::new(),
            tables: Vec::new(),
            retries_total: 0,
            fallback_count: 0,
            warnings_by_code: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn record_fallback(&mut self) {
        self.fallback_count += 1;
    }

    pub fn record_warning(&mut self, issue: GenerationIssue) {
        *self.warnings_by_code.entry(issue.code.clone()).or_insert(0) += 1;
        self.warnings.push(issue);
    }
}

/// Synthesized tables plus the run report.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub tables: TableRegistry,
    pub report: GenerationReport,
}
