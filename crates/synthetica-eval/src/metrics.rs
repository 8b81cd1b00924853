use serde::{Deserialize, Serialize};

/// Metrics contract version for dataset evaluation.
pub const METRICS_VERSION: &str = "0.1";

/// Machine-readable metrics for a dataset evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub metrics_version: String,
    pub compilation_fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub tables: Vec<TableMetrics>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub column_stats: Vec<ColumnStats>,
    pub constraints: ConstraintSummary,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<WarningItem>,
    pub performance: PerformanceMetrics,
}

impl MetricsReport {
    pub fn violations_total(&self) -> u64 {
        let summary = &self.constraints;
        summary.pk.violations
            + summary.fk.violations
            + summary.range.violations
            + summary.pattern.violations
            + summary.fixed_combination.violations
    }
}

/// Per-table row counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetrics {
    pub table: String,
    pub rows_source: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_expected: Option<u64>,
    pub rows_found: u64,
}

/// Null counts per column, compared with the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub table: String,
    pub column: String,
    pub null_count: u64,
    pub null_rate: f64,
    pub source_null_rate: f64,
}

/// Summary of constraint validation outcomes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSummary {
    pub pk: ConstraintStats,
    pub fk: ConstraintStats,
    pub range: ConstraintStats,
    pub pattern: ConstraintStats,
    pub fixed_combination: ConstraintStats,
}

impl ConstraintSummary {
    pub fn stats_mut(&mut self, kind: &str) -> Option<&mut ConstraintStats> {
        match kind {
            "pk" => Some(&mut self.pk),
            "fk" => Some(&mut self.fk),
            "range" => Some(&mut self.range),
            "pattern" => Some(&mut self.pattern),
            "fixed_combination" => Some(&mut self.fixed_combination),
            _ => None,
        }
    }
}

/// Generic constraint counter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintStats {
    pub checked: u64,
    pub violations: u64,
}

/// Structured warning entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningItem {
    pub code: String,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Performance timings for the evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub validate_ms: u128,
    pub total_ms: u128,
}
