use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

use synthetica_core::{CompilationResult, Relationship, Table, TableRegistry};
use synthetica_synth::{GenerationReport, SynthError, TableChecks, value_key};
use tracing::{info, warn};

use crate::errors::EvalError;
use crate::metrics::{
    ColumnStats, ConstraintSummary, METRICS_VERSION, MetricsReport, PerformanceMetrics,
    TableMetrics, WarningItem,
};
use crate::model::{EvaluateOptions, Evaluation, EvaluationResult, Violation};
use crate::report::render_report;

/// Evaluate synthesized tables against the compiled schema and constraints.
#[derive(Debug, Clone, Default)]
pub struct EvaluationEngine {
    options: EvaluateOptions,
}

impl EvaluationEngine {
    pub fn new(options: EvaluateOptions) -> Self {
        Self { options }
    }

    /// Compute metrics and violations without touching the filesystem.
    pub fn evaluate(
        &self,
        source: &TableRegistry,
        synthetic: &TableRegistry,
        compilation: &CompilationResult,
        generation: Option<&GenerationReport>,
    ) -> Result<Evaluation, EvalError> {
        let start = Instant::now();
        let mut warnings = Vec::new();
        let mut violations = Vec::new();
        let mut summary = ConstraintSummary::default();
        let mut tables = Vec::new();
        let mut column_stats = Vec::new();

        for source_table in source.iter() {
            let name = source_table.name();
            let expected = generation.and_then(|report| {
                report
                    .tables
                    .iter()
                    .find(|table| table.table == name)
                    .map(|table| table.rows_requested)
            });

            let Some(table) = synthetic.get(name) else {
                warnings.push(WarningItem {
                    code: "table_missing".to_string(),
                    path: name.to_string(),
                    message: format!("table '{name}' has no synthesized data"),
                    hint: Some("check the synthesis report for this table".to_string()),
                });
                tables.push(TableMetrics {
                    table: name.to_string(),
                    rows_source: source_table.row_count() as u64,
                    rows_expected: expected,
                    rows_found: 0,
                });
                continue;
            };

            let rows_found = table.row_count() as u64;
            if let Some(expected) = expected
                && expected != rows_found
            {
                warnings.push(WarningItem {
                    code: "row_count_mismatch".to_string(),
                    path: name.to_string(),
                    message: format!("expected {expected} rows, found {rows_found}"),
                    hint: None,
                });
            }
            tables.push(TableMetrics {
                table: name.to_string(),
                rows_source: source_table.row_count() as u64,
                rows_expected: expected,
                rows_found,
            });

            collect_column_stats(source_table, table, &mut column_stats);
            evaluate_primary_key(compilation, table, &mut summary, &mut violations);
            evaluate_descriptors(compilation, source_table, table, &mut summary, &mut violations)?;
        }

        for edge in compilation.relationships() {
            evaluate_foreign_key(
                edge,
                synthetic,
                &mut summary,
                &mut violations,
                &mut warnings,
            );
        }

        sort_violations(&mut violations);

        let metrics = MetricsReport {
            metrics_version: METRICS_VERSION.to_string(),
            compilation_fingerprint: compilation.fingerprint().to_string(),
            seed: generation.map(|report| report.seed),
            tables,
            column_stats,
            constraints: summary,
            warnings,
            performance: PerformanceMetrics {
                validate_ms: start.elapsed().as_millis(),
                total_ms: start.elapsed().as_millis(),
            },
        };

        info!(
            tables = metrics.tables.len(),
            violations = violations.len(),
            warnings = metrics.warnings.len(),
            "evaluation finished"
        );

        Ok(Evaluation {
            metrics,
            violations,
        })
    }

    /// Evaluate and write `metrics.json` and `report.md` into `out_dir`.
    ///
    /// In strict mode violations turn into an error after the artifacts are
    /// written.
    pub fn run(
        &self,
        source: &TableRegistry,
        synthetic: &TableRegistry,
        compilation: &CompilationResult,
        generation: Option<&GenerationReport>,
        out_dir: &Path,
    ) -> Result<EvaluationResult, EvalError> {
        let total_start = Instant::now();
        let Evaluation {
            mut metrics,
            violations,
        } = self.evaluate(source, synthetic, compilation, generation)?;
        metrics.performance.total_ms = total_start.elapsed().as_millis();

        let report = render_report(&metrics, &violations, self.options.max_examples);
        std::fs::create_dir_all(out_dir)?;

        let metrics_path = out_dir.join("metrics.json");
        std::fs::write(&metrics_path, serde_json::to_vec_pretty(&metrics)?)?;

        let report_path = out_dir.join("report.md");
        std::fs::write(&report_path, report.as_bytes())?;

        let violations_path = if self.options.write_violations {
            let path = out_dir.join("violations.json");
            std::fs::write(&path, serde_json::to_vec_pretty(&violations)?)?;
            Some(path)
        } else {
            None
        };

        if self.options.strict && !violations.is_empty() {
            warn!(violations = violations.len(), "strict evaluation failed");
            return Err(EvalError::Violations(violations.len() as u64));
        }

        Ok(EvaluationResult {
            out_dir: out_dir.to_path_buf(),
            metrics_path,
            report_path,
            violations_path,
            metrics,
            report,
            violations,
        })
    }
}

fn collect_column_stats(source: &Table, table: &Table, stats: &mut Vec<ColumnStats>) {
    for column in table.columns() {
        let null_count = table
            .column_values(column)
            .map(|values| values.filter(|value| value.is_null()).count())
            .unwrap_or(0) as u64;
        let source_nulls = source
            .column_values(column)
            .map(|values| values.filter(|value| value.is_null()).count())
            .unwrap_or(0);
        stats.push(ColumnStats {
            table: table.name().to_string(),
            column: column.clone(),
            null_count,
            null_rate: rate(null_count as usize, table.row_count()),
            source_null_rate: rate(source_nulls, source.row_count()),
        });
    }
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn evaluate_primary_key(
    compilation: &CompilationResult,
    table: &Table,
    summary: &mut ConstraintSummary,
    violations: &mut Vec<Violation>,
) {
    let Some(pk) = compilation
        .schema()
        .table(table.name())
        .and_then(|schema| schema.primary_key())
    else {
        return;
    };
    let path = format!("{}.{}", table.name(), pk.name);
    let Some(values) = table.column_values(&pk.name) else {
        summary.pk.violations += 1;
        violations.push(Violation {
            code: "pk_column_missing".to_string(),
            path,
            message: "primary key column missing from output".to_string(),
            row_index: None,
            example: None,
        });
        return;
    };

    let mut seen: HashSet<String> = HashSet::new();
    for (row_index, value) in values.enumerate() {
        summary.pk.checked += 1;
        let violation = if value.is_null() {
            Some(("pk_null", "primary key is null".to_string()))
        } else if !seen.insert(value_key(value)) {
            Some(("pk_duplicate", "duplicate primary key".to_string()))
        } else {
            None
        };
        if let Some((code, message)) = violation {
            summary.pk.violations += 1;
            violations.push(Violation {
                code: code.to_string(),
                path: path.clone(),
                message,
                row_index: Some(row_index as u64),
                example: Some(value.render()),
            });
        }
    }
}

fn evaluate_descriptors(
    compilation: &CompilationResult,
    source: &Table,
    table: &Table,
    summary: &mut ConstraintSummary,
    violations: &mut Vec<Violation>,
) -> Result<(), EvalError> {
    let descriptors: Vec<_> = compilation.constraints_for(table.name()).collect();
    if descriptors.is_empty() {
        return Ok(());
    }

    let mut per_kind: HashMap<&str, u64> = HashMap::new();
    for descriptor in &descriptors {
        *per_kind.entry(descriptor.kind()).or_insert(0) += 1;
    }
    for (kind, count) in &per_kind {
        if let Some(stats) = summary.stats_mut(kind) {
            stats.checked += count * table.row_count() as u64;
        }
    }

    let schema = compilation.schema().table(table.name()).ok_or_else(|| {
        EvalError::InvalidDataset(format!("table '{}' missing from schema", table.name()))
    })?;
    let checks = TableChecks::compile(descriptors.iter().copied(), source, schema)
        .map_err(SynthError::from)?;
    for (row_index, row) in table.rows().iter().enumerate() {
        for violation in checks.violations(table.columns(), row) {
            if let Some(stats) = summary.stats_mut(&violation.kind) {
                stats.violations += 1;
            }
            let example = violation
                .columns
                .iter()
                .filter_map(|column| table.value(row_index, column).map(|value| value.render()))
                .collect::<Vec<_>>()
                .join(", ");
            violations.push(Violation {
                code: violation.kind.clone(),
                path: format!("{}.{}", violation.table, violation.columns.join("+")),
                message: violation.message,
                row_index: Some(row_index as u64),
                example: Some(example),
            });
        }
    }

    Ok(())
}

fn evaluate_foreign_key(
    edge: &Relationship,
    synthetic: &TableRegistry,
    summary: &mut ConstraintSummary,
    violations: &mut Vec<Violation>,
    warnings: &mut Vec<WarningItem>,
) {
    let path = format!("{}.{}", edge.child_table, edge.child_column);
    let Some(child) = synthetic.get(&edge.child_table) else {
        return;
    };
    let parents: HashSet<String> = synthetic
        .get(&edge.parent_table)
        .and_then(|parent| parent.column_values(&edge.parent_column))
        .map(|values| values.filter(|value| !value.is_null()).map(value_key).collect())
        .unwrap_or_default();
    if parents.is_empty() && child.row_count() > 0 {
        warnings.push(WarningItem {
            code: "fk_parent_empty".to_string(),
            path: path.clone(),
            message: format!("no parent keys found for {edge}"),
            hint: Some(format!(
                "'{}' must be synthesized before '{}'",
                edge.parent_table, edge.child_table
            )),
        });
    }
    let Some(values) = child.column_values(&edge.child_column) else {
        return;
    };
    for (row_index, value) in values.enumerate() {
        if value.is_null() {
            continue;
        }
        summary.fk.checked += 1;
        if !parents.contains(&value_key(value)) {
            summary.fk.violations += 1;
            violations.push(Violation {
                code: "fk_missing_parent".to_string(),
                path: path.clone(),
                message: format!("no parent row for {edge}"),
                row_index: Some(row_index as u64),
                example: Some(value.render()),
            });
        }
    }
}

fn sort_violations(violations: &mut [Violation]) {
    violations.sort_by(|a, b| {
        (a.path.as_str(), a.row_index, a.code.as_str()).cmp(&(
            b.path.as_str(),
            b.row_index,
            b.code.as_str(),
        ))
    });
}
