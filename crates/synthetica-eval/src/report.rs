use crate::metrics::{ConstraintStats, MetricsReport};
use crate::model::Violation;

/// Render a deterministic markdown report from metrics and violations.
pub fn render_report(
    metrics: &MetricsReport,
    violations: &[Violation],
    max_examples: usize,
) -> String {
    let mut lines = Vec::new();

    lines.push("# Synthetica Evaluation Report".to_string());
    lines.push(String::new());
    lines.push("## Run summary".to_string());
    lines.push(format!(
        "- compilation_fingerprint: {}",
        metrics.compilation_fingerprint
    ));
    let seed = metrics
        .seed
        .map(|seed| seed.to_string())
        .unwrap_or_else(|| "-".to_string());
    lines.push(format!("- seed: {seed}"));
    lines.push(format!("- violations: {}", metrics.violations_total()));
    lines.push(String::new());

    lines.push("## Tables and row counts".to_string());
    lines.push("| table | rows_source | rows_expected | rows_found |".to_string());
    lines.push("| --- | --- | --- | --- |".to_string());
    for table in &metrics.tables {
        let expected = table
            .rows_expected
            .map(|value| value.to_string())
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "| {} | {} | {} | {} |",
            table.table, table.rows_source, expected, table.rows_found
        ));
    }
    lines.push(String::new());

    lines.push("## Constraint summary".to_string());
    lines.push("| constraint | checked | violations |".to_string());
    lines.push("| --- | --- | --- |".to_string());
    let summary = &metrics.constraints;
    push_constraint_row(&mut lines, "pk", &summary.pk);
    push_constraint_row(&mut lines, "fk", &summary.fk);
    push_constraint_row(&mut lines, "range", &summary.range);
    push_constraint_row(&mut lines, "pattern", &summary.pattern);
    push_constraint_row(&mut lines, "fixed_combination", &summary.fixed_combination);
    lines.push(String::new());

    let drifted: Vec<_> = metrics
        .column_stats
        .iter()
        .filter(|stats| (stats.null_rate - stats.source_null_rate).abs() > 0.1)
        .collect();
    if !drifted.is_empty() {
        lines.push("## Null rate drift".to_string());
        for stats in drifted {
            lines.push(format!(
                "- {}.{}: source {:.2}, synthetic {:.2}",
                stats.table, stats.column, stats.source_null_rate, stats.null_rate
            ));
        }
        lines.push(String::new());
    }

    if !metrics.warnings.is_empty() {
        lines.push("## Warnings".to_string());
        for warning in &metrics.warnings {
            let hint = warning
                .hint
                .as_ref()
                .map(|hint| format!(" (hint: {hint})"))
                .unwrap_or_default();
            lines.push(format!("- {}: {}{}", warning.path, warning.message, hint));
        }
        lines.push(String::new());
    }

    if !violations.is_empty() {
        lines.push("## Top violations".to_string());
        for violation in violations.iter().take(max_examples) {
            let row = violation
                .row_index
                .map(|row| format!(" row {row}"))
                .unwrap_or_default();
            let example = violation
                .example
                .as_ref()
                .map(|value| format!(" example={value}"))
                .unwrap_or_default();
            lines.push(format!(
                "- {}{}: {}{}",
                violation.path, row, violation.message, example
            ));
        }
        lines.push(String::new());
    }

    lines.push("## Recommendations".to_string());
    lines.extend(recommendations(metrics, violations));
    lines.join("\n")
}

fn push_constraint_row(lines: &mut Vec<String>, name: &str, stats: &ConstraintStats) {
    lines.push(format!(
        "| {} | {} | {} |",
        name, stats.checked, stats.violations
    ));
}

fn recommendations(metrics: &MetricsReport, violations: &[Violation]) -> Vec<String> {
    let summary = &metrics.constraints;
    let mut lines = Vec::new();
    if summary.pk.violations > 0 {
        lines.push("- primary keys must be unique and non-null; check the key sampler.".to_string());
    }
    if summary.fk.violations > 0 {
        lines.push("- ensure parent tables are synthesized before children.".to_string());
    }
    if summary.range.violations > 0 || summary.pattern.violations > 0 {
        lines.push("- raise max_attempts_row or relax the failing range/regex rules.".to_string());
    }
    if summary.fixed_combination.violations > 0 {
        lines.push("- sample fixed_combinations columns jointly from the source.".to_string());
    }
    if violations.is_empty() {
        lines.push("- no violations detected; compare metrics across runs for drift.".to_string());
    }
    lines
}
