use std::collections::BTreeSet;

use regex::Regex;
use tracing::warn;

use crate::constraints::{
    ConstraintDescriptor, FixedCombinationConstraint, PatternConstraint, RangeConstraint,
};
use crate::error::{Error, Result};
use crate::rules::{Rule, RuleEntry};
use crate::schema::{Schema, SemanticType, TableSchema};

/// Translate value rules into constraint descriptors, in rule order.
///
/// `primary_key` and `foreign_key` rules are schema side effects owned by the
/// schema builder and produce no descriptor here.
pub fn compile_constraints(rules: &[RuleEntry], schema: &Schema) -> Result<Vec<ConstraintDescriptor>> {
    let mut descriptors = Vec::new();

    for entry in rules {
        let descriptor = match &entry.rule {
            Rule::Range { low, high, strict } => compile_range(entry, schema, *low, *high, *strict)?,
            Rule::FixedCombinations { columns } => compile_fixed(entry, schema, columns)?,
            Rule::Regex { pattern } => compile_pattern(entry, schema, pattern)?,
            Rule::PrimaryKey | Rule::ForeignKey { .. } => continue,
        };
        descriptors.push(descriptor);
    }

    Ok(descriptors)
}

fn compile_range(
    entry: &RuleEntry,
    schema: &Schema,
    low: f64,
    high: f64,
    strict: bool,
) -> Result<ConstraintDescriptor> {
    let table = table_schema(entry, schema)?;
    let column = table.column(&entry.column).ok_or_else(|| missing_column(entry, &entry.column))?;

    if low > high {
        return Err(Error::Constraint(format!(
            "range rule on {}.{}: low ({low}) is greater than high ({high})",
            entry.table, entry.column
        )));
    }
    if strict && low == high {
        return Err(Error::Constraint(format!(
            "range rule on {}.{}: strict bounds {low}..{high} admit no value",
            entry.table, entry.column
        )));
    }
    if column.semantic_type != SemanticType::Numeric {
        warn!(
            table = %entry.table,
            column = %entry.column,
            semantic_type = %column.semantic_type,
            "range rule applied to a non-numeric column"
        );
    }

    Ok(ConstraintDescriptor::Range(RangeConstraint {
        table: entry.table.clone(),
        column: entry.column.clone(),
        low,
        high,
        strict,
    }))
}

fn compile_fixed(
    entry: &RuleEntry,
    schema: &Schema,
    columns: &[String],
) -> Result<ConstraintDescriptor> {
    if columns.len() < 2 {
        return Err(Error::Constraint(format!(
            "fixed_combinations rule on {}.{} needs at least 2 columns, got {}",
            entry.table,
            entry.column,
            columns.len()
        )));
    }

    let table = table_schema(entry, schema)?;
    let mut seen = BTreeSet::new();
    for column in columns {
        if !seen.insert(column.as_str()) {
            return Err(Error::Constraint(format!(
                "fixed_combinations rule on {}.{} lists column '{}' twice",
                entry.table, entry.column, column
            )));
        }
        if table.column(column).is_none() {
            return Err(missing_column(entry, column));
        }
    }

    Ok(ConstraintDescriptor::FixedCombination(
        FixedCombinationConstraint {
            table: entry.table.clone(),
            columns: columns.to_vec(),
        },
    ))
}

fn compile_pattern(
    entry: &RuleEntry,
    schema: &Schema,
    pattern: &str,
) -> Result<ConstraintDescriptor> {
    if pattern.is_empty() {
        return Err(Error::Constraint(format!(
            "regex rule on {}.{} has an empty pattern",
            entry.table, entry.column
        )));
    }
    Regex::new(pattern).map_err(|err| {
        Error::Constraint(format!(
            "regex rule on {}.{} has an invalid pattern: {err}",
            entry.table, entry.column
        ))
    })?;

    let table = table_schema(entry, schema)?;
    if table.column(&entry.column).is_none() {
        return Err(missing_column(entry, &entry.column));
    }

    Ok(ConstraintDescriptor::Pattern(PatternConstraint {
        table: entry.table.clone(),
        column: entry.column.clone(),
        pattern: pattern.to_string(),
    }))
}

fn table_schema<'s>(entry: &RuleEntry, schema: &'s Schema) -> Result<&'s TableSchema> {
    schema.table(&entry.table).ok_or_else(|| {
        Error::MissingTable(format!(
            "table '{}' referenced by {} rule has no data",
            entry.table,
            entry.rule.kind()
        ))
    })
}

fn missing_column(entry: &RuleEntry, column: &str) -> Error {
    Error::Constraint(format!(
        "{} rule on {}.{} references missing column {}.{}",
        entry.rule.kind(),
        entry.table,
        entry.column,
        entry.table,
        column
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, TableSchema};

    fn schema() -> Schema {
        Schema {
            tables: vec![TableSchema {
                name: "orders".to_string(),
                columns: vec![
                    ColumnSchema::new("order_id", SemanticType::Numeric),
                    ColumnSchema::new("amount", SemanticType::Numeric),
                    ColumnSchema::new("currency", SemanticType::Categorical),
                    ColumnSchema::new("country", SemanticType::Categorical),
                ],
            }],
        }
    }

    fn entry(column: &str, rule: Rule) -> RuleEntry {
        RuleEntry {
            table: "orders".to_string(),
            column: column.to_string(),
            rule,
        }
    }

    #[test]
    fn equal_bounds_are_accepted_when_not_strict() {
        let rules = vec![entry(
            "amount",
            Rule::Range {
                low: 5.0,
                high: 5.0,
                strict: false,
            },
        )];
        let descriptors = compile_constraints(&rules, &schema()).expect("compile");
        assert_eq!(descriptors.len(), 1);
    }

    #[test]
    fn inverted_bounds_fail() {
        let rules = vec![entry(
            "amount",
            Rule::Range {
                low: 10.0,
                high: 1.0,
                strict: false,
            },
        )];
        let err = compile_constraints(&rules, &schema()).unwrap_err();
        assert!(matches!(err, Error::Constraint(_)));
    }

    #[test]
    fn fixed_combinations_reject_unknown_columns() {
        let rules = vec![entry(
            "currency",
            Rule::FixedCombinations {
                columns: vec!["currency".to_string(), "region".to_string()],
            },
        )];
        let err = compile_constraints(&rules, &schema()).unwrap_err();
        assert!(matches!(err, Error::Constraint(ref msg) if msg.contains("orders.region")));
    }

    #[test]
    fn fixed_combinations_reject_duplicates() {
        let rules = vec![entry(
            "currency",
            Rule::FixedCombinations {
                columns: vec!["currency".to_string(), "currency".to_string()],
            },
        )];
        assert!(compile_constraints(&rules, &schema()).is_err());
    }

    #[test]
    fn invalid_pattern_fails() {
        let rules = vec![entry(
            "currency",
            Rule::Regex {
                pattern: "([A-Z]".to_string(),
            },
        )];
        let err = compile_constraints(&rules, &schema()).unwrap_err();
        assert!(matches!(err, Error::Constraint(_)));
    }

    #[test]
    fn identifier_rules_emit_nothing() {
        let rules = vec![
            entry("order_id", Rule::PrimaryKey),
            entry(
                "amount",
                Rule::ForeignKey {
                    referenced_table: "x".to_string(),
                    referenced_column: "y".to_string(),
                },
            ),
        ];
        let descriptors = compile_constraints(&rules, &schema()).expect("compile");
        assert!(descriptors.is_empty());
    }

    #[test]
    fn strict_equal_bounds_fail() {
        let rules = vec![entry(
            "amount",
            Rule::Range {
                low: 5.0,
                high: 5.0,
                strict: true,
            },
        )];
        let err = compile_constraints(&rules, &schema()).unwrap_err();
        assert!(matches!(err, Error::Constraint(ref msg) if msg.contains("orders.amount")));
    }

    #[test]
    fn empty_pattern_fails() {
        let rules = vec![entry(
            "currency",
            Rule::Regex {
                pattern: String::new(),
            },
        )];
        let err = compile_constraints(&rules, &schema()).unwrap_err();
        assert!(matches!(err, Error::Constraint(ref msg) if msg.contains("orders.currency")));
    }

    #[test]
    fn range_on_missing_column_fails() {
        let rules = vec![entry(
            "discount",
            Rule::Range {
                low: 0.0,
                high: 1.0,
                strict: false,
            },
        )];
        let err = compile_constraints(&rules, &schema()).unwrap_err();
        assert!(matches!(err, Error::Constraint(ref msg) if msg.contains("orders.discount")));
    }

    #[test]
    fn pattern_on_missing_column_fails() {
        let rules = vec![entry(
            "coupon",
            Rule::Regex {
                pattern: "[A-Z]{4}".to_string(),
            },
        )];
        let err = compile_constraints(&rules, &schema()).unwrap_err();
        assert!(matches!(err, Error::Constraint(ref msg) if msg.contains("orders.coupon")));
    }
}
