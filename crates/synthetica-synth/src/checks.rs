use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use synthetica_core::{
    ConstraintDescriptor, FixedCombinationConstraint, PatternConstraint, RangeConstraint, Table,
    TableSchema, Value,
};

/// A row that breaks one compiled constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: String,
    pub table: String,
    pub columns: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
enum CompiledCheck {
    Range(RangeConstraint),
    Pattern {
        constraint: PatternConstraint,
        regex: Regex,
    },
    FixedCombination {
        table: String,
        columns: Vec<String>,
        allowed: HashSet<Vec<String>>,
    },
}

/// Row-level checks for the descriptors of one table.
///
/// Null cells satisfy range and pattern checks. Fixed combinations are
/// restricted to the combinations observed in the source table, over the
/// listed columns that are not keys: key values are regenerated, so they
/// never take part in the combination.
#[derive(Debug, Clone, Default)]
pub struct TableChecks {
    checks: Vec<CompiledCheck>,
}

impl TableChecks {
    pub fn compile<'a>(
        descriptors: impl IntoIterator<Item = &'a ConstraintDescriptor>,
        source: &Table,
        schema: &TableSchema,
    ) -> Result<Self, regex::Error> {
        let mut checks = Vec::new();

        for descriptor in descriptors {
            let check = match descriptor {
                ConstraintDescriptor::Range(range) => CompiledCheck::Range(range.clone()),
                ConstraintDescriptor::Pattern(pattern) => CompiledCheck::Pattern {
                    regex: anchored_regex(&pattern.pattern)?,
                    constraint: pattern.clone(),
                },
                ConstraintDescriptor::FixedCombination(fixed) => {
                    let columns: Vec<String> = combination_columns(fixed, schema)
                        .into_iter()
                        .map(str::to_string)
                        .collect();
                    if columns.is_empty() {
                        continue;
                    }
                    CompiledCheck::FixedCombination {
                        table: fixed.table.clone(),
                        allowed: observed_combinations(source, &columns),
                        columns,
                    }
                }
            };
            checks.push(check);
        }

        Ok(Self { checks })
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// First violation for `row`, if any.
    pub fn first_violation(&self, columns: &[String], row: &[Value]) -> Option<Violation> {
        self.checks
            .iter()
            .find_map(|check| evaluate(check, columns, row))
    }

    /// Every violation for `row`.
    pub fn violations(&self, columns: &[String], row: &[Value]) -> Vec<Violation> {
        self.checks
            .iter()
            .filter_map(|check| evaluate(check, columns, row))
            .collect()
    }
}

/// Compile a pattern with start-anchored match semantics.
pub fn anchored_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})"))
}

/// Columns of a fixed combination that are sampled and checked jointly:
/// the listed columns minus primary and foreign keys.
pub fn combination_columns<'a>(
    fixed: &'a FixedCombinationConstraint,
    schema: &TableSchema,
) -> Vec<&'a str> {
    fixed
        .columns
        .iter()
        .map(String::as_str)
        .filter(|name| {
            schema
                .column(name)
                .is_none_or(|column| !column.is_primary_key && !column.is_foreign_key)
        })
        .collect()
}

/// Key used to compare cell values across tables and combinations.
pub fn value_key(value: &Value) -> String {
    match value {
        Value::Null => "<null>".to_string(),
        other => other.render(),
    }
}

fn observed_combinations(source: &Table, columns: &[String]) -> HashSet<Vec<String>> {
    let indices: Option<Vec<usize>> = columns
        .iter()
        .map(|column| source.column_index(column))
        .collect();
    let Some(indices) = indices else {
        return HashSet::new();
    };

    source
        .rows()
        .iter()
        .map(|row| indices.iter().map(|idx| value_key(&row[*idx])).collect())
        .collect()
}

fn cell<'a>(columns: &[String], row: &'a [Value], column: &str) -> Option<&'a Value> {
    columns
        .iter()
        .position(|name| name == column)
        .and_then(|idx| row.get(idx))
}

fn evaluate(check: &CompiledCheck, columns: &[String], row: &[Value]) -> Option<Violation> {
    match check {
        CompiledCheck::Range(range) => {
            let value = cell(columns, row, &range.column)?;
            if value.is_null() {
                return None;
            }
            match value.as_f64() {
                Some(number) if range.contains(number) => None,
                Some(number) => Some(violation(
                    "range",
                    &range.table,
                    vec![range.column.clone()],
                    format!(
                        "{} = {number} outside {}{}, {}{}",
                        range.column,
                        if range.strict { "(" } else { "[" },
                        range.low,
                        range.high,
                        if range.strict { ")" } else { "]" },
                    ),
                )),
                None => Some(violation(
                    "range",
                    &range.table,
                    vec![range.column.clone()],
                    format!("{} = '{}' is not numeric", range.column, value.render()),
                )),
            }
        }
        CompiledCheck::Pattern { constraint, regex } => {
            let value = cell(columns, row, &constraint.column)?;
            if value.is_null() || regex.is_match(&value.render()) {
                return None;
            }
            Some(violation(
                "pattern",
                &constraint.table,
                vec![constraint.column.clone()],
                format!(
                    "{} = '{}' does not match '{}'",
                    constraint.column,
                    value.render(),
                    constraint.pattern
                ),
            ))
        }
        CompiledCheck::FixedCombination {
            table,
            columns: combination,
            allowed,
        } => {
            let key: Option<Vec<String>> = combination
                .iter()
                .map(|column| cell(columns, row, column).map(value_key))
                .collect();
            let key = key?;
            if allowed.contains(&key) {
                return None;
            }
            Some(violation(
                "fixed_combination",
                table,
                combination.clone(),
                format!(
                    "({}) = ({}) was never observed in the source",
                    combination.join(", "),
                    key.join(", ")
                ),
            ))
        }
    }
}

fn violation(kind: &str, table: &str, columns: Vec<String>, message: String) -> Violation {
    Violation {
        kind: kind.to_string(),
        table: table.to_string(),
        columns,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthetica_core::{ColumnSchema, SemanticType};

    fn columns() -> Vec<String> {
        vec![
            "amount".to_string(),
            "currency".to_string(),
            "country".to_string(),
            "email".to_string(),
        ]
    }

    fn source() -> Table {
        Table::from_rows(
            "orders",
            columns(),
            vec![
                vec![
                    Value::Float(10.0),
                    Value::Text("EUR".to_string()),
                    Value::Text("PT".to_string()),
                    Value::Text("a@example.com".to_string()),
                ],
                vec![
                    Value::Float(20.0),
                    Value::Text("USD".to_string()),
                    Value::Text("US".to_string()),
                    Value::Text("b@example.com".to_string()),
                ],
            ],
        )
        .expect("source")
    }

    fn schema() -> TableSchema {
        TableSchema {
            name: "orders".to_string(),
            columns: columns()
                .into_iter()
                .map(|name| ColumnSchema::new(name, SemanticType::Text))
                .collect(),
        }
    }

    fn descriptors() -> Vec<ConstraintDescriptor> {
        vec![
            ConstraintDescriptor::Range(RangeConstraint {
                table: "orders".to_string(),
                column: "amount".to_string(),
                low: 0.0,
                high: 100.0,
                strict: true,
            }),
            ConstraintDescriptor::FixedCombination(FixedCombinationConstraint {
                table: "orders".to_string(),
                columns: vec!["currency".to_string(), "country".to_string()],
            }),
            ConstraintDescriptor::Pattern(PatternConstraint {
                table: "orders".to_string(),
                column: "email".to_string(),
                pattern: "[a-z]+@".to_string(),
            }),
        ]
    }

    fn row(amount: f64, currency: &str, country: &str, email: &str) -> Vec<Value> {
        vec![
            Value::Float(amount),
            Value::Text(currency.to_string()),
            Value::Text(country.to_string()),
            Value::Text(email.to_string()),
        ]
    }

    #[test]
    fn valid_row_passes() {
        let checks = TableChecks::compile(&descriptors(), &source(), &schema()).expect("compile");
        assert!(
            checks
                .first_violation(&columns(), &row(50.0, "USD", "US", "c@example.com"))
                .is_none()
        );
    }

    #[test]
    fn strict_bounds_exclude_endpoints() {
        let checks = TableChecks::compile(&descriptors(), &source(), &schema()).expect("compile");
        let violation = checks
            .first_violation(&columns(), &row(100.0, "EUR", "PT", "a@example.com"))
            .expect("violation");
        assert_eq!(violation.kind, "range");
    }

    #[test]
    fn unseen_combination_is_rejected() {
        let checks = TableChecks::compile(&descriptors(), &source(), &schema()).expect("compile");
        let violations = checks.violations(&columns(), &row(5.0, "EUR", "US", "a@example.com"));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, "fixed_combination");
    }

    #[test]
    fn pattern_is_anchored_at_start_only() {
        let checks = TableChecks::compile(&descriptors(), &source(), &schema()).expect("compile");
        assert!(
            checks
                .first_violation(&columns(), &row(5.0, "EUR", "PT", "abc@example.com trailing"))
                .is_none()
        );
        let violation = checks
            .first_violation(&columns(), &row(5.0, "EUR", "PT", " abc@example.com"))
            .expect("leading space fails");
        assert_eq!(violation.kind, "pattern");
    }

    #[test]
    fn key_columns_are_left_out_of_combinations() {
        let mut schema = schema();
        schema.columns[3].is_foreign_key = true;
        let fixed = ConstraintDescriptor::FixedCombination(FixedCombinationConstraint {
            table: "orders".to_string(),
            columns: vec!["email".to_string(), "currency".to_string()],
        });
        let checks = TableChecks::compile([&fixed], &source(), &schema).expect("compile");

        assert!(
            checks
                .first_violation(&columns(), &row(5.0, "USD", "PT", "new@example.com"))
                .is_none()
        );
        let violation = checks
            .first_violation(&columns(), &row(5.0, "BRL", "PT", "a@example.com"))
            .expect("unseen currency");
        assert_eq!(violation.columns, vec!["currency".to_string()]);
    }

    #[test]
    fn combination_of_keys_only_is_not_checked() {
        let mut schema = schema();
        schema.columns[1].is_primary_key = true;
        schema.columns[2].is_foreign_key = true;
        let checks = TableChecks::compile(&descriptors()[1..2], &source(), &schema).expect("compile");
        assert!(checks.is_empty());
    }
}
