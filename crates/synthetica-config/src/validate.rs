use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use serde_json::Value;
use synthetica_core::{Rule, RuleSet};
use tracing::{info, warn};

use crate::errors::{ConfigError, IssueSeverity, Result, ValidationIssue, ValidationReport};
use crate::schema::config_json_schema;

/// Validate a configuration document against the config JSON Schema.
pub fn validate_config_json(config_json: &Value) -> Result<ValidationReport> {
    let schema = serde_json::to_value(config_json_schema())?;
    let compiled =
        JSONSchema::compile(&schema).map_err(|err| ConfigError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(config_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_violation",
                path,
                error.to_string(),
                Some("each column must map to an object with a string 'type'".to_string()),
            ));
        }
    }

    Ok(report)
}

/// Cross-rule checks that the JSON Schema cannot express. Only warnings.
pub fn validate_rule_set(rules: &RuleSet) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (table, column, raw) in rules.iter() {
        let path = format!("/{table}/{column}");
        let Ok(rule) = Rule::parse(table, column, raw) else {
            continue;
        };

        match rule {
            Rule::FixedCombinations { columns } if !columns.iter().any(|name| name == column) => {
                report.push_warning(ValidationIssue::new(
                    IssueSeverity::Warning,
                    "fixed_combination_key_not_listed",
                    format!("{path}/columns"),
                    format!("fixed_combinations rule keyed on '{column}' does not list it"),
                    Some(format!("add '{column}' to columns or key the rule on a listed column")),
                ));
            }
            Rule::ForeignKey {
                referenced_table, ..
            } if !rules.table_names().any(|name| name == referenced_table) => {
                report.push_warning(ValidationIssue::new(
                    IssueSeverity::Warning,
                    "referenced_table_not_configured",
                    format!("{path}/referenced_table"),
                    format!("table '{referenced_table}' has no rules in the configuration"),
                    Some(format!(
                        "declare '{referenced_table}' with its primary_key rule"
                    )),
                ));
            }
            _ => {}
        }
    }

    report
}

/// Parse and validate a configuration document held in memory.
pub fn parse_config(contents: &str) -> Result<RuleSet> {
    let config_json: Value = serde_json::from_str(contents)?;
    let structural = validate_config_json(&config_json)?;
    if !structural.is_ok() {
        return Err(ConfigError::Invalid(structural));
    }

    let rules = RuleSet::from_json(&config_json)?;
    for issue in validate_rule_set(&rules).warnings {
        warn!(code = %issue.code, path = %issue.path, "{}", issue.message);
    }
    Ok(rules)
}

/// Read, validate and convert a JSON configuration file.
pub fn load_config(path: &Path) -> Result<RuleSet> {
    let contents = fs::read_to_string(path)?;
    let rules = parse_config(&contents)?;
    info!(
        path = %path.display(),
        tables = rules.tables().len(),
        rules = rules.iter().count(),
        "configuration loaded"
    );
    Ok(rules)
}

/// Tables the configuration needs loaded: every configured table, then every
/// table referenced by a foreign key, in first-mention order.
pub fn required_tables(rules: &RuleSet) -> Vec<String> {
    let mut tables: Vec<String> = rules.table_names().map(str::to_string).collect();
    for (_, _, raw) in rules.iter() {
        if raw.kind != "foreign_key" {
            continue;
        }
        if let Some(Value::String(referenced)) = raw.params.get("referenced_table")
            && !tables.contains(referenced)
        {
            tables.push(referenced.clone());
        }
    }
    tables
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rule_without_type_is_reported() {
        let report = validate_config_json(&json!({
            "users": { "email": { "pattern": "^a" } }
        }))
        .expect("validate");
        assert!(!report.is_ok());
        assert!(report.errors[0].path.starts_with("/users"));
    }

    #[test]
    fn non_object_document_is_reported_at_root() {
        let report = validate_config_json(&json!(["users"])).expect("validate");
        assert_eq!(report.errors[0].path, "/");
    }

    #[test]
    fn required_tables_include_referenced_parents() {
        let rules = RuleSet::from_json(&json!({
            "orders": {
                "user_id": {
                    "type": "foreign_key",
                    "referenced_table": "users",
                    "referenced_column": "user_id"
                }
            }
        }))
        .expect("rules");
        assert_eq!(required_tables(&rules), vec!["orders", "users"]);

        let report = validate_rule_set(&rules);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].code, "referenced_table_not_configured");
    }
}
