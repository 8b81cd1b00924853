use std::fs;
use std::path::PathBuf;

use synthetica_config::{ConfigError, config_json_schema, load_config, parse_config};

fn temp_config(contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("synthetica_config_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp dir");
    let path = dir.join("config.json");
    fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn load_config_keeps_document_order() {
    let path = temp_config(
        r#"{
            "orders": {
                "order_id": { "type": "primary_key" },
                "user_id": { "type": "foreign_key", "referenced_table": "users", "referenced_column": "user_id" }
            },
            "users": {
                "user_id": { "type": "primary_key" },
                "email": { "type": "regex", "pattern": "^[a-z]+@" }
            }
        }"#,
    );

    let rules = load_config(&path).expect("load config");
    let order: Vec<(&str, &str, &str)> = rules
        .iter()
        .map(|(table, column, rule)| (table, column, rule.kind.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("orders", "order_id", "primary_key"),
            ("orders", "user_id", "foreign_key"),
            ("users", "user_id", "primary_key"),
            ("users", "email", "regex"),
        ]
    );
}

#[test]
fn missing_file_is_an_io_error() {
    let path = std::env::temp_dir()
        .join(format!("synthetica_missing_{}", uuid::Uuid::new_v4()))
        .join("config.json");
    assert!(matches!(load_config(&path), Err(ConfigError::Io(_))));
}

#[test]
fn malformed_json_is_rejected() {
    assert!(matches!(parse_config("{ \"users\": "), Err(ConfigError::Json(_))));
}

#[test]
fn structural_violation_never_reaches_the_compiler() {
    let err = parse_config(r#"{ "users": { "email": "regex" } }"#).unwrap_err();
    match err {
        ConfigError::Invalid(report) => {
            assert!(!report.errors.is_empty());
            assert_eq!(report.errors[0].code, "schema_violation");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn unknown_rule_type_passes_structure_and_is_left_to_the_compiler() {
    let rules = parse_config(r#"{ "users": { "age": { "type": "monotonic" } } }"#)
        .expect("structure is valid");
    let err = synthetica_core::parse_rules(&rules).unwrap_err();
    assert!(matches!(err, synthetica_core::Error::Constraint(_)));
}

#[test]
fn json_schema_requires_rule_type() {
    let schema = serde_json::to_value(config_json_schema()).expect("serialize schema");
    let text = schema.to_string();
    assert!(text.contains("\"type\""));
    assert!(text.contains("RawRule"));
}
