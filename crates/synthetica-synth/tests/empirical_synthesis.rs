use std::collections::HashSet;

use serde_json::json;
use synthetica_core::{CompileOptions, RuleSet, Table, TableRegistry, Value, compile};
use synthetica_synth::{
    EmpiricalSynthesizer, RowCount, SynthOptions, Synthesizer, TableChecks, value_key,
};

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn source() -> TableRegistry {
    let mut registry = TableRegistry::new();
    registry
        .insert(
            Table::from_rows(
                "users",
                columns(&["user_id", "email", "age", "signup"]),
                vec![
                    vec![Value::Int(1), text("ana@example.com"), Value::Int(34), text("2024-01-05")],
                    vec![Value::Int(2), text("bruno@example.com"), Value::Int(27), text("2024-02-11")],
                    vec![Value::Int(3), text("carla@example.com"), Value::Null, text("2024-03-20")],
                    vec![Value::Int(4), text("davi@example.com"), Value::Int(61), text("2024-04-02")],
                ],
            )
            .expect("users"),
        )
        .expect("insert users");
    registry
        .insert(
            Table::from_rows(
                "orders",
                columns(&["order_id", "user_id", "amount", "currency", "country"]),
                vec![
                    vec![Value::Int(100), Value::Int(1), Value::Float(19.9), text("EUR"), text("PT")],
                    vec![Value::Int(101), Value::Int(1), Value::Float(250.0), text("USD"), text("US")],
                    vec![Value::Int(102), Value::Int(3), Value::Float(75.5), text("EUR"), text("PT")],
                    vec![Value::Int(103), Value::Int(4), Value::Float(12.25), text("BRL"), text("BR")],
                    vec![Value::Int(104), Value::Int(2), Value::Float(99.0), text("USD"), text("US")],
                ],
            )
            .expect("orders"),
        )
        .expect("insert orders");
    registry
        .insert(
            Table::from_rows(
                "employees",
                columns(&["employee_id", "manager_id", "name"]),
                vec![
                    vec![text("e1"), Value::Null, text("Ana")],
                    vec![text("e2"), text("e1"), text("Bruno")],
                    vec![text("e3"), text("e1"), text("Carla")],
                ],
            )
            .expect("employees"),
        )
        .expect("insert employees");
    registry
}

fn config() -> serde_json::Value {
    json!({
        "users": {
            "user_id": { "type": "primary_key" },
            "email": { "type": "regex", "pattern": "^[a-z]+@[a-z]+\\.com" },
            "age": { "type": "range", "low": 18, "high": 90 }
        },
        "orders": {
            "order_id": { "type": "primary_key" },
            "user_id": {
                "type": "foreign_key",
                "referenced_table": "users",
                "referenced_column": "user_id"
            },
            "amount": { "type": "range", "low": 0, "high": 500, "strict": true },
            "currency": { "type": "fixed_combinations", "columns": ["currency", "country"] }
        },
        "employees": {
            "employee_id": { "type": "primary_key" },
            "manager_id": {
                "type": "foreign_key",
                "referenced_table": "employees",
                "referenced_column": "employee_id"
            }
        }
    })
}

fn run(seed: u64, rows: RowCount) -> synthetica_synth::Synthesis {
    let tables = source();
    let rules = RuleSet::from_json(&config()).expect("rules");
    let compilation = compile(&tables, &rules, &CompileOptions::default()).expect("compile");
    let options = SynthOptions {
        seed,
        ..SynthOptions::default()
    };
    EmpiricalSynthesizer::new(options)
        .synthesize(&tables, &compilation, rows)
        .expect("synthesize")
}

fn key_set(table: &Table, column: &str) -> HashSet<String> {
    table
        .column_values(column)
        .expect("column")
        .filter(|value| !value.is_null())
        .map(value_key)
        .collect()
}

#[test]
fn synthesis_is_deterministic_for_a_seed() {
    let first = run(7, RowCount::Fixed(40));
    let second = run(7, RowCount::Fixed(40));
    assert_eq!(first.tables, second.tables);
    assert_eq!(first.report, second.report);
}

#[test]
fn output_keeps_source_table_and_column_order() {
    let synthesis = run(1, RowCount::Scale(2.0));
    let names: Vec<&str> = synthesis.tables.names().collect();
    assert_eq!(names, vec!["users", "orders", "employees"]);

    let orders = synthesis.tables.get("orders").expect("orders");
    assert_eq!(
        orders.columns(),
        ["order_id", "user_id", "amount", "currency", "country"]
    );
    assert_eq!(orders.row_count(), 10);
    assert_eq!(
        synthesis.report.table_order.first().map(String::as_str),
        Some("employees")
    );
}

#[test]
fn keys_are_unique_and_foreign_keys_resolve() {
    let synthesis = run(3, RowCount::Fixed(60));
    let users = synthesis.tables.get("users").expect("users");
    let orders = synthesis.tables.get("orders").expect("orders");

    assert_eq!(key_set(users, "user_id").len(), 60);
    assert_eq!(key_set(orders, "order_id").len(), 60);

    let parents = key_set(users, "user_id");
    assert!(key_set(orders, "user_id").is_subset(&parents));
}

#[test]
fn every_row_satisfies_compiled_constraints() {
    let tables = source();
    let rules = RuleSet::from_json(&config()).expect("rules");
    let compilation = compile(&tables, &rules, &CompileOptions::default()).expect("compile");
    let synthesis = EmpiricalSynthesizer::default()
        .synthesize(&tables, &compilation, RowCount::Fixed(50))
        .expect("synthesize");

    for table in synthesis.tables.iter() {
        let checks = TableChecks::compile(
            compilation.constraints_for(table.name()),
            tables.get(table.name()).expect("source"),
            compilation.schema().table(table.name()).expect("schema"),
        )
        .expect("checks");
        for row in table.rows() {
            assert!(
                checks.first_violation(table.columns(), row).is_none(),
                "violation in {}: {row:?}",
                table.name()
            );
        }
    }
}

#[test]
fn self_references_point_to_earlier_rows() {
    let synthesis = run(11, RowCount::Fixed(25));
    let employees = synthesis.tables.get("employees").expect("employees");

    assert_eq!(employees.value(0, "manager_id"), Some(&Value::Null));
    let mut seen: HashSet<String> = HashSet::new();
    for row in 0..employees.row_count() {
        let manager = employees.value(row, "manager_id").expect("manager");
        if !manager.is_null() {
            assert!(seen.contains(&value_key(manager)));
        }
        let id = employees.value(row, "employee_id").expect("id");
        seen.insert(value_key(id));
    }
}

#[test]
fn text_primary_keys_are_labelled() {
    let synthesis = run(5, RowCount::Fixed(3));
    let employees = synthesis.tables.get("employees").expect("employees");
    assert_eq!(
        employees.value(2, "employee_id"),
        Some(&Value::Text("employee_id_3".to_string()))
    );
}

#[test]
fn fixed_combination_with_foreign_key_column_is_satisfiable() {
    let tables = source();
    let config = json!({
        "users": {
            "user_id": { "type": "primary_key" }
        },
        "orders": {
            "order_id": { "type": "primary_key" },
            "user_id": {
                "type": "foreign_key",
                "referenced_table": "users",
                "referenced_column": "user_id"
            },
            "currency": { "type": "fixed_combinations", "columns": ["user_id", "currency"] }
        }
    });
    let rules = RuleSet::from_json(&config).expect("rules");
    let compilation = compile(&tables, &rules, &CompileOptions::default()).expect("compile");

    let synthesis = EmpiricalSynthesizer::default()
        .synthesize(&tables, &compilation, RowCount::Fixed(50))
        .expect("synthesize");

    let orders = synthesis.tables.get("orders").expect("orders");
    let users = synthesis.tables.get("users").expect("users");
    assert_eq!(orders.row_count(), 50);
    assert!(key_set(orders, "user_id").is_subset(&key_set(users, "user_id")));
    let observed = key_set(tables.get("orders").expect("source orders"), "currency");
    assert!(key_set(orders, "currency").is_subset(&observed));
    assert_eq!(
        synthesis
            .report
            .warnings_by_code
            .get("fixed_combination_key_columns"),
        Some(&1)
    );
}
