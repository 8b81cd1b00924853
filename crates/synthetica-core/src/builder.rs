use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{Relationship, RelationshipSet};
use crate::infer::{InferenceOptions, infer_semantic_type};
use crate::rules::{Rule, RuleEntry};
use crate::schema::{ColumnSchema, Schema, SemanticType, TableSchema};
use crate::table::{Table, TableRegistry};

/// Builds column schemas from sample data and applies identifier rules.
#[derive(Debug, Clone)]
pub struct SchemaBuilder<'a> {
    options: &'a InferenceOptions,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(options: &'a InferenceOptions) -> Self {
        Self { options }
    }

    /// Infer every table, then apply `primary_key` and `foreign_key` rules.
    ///
    /// Returned relationships are pending: they are only validated once the
    /// whole schema is built.
    pub fn build(
        &self,
        registry: &TableRegistry,
        rules: &[RuleEntry],
    ) -> Result<(Schema, RelationshipSet)> {
        let mut schema = self.infer(registry);
        let mut relationships = RelationshipSet::new();

        for entry in rules {
            match &entry.rule {
                Rule::PrimaryKey => mark_primary_key(&mut schema, entry)?,
                Rule::ForeignKey {
                    referenced_table,
                    referenced_column,
                } => {
                    mark_foreign_key(&mut schema, entry)?;
                    relationships.insert(Relationship::new(
                        &entry.table,
                        &entry.column,
                        referenced_table,
                        referenced_column,
                    ));
                }
                Rule::Range { .. } | Rule::FixedCombinations { .. } | Rule::Regex { .. } => {}
            }
        }

        Ok((schema, relationships))
    }

    /// Baseline schema for every registered table, in registry order.
    pub fn infer(&self, registry: &TableRegistry) -> Schema {
        Schema {
            tables: registry.iter().map(|table| self.infer_table(table)).collect(),
        }
    }

    fn infer_table(&self, table: &Table) -> TableSchema {
        let columns = table
            .columns()
            .iter()
            .map(|column| {
                let semantic_type = table
                    .column_values(column)
                    .map(|values| infer_semantic_type(values, self.options))
                    .unwrap_or(SemanticType::Text);
                debug!(
                    table = %table.name(),
                    column = %column,
                    semantic_type = %semantic_type,
                    "column type inferred"
                );
                ColumnSchema::new(column.clone(), semantic_type)
            })
            .collect();

        TableSchema {
            name: table.name().to_string(),
            columns,
        }
    }
}

fn mark_primary_key(schema: &mut Schema, entry: &RuleEntry) -> Result<()> {
    let table = table_for_rule(schema, entry)?;

    if let Some(existing) = table.primary_key()
        && existing.name != entry.column
    {
        return Err(Error::Schema(format!(
            "table '{}' already has primary key '{}'; cannot also mark '{}'",
            entry.table, existing.name, entry.column
        )));
    }

    let column = column_for_rule(table, entry)?;
    column.semantic_type = SemanticType::Identifier;
    column.is_primary_key = true;
    debug!(table = %entry.table, column = %entry.column, "primary key marked");
    Ok(())
}

fn mark_foreign_key(schema: &mut Schema, entry: &RuleEntry) -> Result<()> {
    let table = table_for_rule(schema, entry)?;
    let column = column_for_rule(table, entry)?;
    column.semantic_type = SemanticType::Identifier;
    column.is_foreign_key = true;
    debug!(table = %entry.table, column = %entry.column, "foreign key marked");
    Ok(())
}

fn table_for_rule<'s>(schema: &'s mut Schema, entry: &RuleEntry) -> Result<&'s mut TableSchema> {
    schema.table_mut(&entry.table).ok_or_else(|| {
        Error::MissingTable(format!(
            "table '{}' referenced by {} rule has no data",
            entry.table,
            entry.rule.kind()
        ))
    })
}

fn column_for_rule<'s>(
    table: &'s mut TableSchema,
    entry: &RuleEntry,
) -> Result<&'s mut ColumnSchema> {
    table.column_mut(&entry.column).ok_or_else(|| {
        Error::Schema(format!(
            "{} rule references missing column {}.{}",
            entry.rule.kind(),
            entry.table,
            entry.column
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn registry() -> TableRegistry {
        let mut registry = TableRegistry::new();
        registry
            .insert(
                Table::from_rows(
                    "users",
                    vec!["user_id".to_string(), "email".to_string()],
                    vec![
                        vec![Value::Int(1), Value::Text("a@example.com".to_string())],
                        vec![Value::Int(2), Value::Text("b@example.com".to_string())],
                    ],
                )
                .expect("users"),
            )
            .expect("insert users");
        registry
            .insert(
                Table::from_rows(
                    "orders",
                    vec!["order_id".to_string(), "user_id".to_string()],
                    vec![
                        vec![Value::Int(10), Value::Int(1)],
                        vec![Value::Int(11), Value::Int(2)],
                    ],
                )
                .expect("orders"),
            )
            .expect("insert orders");
        registry
    }

    fn entry(table: &str, column: &str, rule: Rule) -> RuleEntry {
        RuleEntry {
            table: table.to_string(),
            column: column.to_string(),
            rule,
        }
    }

    #[test]
    fn foreign_key_does_not_mark_primary_key() {
        let options = InferenceOptions::default();
        let rules = vec![entry(
            "orders",
            "user_id",
            Rule::ForeignKey {
                referenced_table: "users".to_string(),
                referenced_column: "user_id".to_string(),
            },
        )];

        let (schema, relationships) = SchemaBuilder::new(&options)
            .build(&registry(), &rules)
            .expect("build schema");

        let column = schema.column("orders", "user_id").expect("column");
        assert!(column.is_foreign_key);
        assert!(!column.is_primary_key);
        assert_eq!(column.semantic_type, SemanticType::Identifier);
        assert!(schema.table("orders").and_then(|t| t.primary_key()).is_none());
        assert_eq!(relationships.len(), 1);
    }

    #[test]
    fn repeated_primary_key_is_idempotent() {
        let options = InferenceOptions::default();
        let rules = vec![
            entry("users", "user_id", Rule::PrimaryKey),
            entry("users", "user_id", Rule::PrimaryKey),
        ];

        let (schema, _) = SchemaBuilder::new(&options)
            .build(&registry(), &rules)
            .expect("build schema");
        let pk = schema.table("users").and_then(|t| t.primary_key());
        assert_eq!(pk.map(|c| c.name.as_str()), Some("user_id"));
    }

    #[test]
    fn primary_key_on_missing_column_fails() {
        let options = InferenceOptions::default();
        let rules = vec![entry("users", "uuid", Rule::PrimaryKey)];

        let err = SchemaBuilder::new(&options)
            .build(&registry(), &rules)
            .unwrap_err();
        assert!(matches!(err, Error::Schema(ref msg) if msg.contains("users.uuid")));
    }

    #[test]
    fn foreign_key_on_missing_column_fails() {
        let options = InferenceOptions::default();
        let rules = vec![entry(
            "orders",
            "coupon_id",
            Rule::ForeignKey {
                referenced_table: "users".to_string(),
                referenced_column: "user_id".to_string(),
            },
        )];

        let err = SchemaBuilder::new(&options)
            .build(&registry(), &rules)
            .unwrap_err();
        assert!(matches!(err, Error::Schema(ref msg) if msg.contains("orders.coupon_id")));
    }
}
