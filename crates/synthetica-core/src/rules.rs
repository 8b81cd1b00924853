use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{Error, Result};

/// Rule object as written in the configuration: a `type` tag plus
/// type-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawRule {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub params: Map<String, JsonValue>,
}

impl RawRule {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// A rule attached to one column of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRule {
    pub column: String,
    pub rule: RawRule,
}

/// Rules declared for one table, in column declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRules {
    pub table: String,
    pub columns: Vec<ColumnRule>,
}

/// Ordered mapping table -> column -> rule, preserving configuration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    tables: Vec<TableRules>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table with no rules (it still has to be loaded).
    pub fn declare_table(&mut self, table: &str) {
        if !self.tables.iter().any(|entry| entry.table == table) {
            self.tables.push(TableRules {
                table: table.to_string(),
                columns: Vec::new(),
            });
        }
    }

    /// Append a rule; a later rule for the same column replaces the earlier
    /// one in place, like a repeated key in the source document.
    pub fn push(&mut self, table: &str, column: &str, rule: RawRule) {
        self.declare_table(table);
        let Some(entry) = self.tables.iter_mut().find(|entry| entry.table == table) else {
            return;
        };
        match entry.columns.iter_mut().find(|entry| entry.column == column) {
            Some(existing) => existing.rule = rule,
            None => entry.columns.push(ColumnRule {
                column: column.to_string(),
                rule,
            }),
        }
    }

    /// Build a rule set from a JSON document `{table: {column: rule}}`.
    ///
    /// Key order of the document is preserved.
    pub fn from_json(document: &JsonValue) -> Result<Self> {
        let tables = document.as_object().ok_or_else(|| {
            Error::Constraint("configuration must be an object keyed by table name".to_string())
        })?;

        let mut rules = RuleSet::new();
        for (table, columns) in tables {
            let columns = columns.as_object().ok_or_else(|| {
                Error::Constraint(format!(
                    "rules for table '{table}' must be an object keyed by column name"
                ))
            })?;
            rules.declare_table(table);
            for (column, rule) in columns {
                let rule: RawRule = serde_json::from_value(rule.clone()).map_err(|err| {
                    Error::Constraint(format!("malformed rule for {table}.{column}: {err}"))
                })?;
                rules.push(table, column, rule);
            }
        }
        Ok(rules)
    }

    pub fn tables(&self) -> &[TableRules] {
        &self.tables
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|entry| entry.table.as_str())
    }

    /// Iterate `(table, column, rule)` in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &RawRule)> {
        self.tables.iter().flat_map(|entry| {
            entry
                .columns
                .iter()
                .map(move |rule| (entry.table.as_str(), rule.column.as_str(), &rule.rule))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(|entry| entry.columns.is_empty())
    }
}

/// Closed set of rule kinds understood by the compiler.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Range { low: f64, high: f64, strict: bool },
    FixedCombinations { columns: Vec<String> },
    Regex { pattern: String },
    PrimaryKey,
    ForeignKey {
        referenced_table: String,
        referenced_column: String,
    },
}

impl Rule {
    /// Parse a raw rule attached to `table.column`.
    pub fn parse(table: &str, column: &str, raw: &RawRule) -> Result<Self> {
        let field = |name: &str| FieldReader {
            table,
            column,
            kind: raw.kind.as_str(),
            name: name.to_string(),
            value: raw.params.get(name),
        };

        match raw.kind.as_str() {
            "range" => Ok(Rule::Range {
                low: field("low").number()?,
                high: field("high").number()?,
                strict: field("strict").optional_bool()?.unwrap_or(false),
            }),
            "fixed_combinations" => Ok(Rule::FixedCombinations {
                columns: field("columns").string_list()?,
            }),
            "regex" => Ok(Rule::Regex {
                pattern: field("pattern").string()?,
            }),
            "primary_key" => Ok(Rule::PrimaryKey),
            "foreign_key" => Ok(Rule::ForeignKey {
                referenced_table: field("referenced_table").string()?,
                referenced_column: field("referenced_column").string()?,
            }),
            other => Err(Error::Constraint(format!(
                "unrecognized rule type '{other}' for {table}.{column}"
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Rule::Range { .. } => "range",
            Rule::FixedCombinations { .. } => "fixed_combinations",
            Rule::Regex { .. } => "regex",
            Rule::PrimaryKey => "primary_key",
            Rule::ForeignKey { .. } => "foreign_key",
        }
    }

    /// True for rules that only mutate the schema and emit no descriptor.
    pub fn is_identifier(&self) -> bool {
        matches!(self, Rule::PrimaryKey | Rule::ForeignKey { .. })
    }
}

/// A parsed rule bound to its table and column.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEntry {
    pub table: String,
    pub column: String,
    pub rule: Rule,
}

/// Parse every rule of the set, failing on the first malformed or unknown rule.
pub fn parse_rules(rules: &RuleSet) -> Result<Vec<RuleEntry>> {
    rules
        .iter()
        .map(|(table, column, raw)| {
            Ok(RuleEntry {
                table: table.to_string(),
                column: column.to_string(),
                rule: Rule::parse(table, column, raw)?,
            })
        })
        .collect()
}

struct FieldReader<'a> {
    table: &'a str,
    column: &'a str,
    kind: &'a str,
    name: String,
    value: Option<&'a JsonValue>,
}

impl FieldReader<'_> {
    fn error(&self, expected: &str) -> Error {
        let problem = if self.value.is_some() {
            format!("must be {expected}")
        } else {
            format!("is required ({expected})")
        };
        Error::Constraint(format!(
            "{} rule on {}.{}: field '{}' {}",
            self.kind, self.table, self.column, self.name, problem
        ))
    }

    fn number(&self) -> Result<f64> {
        self.value
            .and_then(JsonValue::as_f64)
            .ok_or_else(|| self.error("a number"))
    }

    fn string(&self) -> Result<String> {
        self.value
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| self.error("a string"))
    }

    fn optional_bool(&self) -> Result<Option<bool>> {
        match self.value {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Bool(value)) => Ok(Some(*value)),
            Some(_) => Err(self.error("a boolean")),
        }
    }

    fn string_list(&self) -> Result<Vec<String>> {
        let array = self
            .value
            .and_then(JsonValue::as_array)
            .ok_or_else(|| self.error("an array of column names"))?;
        array
            .iter()
            .map(|entry| {
                entry
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.error("an array of column names"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn preserves_document_order() {
        let rules = RuleSet::from_json(&json!({
            "zeta": {"b": {"type": "primary_key"}, "a": {"type": "regex", "pattern": "x"}},
            "alpha": {"id": {"type": "primary_key"}}
        }))
        .expect("rule set");

        let order: Vec<(&str, &str)> = rules.iter().map(|(t, c, _)| (t, c)).collect();
        assert_eq!(order, vec![("zeta", "b"), ("zeta", "a"), ("alpha", "id")]);
    }

    #[test]
    fn range_strict_defaults_to_false() {
        let raw = RawRule::new("range")
            .with_param("low", json!(0))
            .with_param("high", json!(10.5));
        let rule = Rule::parse("orders", "amount", &raw).expect("parse range");
        assert_eq!(
            rule,
            Rule::Range {
                low: 0.0,
                high: 10.5,
                strict: false
            }
        );
    }

    #[test]
    fn range_requires_bounds() {
        let raw = RawRule::new("range").with_param("low", json!(1));
        let err = Rule::parse("orders", "amount", &raw).unwrap_err();
        assert!(matches!(err, Error::Constraint(ref msg) if msg.contains("'high'")));
    }

    #[test]
    fn unknown_kind_is_a_constraint_error() {
        let err = Rule::parse("users", "email", &RawRule::new("unique")).unwrap_err();
        assert!(matches!(err, Error::Constraint(ref msg) if msg.contains("unique")));
    }

    #[test]
    fn foreign_key_requires_reference() {
        let raw = RawRule::new("foreign_key").with_param("referenced_table", json!("users"));
        let err = Rule::parse("orders", "user_id", &raw).unwrap_err();
        assert!(matches!(err, Error::Constraint(ref msg) if msg.contains("referenced_column")));
    }
}
