use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::graph::RelationshipSet;
use crate::schema::Schema;

/// Validate pending relationship edges against the fully built schema.
///
/// Each edge must resolve to an existing column that is its table's primary
/// key. A primary key declared as a foreign key into itself is rejected.
pub fn validate_relationships(relationships: RelationshipSet, schema: &Schema) -> Result<RelationshipSet> {
    for edge in &relationships {
        let child = schema
            .column(&edge.child_table, &edge.child_column)
            .ok_or_else(|| {
                Error::Relationship(format!("{edge}: child column not found"))
            })?;

        let parent_table = schema.table(&edge.parent_table).ok_or_else(|| {
            Error::Relationship(format!(
                "{edge}: referenced table '{}' not found",
                edge.parent_table
            ))
        })?;

        let parent = parent_table.column(&edge.parent_column).ok_or_else(|| {
            Error::Relationship(format!(
                "{edge}: referenced column '{}.{}' not found",
                edge.parent_table, edge.parent_column
            ))
        })?;

        if !parent.is_primary_key {
            return Err(Error::Relationship(format!(
                "{edge}: referenced column '{}.{}' is not a primary key",
                edge.parent_table, edge.parent_column
            )));
        }

        // Unreachable from rule sets (one rule per column); guards hand-built schemas.
        if edge.is_self_reference() && edge.child_column == edge.parent_column && child.is_primary_key
        {
            return Err(Error::Relationship(format!(
                "{edge}: primary key references itself; no generation order exists"
            )));
        }
    }

    Ok(relationships)
}

/// Validate internal consistency of a built schema.
///
/// This checks:
/// - duplicate tables/columns
/// - at most one primary key per table
/// - every foreign key column is the child of exactly one relationship
pub fn validate_schema(schema: &Schema, relationships: &RelationshipSet) -> Result<()> {
    let mut tables = BTreeSet::new();

    for table in &schema.tables {
        if !tables.insert(table.name.as_str()) {
            return Err(Error::Schema(format!("duplicate table name: {}", table.name)));
        }

        let mut columns = BTreeSet::new();
        for column in &table.columns {
            if !columns.insert(column.name.as_str()) {
                return Err(Error::Schema(format!(
                    "duplicate column name: {}.{}",
                    table.name, column.name
                )));
            }
        }

        let primary_keys: Vec<&str> = table
            .columns
            .iter()
            .filter(|column| column.is_primary_key)
            .map(|column| column.name.as_str())
            .collect();
        if primary_keys.len() > 1 {
            return Err(Error::Schema(format!(
                "table '{}' has {} primary keys: {}",
                table.name,
                primary_keys.len(),
                primary_keys.join(", ")
            )));
        }

        for column in table.columns.iter().filter(|column| column.is_foreign_key) {
            let edges = relationships
                .iter()
                .filter(|edge| edge.child_table == table.name && edge.child_column == column.name)
                .count();
            if edges != 1 {
                return Err(Error::Schema(format!(
                    "foreign key {}.{} must reference exactly one column, found {}",
                    table.name, column.name, edges
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Relationship;
    use crate::schema::{ColumnSchema, SemanticType, TableSchema};

    fn id(name: &str, pk: bool) -> ColumnSchema {
        let mut column = ColumnSchema::new(name, SemanticType::Identifier);
        column.is_primary_key = pk;
        column
    }

    fn schema() -> Schema {
        Schema {
            tables: vec![
                TableSchema {
                    name: "users".to_string(),
                    columns: vec![id("user_id", true), ColumnSchema::new("email", SemanticType::Text)],
                },
                TableSchema {
                    name: "employees".to_string(),
                    columns: vec![id("id", true), id("manager_id", false)],
                },
            ],
        }
    }

    fn set(edge: Relationship) -> RelationshipSet {
        [edge].into_iter().collect()
    }

    #[test]
    fn rejects_non_primary_key_target() {
        let err = validate_relationships(
            set(Relationship::new("employees", "manager_id", "users", "email")),
            &schema(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Relationship(ref msg) if msg.contains("users.email")));
    }

    #[test]
    fn rejects_unknown_table() {
        let err = validate_relationships(
            set(Relationship::new("employees", "manager_id", "managers", "id")),
            &schema(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Relationship(_)));
    }

    #[test]
    fn accepts_self_reference_to_another_column() {
        let edges = validate_relationships(
            set(Relationship::new("employees", "manager_id", "employees", "id")),
            &schema(),
        )
        .expect("valid self reference");
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn rejects_primary_key_referencing_itself() {
        let err = validate_relationships(
            set(Relationship::new("employees", "id", "employees", "id")),
            &schema(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Relationship(ref msg) if msg.contains("itself")));
    }

    #[test]
    fn schema_with_two_primary_keys_is_invalid() {
        let mut schema = schema();
        schema.tables[0].columns[1].is_primary_key = true;
        let err = validate_schema(&schema, &RelationshipSet::new()).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }
}
