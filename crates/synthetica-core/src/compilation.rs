use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::builder::SchemaBuilder;
use crate::compiler::compile_constraints;
use crate::constraints::ConstraintDescriptor;
use crate::error::{Error, Result};
use crate::graph::{GraphReport, RelationshipSet, build_graph_report};
use crate::infer::InferenceOptions;
use crate::rules::{RuleSet, parse_rules};
use crate::schema::Schema;
use crate::table::TableRegistry;
use crate::validation::{validate_relationships, validate_schema};

/// Options passed explicitly into a compilation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub inference: InferenceOptions,
}

/// Immutable output of a compilation run, handed to the synthesis engine.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct CompilationResult {
    schema: Schema,
    relationships: RelationshipSet,
    constraints: Vec<ConstraintDescriptor>,
    fingerprint: String,
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    schema: &'a Schema,
    relationships: &'a RelationshipSet,
    constraints: &'a [ConstraintDescriptor],
}

impl CompilationResult {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn relationships(&self) -> &RelationshipSet {
        &self.relationships
    }

    pub fn constraints(&self) -> &[ConstraintDescriptor] {
        &self.constraints
    }

    /// Hex SHA-256 of the canonical JSON encoding of the bundle.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Descriptors that apply to `table`, in compilation order.
    pub fn constraints_for<'a>(
        &'a self,
        table: &'a str,
    ) -> impl Iterator<Item = &'a ConstraintDescriptor> {
        self.constraints
            .iter()
            .filter(move |descriptor| descriptor.table() == table)
    }

    pub fn graph_report(&self) -> GraphReport {
        build_graph_report(&self.schema, &self.relationships)
    }
}

/// Bundle validated parts into a compilation result.
pub fn assemble(
    schema: Schema,
    relationships: RelationshipSet,
    constraints: Vec<ConstraintDescriptor>,
) -> Result<CompilationResult> {
    let encoded = serde_json::to_vec(&FingerprintInput {
        schema: &schema,
        relationships: &relationships,
        constraints: &constraints,
    })
    .map_err(|err| Error::Schema(format!("failed to encode compilation result: {err}")))?;
    let fingerprint = hex::encode(Sha256::digest(&encoded));

    Ok(CompilationResult {
        schema,
        relationships,
        constraints,
        fingerprint,
    })
}

/// Compile rules against loaded tables.
///
/// Order: missing tables, rule parsing, schema building (all tables), constraint
/// compilation, relationship validation, schema invariants, assembly. The first failure aborts.
pub fn compile(
    registry: &TableRegistry,
    rules: &RuleSet,
    options: &CompileOptions,
) -> Result<CompilationResult> {
    info!(
        tables = registry.len(),
        rules = rules.iter().count(),
        "compilation started"
    );

    for table in rules.table_names() {
        if !registry.contains(table) {
            return Err(Error::MissingTable(format!(
                "table '{table}' is configured but no data was loaded for it"
            )));
        }
    }

    let entries = parse_rules(rules)?;
    let (schema, pending) = SchemaBuilder::new(&options.inference).build(registry, &entries)?;
    let constraints = compile_constraints(&entries, &schema)?;
    let relationships = validate_relationships(pending, &schema)?;
    validate_schema(&schema, &relationships)?;
    let result = assemble(schema, relationships, constraints)?;

    info!(
        tables = result.schema().tables.len(),
        relationships = result.relationships().len(),
        constraints = result.constraints().len(),
        fingerprint = %result.fingerprint(),
        "compilation finished"
    );

    Ok(result)
}
