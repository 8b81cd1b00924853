//! Core contracts and the schema & constraint compiler for Synthetica.
//!
//! This crate turns loaded tables plus a per-column rule configuration into an
//! immutable [`CompilationResult`]: inferred column schemas, validated
//! foreign-key relationships and typed constraint descriptors.

pub mod builder;
pub mod compilation;
pub mod compiler;
pub mod constraints;
pub mod error;
pub mod graph;
pub mod infer;
pub mod rules;
pub mod schema;
pub mod table;
pub mod validation;
pub mod value;

pub use builder::SchemaBuilder;
pub use compilation::{CompilationResult, CompileOptions, assemble, compile};
pub use compiler::compile_constraints;
pub use constraints::{
    ConstraintDescriptor, FixedCombinationConstraint, PatternConstraint, RangeConstraint,
};
pub use error::{Error, Result};
pub use graph::{GraphReport, GraphSummary, Relationship, RelationshipSet, build_graph_report};
pub use infer::{InferenceOptions, infer_semantic_type, parse_timestamp};
pub use rules::{ColumnRule, RawRule, Rule, RuleEntry, RuleSet, TableRules, parse_rules};
pub use schema::{ColumnSchema, Schema, SemanticType, TableSchema};
pub use table::{Table, TableRegistry};
pub use validation::{validate_relationships, validate_schema};
pub use value::Value;

/// Current contract version for `compilation.json` artifacts.
pub const COMPILATION_VERSION: &str = "0.1";
