use std::collections::BTreeMap;

use schemars::JsonSchema;
use synthetica_core::RawRule;

/// Rules for the columns of one table, keyed by column name.
#[derive(Debug, Clone, JsonSchema)]
pub struct TableConfig(pub BTreeMap<String, RawRule>);

/// Shape of a rule configuration document, keyed by table name.
///
/// Only used to describe the document; parsing goes through
/// [`synthetica_core::RuleSet::from_json`] so key order is kept.
#[derive(Debug, Clone, JsonSchema)]
pub struct ConfigDocument(pub BTreeMap<String, TableConfig>);
