use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::model::ConfigDocument;

/// Emit the JSON Schema for a rule configuration document.
pub fn config_json_schema() -> RootSchema {
    schema_for!(ConfigDocument)
}
