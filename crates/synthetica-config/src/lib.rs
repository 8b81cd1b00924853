//! Rule configuration reading and structural validation.

pub mod errors;
pub mod model;
pub mod schema;
pub mod validate;

pub use errors::{ConfigError, IssueSeverity, Result, ValidationIssue, ValidationReport};
pub use model::{ConfigDocument, TableConfig};
pub use schema::config_json_schema;
pub use validate::{
    load_config, parse_config, required_tables, validate_config_json, validate_rule_set,
};
