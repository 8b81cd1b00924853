use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::schema::SemanticType;
use crate::value::Value;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

/// Thresholds for baseline semantic type inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceOptions {
    /// Maximum distinct/non-null ratio for a column to count as categorical.
    pub categorical_ratio: f64,
    /// Maximum number of distinct values for a categorical column.
    pub max_categories: usize,
    /// Only inspect the first N rows of each table when set.
    pub sample_rows: Option<usize>,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            categorical_ratio: 0.5,
            max_categories: 50,
            sample_rows: None,
        }
    }
}

/// Infer the baseline semantic type of a column from its sampled values.
///
/// Only non-null values are considered. The result depends solely on the
/// values and the options, never on iteration state.
pub fn infer_semantic_type<'a>(
    values: impl IntoIterator<Item = &'a Value>,
    options: &InferenceOptions,
) -> SemanticType {
    let limit = options.sample_rows.unwrap_or(usize::MAX);
    let sample: Vec<&Value> = values
        .into_iter()
        .take(limit)
        .filter(|value| !value.is_null())
        .collect();

    if sample.is_empty() {
        return SemanticType::Text;
    }

    if sample.iter().all(|value| is_numeric(value)) {
        return SemanticType::Numeric;
    }

    if sample.iter().all(|value| parse_timestamp(value).is_some()) {
        return SemanticType::Datetime;
    }

    if sample.iter().all(|value| matches!(value, Value::Bool(_))) {
        return SemanticType::Categorical;
    }

    let distinct: BTreeSet<String> = sample.iter().map(|value| value.render()).collect();
    let ratio = distinct.len() as f64 / sample.len() as f64;
    if ratio <= options.categorical_ratio && distinct.len() <= options.max_categories {
        SemanticType::Categorical
    } else {
        SemanticType::Text
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Int(_) | Value::Float(_) => true,
        Value::Text(_) => value.as_f64().is_some(),
        Value::Null | Value::Bool(_) => false,
    }
}

/// Parse a value as a timestamp using the accepted datetime layouts.
pub fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    let Value::Text(raw) = value else {
        return None;
    };
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
