use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Numeric bounds on a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RangeConstraint {
    pub table: String,
    pub column: String,
    pub low: f64,
    pub high: f64,
    /// Exclude the bounds themselves.
    pub strict: bool,
}

impl RangeConstraint {
    pub fn contains(&self, value: f64) -> bool {
        if self.strict {
            value > self.low && value < self.high
        } else {
            value >= self.low && value <= self.high
        }
    }
}

/// Columns whose value combinations must be ones seen in the source data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FixedCombinationConstraint {
    pub table: String,
    pub columns: Vec<String>,
}

/// Values of a column must match a regular expression from their start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PatternConstraint {
    pub table: String,
    pub column: String,
    pub pattern: String,
}

/// Compiled, data-only constraint handed to the synthesis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintDescriptor {
    Range(RangeConstraint),
    FixedCombination(FixedCombinationConstraint),
    Pattern(PatternConstraint),
}

impl ConstraintDescriptor {
    pub fn table(&self) -> &str {
        match self {
            ConstraintDescriptor::Range(range) => &range.table,
            ConstraintDescriptor::FixedCombination(fixed) => &fixed.table,
            ConstraintDescriptor::Pattern(pattern) => &pattern.table,
        }
    }

    /// Columns referenced by the descriptor, in declaration order.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            ConstraintDescriptor::Range(range) => vec![range.column.as_str()],
            ConstraintDescriptor::FixedCombination(fixed) => {
                fixed.columns.iter().map(String::as_str).collect()
            }
            ConstraintDescriptor::Pattern(pattern) => vec![pattern.column.as_str()],
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ConstraintDescriptor::Range(_) => "range",
            ConstraintDescriptor::FixedCombination(_) => "fixed_combination",
            ConstraintDescriptor::Pattern(_) => "pattern",
        }
    }
}
