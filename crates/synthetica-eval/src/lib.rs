//! Post-synthesis evaluation: row counts, key integrity and constraint
//! re-checks, rendered as `metrics.json` and `report.md`.

pub mod engine;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod report;

pub use engine::EvaluationEngine;
pub use errors::EvalError;
pub use metrics::{
    ColumnStats, ConstraintStats, ConstraintSummary, METRICS_VERSION, MetricsReport,
    PerformanceMetrics, TableMetrics, WarningItem,
};
pub use model::{EvaluateOptions, Evaluation, EvaluationResult, Violation};
pub use report::render_report;
