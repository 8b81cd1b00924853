//! Synthesis engines for compiled schemas.
//!
//! The [`Synthesizer`] trait is the seam between the compiler and any
//! statistical engine. [`EmpiricalSynthesizer`] is the baseline: it generates
//! tables parents-first, resamples source distributions and re-checks every
//! row against the compiled constraint descriptors.

pub mod checks;
pub mod engine;
pub mod errors;
pub mod foreign;
pub mod model;
pub mod planner;

pub use checks::{TableChecks, Violation, anchored_regex, value_key};
pub use engine::{EmpiricalSynthesizer, Synthesizer};
pub use errors::{Result, SynthError};
pub use foreign::{ForeignContext, InMemoryForeignContext};
pub use model::{GenerationIssue, GenerationReport, RowCount, Synthesis, SynthOptions, TableReport};
pub use planner::{ColumnSampler, DatetimeLayout, TablePlan};
