//! Table sources and sinks: loading tables from csv/json/jsonl files and
//! writing synthesized tables back out.

pub mod errors;
pub mod loader;
pub mod output;
pub mod writer;

pub use errors::{DataError, Result};
pub use loader::{DataLoader, SOURCE_EXTENSIONS, read_table};
pub use writer::{DataWriter, OutputFormat, WrittenTable};
