use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading source tables or writing output tables.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("malformed data in {path}: {message}")]
    Format { path: PathBuf, message: String },
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Core(#[from] synthetica_core::Error),
}

pub type Result<T> = std::result::Result<T, DataError>;
