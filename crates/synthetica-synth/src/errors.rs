use thiserror::Error;

/// Errors emitted by a synthesis engine.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unsatisfiable: {0}")]
    Unsatisfiable(String),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    Core(#[from] synthetica_core::Error),
}

pub type Result<T> = std::result::Result<T, SynthError>;
