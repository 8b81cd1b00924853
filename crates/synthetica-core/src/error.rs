use thiserror::Error;

/// Compilation error shared across Synthetica crates.
///
/// Every variant is fatal for the run: compilation is all-or-nothing and no
/// partial result is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A column schema invariant was violated (duplicate primary key, missing column).
    #[error("schema error: {0}")]
    Schema(String),
    /// A rule is malformed, inconsistent or of an unknown kind.
    #[error("constraint error: {0}")]
    Constraint(String),
    /// A foreign key does not resolve to an established primary key.
    #[error("relationship error: {0}")]
    Relationship(String),
    /// A configured table has no loaded data.
    #[error("missing table: {0}")]
    MissingTable(String),
}

/// Convenience alias for results returned by Synthetica crates.
pub type Result<T> = std::result::Result<T, Error>;
