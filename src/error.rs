//! Error types for the rankeval crate.

use thiserror::Error;

use crate::data::Id;

/// A session failed one of its construction invariants.
///
/// Validation runs eagerly at construction: either a fully valid session is
/// produced or the first violated rule is reported with the offending
/// values. No partially constructed session is observable.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("positive_relevances has {relevances} entries but positive_items has {items}")]
    LengthMismatch { relevances: usize, items: usize },

    #[error("relevance at index {index} is {value}; all relevances must be > 0")]
    NonPositiveRelevance { index: usize, value: f64 },

    #[error("item {id} appears in both positive_items and negative_items")]
    OverlapViolation { id: Id },
}

/// Top-level error type for rankeval operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An error raised by the external scoring pipeline. Propagated
    /// unchanged; never retried or wrapped.
    #[error(transparent)]
    Pipeline(#[from] anyhow::Error),

    #[error("scoring pipeline returned {actual} scores for {expected} items")]
    ScoreCount { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn pipeline(err: anyhow::Error) -> Self {
        Self::Pipeline(err)
    }
}
