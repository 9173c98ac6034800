//! Structured error types for raw-data handling and the transform stages.

use thiserror::Error;

/// Errors raised while ingesting raw spread tables or transforming them.
///
/// These are designed to be displayable in CLI output as-is.
#[derive(Debug, Error)]
pub enum DataError {
    /// Raw input is empty, missing a required column, or holds cells that
    /// cannot be interpreted. Never silently coerced.
    #[error("data format error: {0}")]
    DataFormat(String),

    #[error("unsupported aggregation method '{0}' (expected one of: mean, median, weighted)")]
    UnsupportedMethod(String),

    #[error("invalid quantile count {0}: at least one bucket is required")]
    InvalidQuantileCount(usize),

    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        DataError::DataFormat(msg.into())
    }
}
