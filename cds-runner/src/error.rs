//! Errors from aggregation, caching and pipeline orchestration.

use std::path::PathBuf;
use thiserror::Error;

use cds_core::DataError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Raw-data and transform errors, including unsupported methods.
    #[error(transparent)]
    Data(#[from] DataError),

    /// A cache file exists but cannot be read back as a wide table.
    /// Never answered by silently recomputing.
    #[error("cache file {} is corrupt: {reason} (delete it or use --force-refresh)", path.display())]
    CacheCorrupt { path: PathBuf, reason: String },

    #[error("cache I/O error at {}: {source}", path.display())]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed wide table: {0}")]
    Table(String),

    #[error("column '{0}' is not in the table")]
    MissingColumn(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub(crate) fn cache_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::CacheIo {
            path: path.into(),
            source,
        }
    }
}
