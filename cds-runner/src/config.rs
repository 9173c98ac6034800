//! TOML pipeline configuration.
//!
//! ```toml
//! data_dir = "data"
//! output_dir = "output"
//! n_quantiles = 20
//! default_method = "median"
//! force_refresh = false
//!
//! [smoothing]
//! policy = "rolling_median"
//! window = 15
//! ```
//!
//! Every key is optional; missing keys take the defaults above.

use cds_core::{AggregationMethod, DEFAULT_QUANTILES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::smoothing::SmoothingPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory of per-year raw tables (`{year}.csv` / `{year}.parquet`).
    pub data_dir: PathBuf,
    /// Directory holding the wide-table cache files.
    pub output_dir: PathBuf,
    pub n_quantiles: usize,
    pub default_method: AggregationMethod,
    /// Ignore cached tables and recompute (then overwrite the cache).
    pub force_refresh: bool,
    pub smoothing: SmoothingPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            n_quantiles: DEFAULT_QUANTILES,
            default_method: AggregationMethod::default(),
            force_refresh: false,
            smoothing: SmoothingPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, PipelineError> {
        let table: toml::Table = toml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("parse pipeline TOML: {e}")))?;
        // Same parser as the CLI, so an unknown method reports the accepted names.
        if let Some(toml::Value::String(method)) = table.get("default_method") {
            method.parse::<AggregationMethod>()?;
        }
        let config: Self = toml::Value::Table(table)
            .try_into()
            .map_err(|e| PipelineError::Config(format!("parse pipeline TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, PipelineError> {
        toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("serialize pipeline config: {e}")))
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.n_quantiles == 0 {
            return Err(PipelineError::Config("n_quantiles must be at least 1".into()));
        }
        if self.n_quantiles > u16::MAX as usize {
            return Err(PipelineError::Config(format!(
                "n_quantiles must be at most {}, got {}",
                u16::MAX,
                self.n_quantiles
            )));
        }
        self.smoothing.validate()
    }
}
