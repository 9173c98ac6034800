//! Outlier smoothing for the top (widest-spread) bucket column.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PipelineError;
use crate::wide_table::WideTable;

/// Default rolling-median window, in rows (months).
pub const DEFAULT_WINDOW: usize = 15;

/// Default cutoff for [`SmoothingPolicy::SigmaClip`].
pub const DEFAULT_N_SIGMA: f64 = 3.0;

/// How the top bucket is smoothed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SmoothingPolicy {
    /// Trailing median over `window` rows. The first `window - 1` rows, and
    /// any window holding a missing value, become missing.
    RollingMedian { window: usize },
    /// Replace values outside `mean ± n_sigma·std` with the column median.
    SigmaClip {
        #[serde(default = "default_n_sigma")]
        n_sigma: f64,
    },
}

fn default_n_sigma() -> f64 {
    DEFAULT_N_SIGMA
}

impl Default for SmoothingPolicy {
    fn default() -> Self {
        SmoothingPolicy::RollingMedian {
            window: DEFAULT_WINDOW,
        }
    }
}

impl SmoothingPolicy {
    pub fn validate(&self) -> Result<(), PipelineError> {
        match *self {
            SmoothingPolicy::RollingMedian { window: 0 } => Err(PipelineError::Config(
                "smoothing window must be at least 1".into(),
            )),
            SmoothingPolicy::SigmaClip { n_sigma } if !(n_sigma.is_finite() && n_sigma > 0.0) => {
                Err(PipelineError::Config(format!(
                    "n_sigma must be a positive number, got {n_sigma}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Smooth one column of values.
    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        match *self {
            SmoothingPolicy::RollingMedian { window } => rolling_median(values, window),
            SmoothingPolicy::SigmaClip { n_sigma } => sigma_clip(values, n_sigma),
        }
    }
}

/// Trailing rolling median. `out[i]` is the median of `values[i+1-window..=i]`.
pub fn rolling_median(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 || window > values.len() {
        return out;
    }
    let mut buf = Vec::with_capacity(window);
    for end in (window - 1)..values.len() {
        let slice = &values[end + 1 - window..=end];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        buf.clear();
        buf.extend_from_slice(slice);
        buf.sort_by(f64::total_cmp);
        let mid = window / 2;
        out[end] = if window % 2 == 0 {
            (buf[mid - 1] + buf[mid]) / 2.0
        } else {
            buf[mid]
        };
    }
    out
}

/// Column statistics for outlier detection. Missing cells are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierBounds {
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std: f64,
    pub median: f64,
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    /// `None` if fewer than two values are present.
    pub fn compute(values: &[f64], n_sigma: f64) -> Option<Self> {
        let mut present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if present.len() < 2 {
            return None;
        }
        let n = present.len() as f64;
        let mean = present.iter().sum::<f64>() / n;
        let var = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std = var.sqrt();

        present.sort_by(f64::total_cmp);
        let mid = present.len() / 2;
        let median = if present.len() % 2 == 0 {
            (present[mid - 1] + present[mid]) / 2.0
        } else {
            present[mid]
        };

        Some(Self {
            mean,
            std,
            median,
            lower: mean - n_sigma * std,
            upper: mean + n_sigma * std,
        })
    }

    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

fn sigma_clip(values: &[f64], n_sigma: f64) -> Vec<f64> {
    let Some(bounds) = OutlierBounds::compute(values, n_sigma) else {
        return values.to_vec();
    };
    values
        .iter()
        .map(|&v| if bounds.is_outlier(v) { bounds.median } else { v })
        .collect()
}

/// Smooth the top bucket of `table`, leaving every other column untouched.
pub fn process_cds_monthly(
    table: &WideTable,
    policy: &SmoothingPolicy,
) -> Result<WideTable, PipelineError> {
    policy.validate()?;
    let bucket = table.top_bucket();
    let column = table.column(bucket)?;
    let smoothed = policy.apply(&column);

    let mut out = table.clone();
    out.set_column(bucket, &smoothed)?;
    info!(
        column = %WideTable::column_name(bucket),
        rows = out.len(),
        ?policy,
        "smoothed top bucket"
    );
    Ok(out)
}
