//! Bucket aggregation and the cache-aware aggregator.
//!
//! Quantiled rows are grouped by (bucket, month), each group's spreads are
//! reduced to one value, and the result is pivoted to a [`WideTable`] with
//! one row per month-end date and one `cds_{b}` column per bucket.

use cds_core::{AggregationMethod, Month, QuantiledObservation};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::store::WideTableStore;
use crate::wide_table::{WideRow, WideTable};

/// Reduce one group of spreads with the given statistic.
///
/// Returns `NaN` for an empty group.
pub fn reduce(values: &[f64], method: AggregationMethod) -> f64 {
    match method {
        AggregationMethod::Mean => mean(values),
        AggregationMethod::Median => median(values),
        AggregationMethod::Weighted => self_weighted_mean(values),
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Middle value; the mean of the two middle values for even counts.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Each spread weighted by itself: `Σ(x·x) / Σx`.
pub fn self_weighted_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let weights: f64 = values.iter().sum();
    let weighted: f64 = values.iter().map(|x| x * x).sum();
    weighted / weights
}

/// Group quantiled rows by (bucket, month), reduce, and pivot wide.
///
/// Every bucket `1..=n_quantiles` gets a column; a (bucket, month) cell with
/// no members is `NaN`. Rows are dated at the calendar month end.
pub fn aggregate(
    rows: &[QuantiledObservation],
    method: AggregationMethod,
    n_quantiles: usize,
) -> Result<WideTable, PipelineError> {
    let mut groups: BTreeMap<(u16, Month), Vec<f64>> = BTreeMap::new();
    let mut months = BTreeSet::new();

    for row in rows {
        let bucket = row.quantile as usize;
        if bucket == 0 || bucket > n_quantiles {
            return Err(PipelineError::Table(format!(
                "{} in {} has bucket {bucket}, expected 1..={n_quantiles}",
                row.observation.ticker, row.month
            )));
        }
        groups
            .entry((row.quantile, row.month))
            .or_default()
            .push(row.observation.parspread);
        months.insert(row.month);
    }

    let mut cells: BTreeMap<Month, Vec<f64>> = months
        .into_iter()
        .map(|m| (m, vec![f64::NAN; n_quantiles]))
        .collect();
    for ((bucket, month), spreads) in &groups {
        if let Some(values) = cells.get_mut(month) {
            values[*bucket as usize - 1] = reduce(spreads, method);
        }
    }

    let wide_rows = cells
        .into_iter()
        .map(|(month, values)| WideRow {
            date: month.end_date(),
            values,
        })
        .collect();

    let table = WideTable::from_rows(n_quantiles, wide_rows)?;
    info!(
        %method,
        months = table.len(),
        groups = groups.len(),
        "aggregated bucket spreads"
    );
    Ok(table)
}

/// Aggregator with an injected wide-table store.
///
/// A stored table for the requested method is returned verbatim without
/// running any upstream stage, even if the raw inputs have since changed.
/// Only a forced refresh (or deleting the entry) recomputes it.
pub struct Aggregator<'a> {
    store: &'a dyn WideTableStore,
    n_quantiles: usize,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a dyn WideTableStore, n_quantiles: usize) -> Self {
        Self { store, n_quantiles }
    }

    /// Stored table for `method`, if any.
    pub fn cached(&self, method: AggregationMethod) -> Result<Option<WideTable>, PipelineError> {
        let hit = self.store.get(method)?;
        match &hit {
            Some(table) => {
                debug!(%method, rows = table.len(), "wide table cache hit");
                if table.n_quantiles() != self.n_quantiles {
                    warn!(
                        %method,
                        cached = table.n_quantiles(),
                        configured = self.n_quantiles,
                        "cached table has a different bucket count; returning it unchanged"
                    );
                }
            }
            None => debug!(%method, "wide table cache miss"),
        }
        Ok(hit)
    }

    /// Aggregate `rows` and persist the result before returning it.
    pub fn build(
        &self,
        rows: &[QuantiledObservation],
        method: AggregationMethod,
    ) -> Result<WideTable, PipelineError> {
        let table = aggregate(rows, method, self.n_quantiles)?;
        self.store.put(method, &table)?;
        Ok(table)
    }

    /// Cached table, or run `upstream` and build one.
    ///
    /// `upstream` is only called on a miss or when `force_refresh` is set.
    pub fn get_or_build<F>(
        &self,
        method: AggregationMethod,
        force_refresh: bool,
        upstream: F,
    ) -> Result<WideTable, PipelineError>
    where
        F: FnOnce() -> Result<Vec<QuantiledObservation>, PipelineError>,
    {
        if force_refresh {
            info!(%method, "force refresh: ignoring cached wide table");
        } else if let Some(table) = self.cached(method)? {
            return Ok(table);
        }
        let rows = upstream()?;
        self.build(&rows, method)
    }
}
