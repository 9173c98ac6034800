//! Pipeline entry points: raw supplier → wide table (cached) → smoothed table.

use cds_core::{
    assign_quantiles, consolidate, resample_month_end, AggregationMethod, QuantileAssignment,
    SpreadSource, DEFAULT_QUANTILES,
};
use tracing::info;

use crate::aggregate::Aggregator;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::smoothing::{process_cds_monthly, SmoothingPolicy};
use crate::store::WideTableStore;
use crate::wide_table::WideTable;

/// One configured run of the quantile pipeline.
///
/// The supplier is only consulted when the store has no table for the
/// requested method, or when `force_refresh` is set.
pub struct Pipeline<'a> {
    source: &'a dyn SpreadSource,
    store: &'a dyn WideTableStore,
    n_quantiles: usize,
    smoothing: SmoothingPolicy,
    force_refresh: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(source: &'a dyn SpreadSource, store: &'a dyn WideTableStore) -> Self {
        Self {
            source,
            store,
            n_quantiles: DEFAULT_QUANTILES,
            smoothing: SmoothingPolicy::default(),
            force_refresh: false,
        }
    }

    /// Pipeline using the config's bucket count, smoothing and refresh flag.
    pub fn from_config(
        config: &PipelineConfig,
        source: &'a dyn SpreadSource,
        store: &'a dyn WideTableStore,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self::new(source, store)
            .with_n_quantiles(config.n_quantiles)
            .with_smoothing(config.smoothing.clone())
            .with_force_refresh(config.force_refresh))
    }

    pub fn with_n_quantiles(mut self, n_quantiles: usize) -> Self {
        self.n_quantiles = n_quantiles;
        self
    }

    pub fn with_smoothing(mut self, smoothing: SmoothingPolicy) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }

    pub fn n_quantiles(&self) -> usize {
        self.n_quantiles
    }

    /// Consolidate, resample and rank the supplier's raw tables.
    pub fn process_cds_data(&self) -> Result<QuantileAssignment, PipelineError> {
        info!(source = self.source.name(), "fetching raw spread tables");
        let tables = self.source.fetch_years()?;
        let consolidated = consolidate(&tables)?;
        let monthly = resample_month_end(&consolidated);
        let assignment = assign_quantiles(&monthly, self.n_quantiles)?;
        if !assignment.degenerate_months.is_empty() {
            info!(
                months = assignment.degenerate_months.len(),
                "some months have too few entities for clean buckets"
            );
        }
        Ok(assignment)
    }

    /// Wide monthly table for `method`, from the store when available.
    pub fn get_wide_table(&self, method: AggregationMethod) -> Result<WideTable, PipelineError> {
        Aggregator::new(self.store, self.n_quantiles).get_or_build(
            method,
            self.force_refresh,
            || Ok(self.process_cds_data()?.rows),
        )
    }

    /// Wide table with the configured smoothing applied to the top bucket.
    ///
    /// Smoothing is applied on read; the stored table stays unsmoothed.
    pub fn get_smoothed_wide_table(
        &self,
        method: AggregationMethod,
    ) -> Result<WideTable, PipelineError> {
        let table = self.get_wide_table(method)?;
        process_cds_monthly(&table, &self.smoothing)
    }
}
