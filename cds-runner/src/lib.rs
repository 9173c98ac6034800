//! CDS Runner: bucket aggregation, wide-table caching and smoothing.
//!
//! This crate builds on `cds-core` to provide:
//! - Per-(bucket, month) aggregation by mean, median or self-weighted mean
//! - The Wide Monthly Table and its CSV form
//! - Wide-table stores (CSV files with metadata sidecars, or in-memory)
//! - Top-bucket smoothing (rolling median, sigma clipping)
//! - TOML configuration and the `Pipeline` entry points

pub mod aggregate;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod smoothing;
pub mod store;
pub mod wide_table;

pub use aggregate::{aggregate, mean, median, reduce, self_weighted_mean, Aggregator};
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use pipeline::Pipeline;
pub use smoothing::{
    process_cds_monthly, rolling_median, OutlierBounds, SmoothingPolicy, DEFAULT_N_SIGMA,
    DEFAULT_WINDOW,
};
pub use store::{CacheMeta, CacheStatus, CsvTableStore, MemoryTableStore, WideTableStore};
pub use wide_table::{WideRow, WideTable, DATE_COLUMN};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn wide_table_is_send_sync() {
        assert_send::<WideTable>();
        assert_sync::<WideTable>();
    }

    #[test]
    fn stores_are_send_sync() {
        assert_send::<CsvTableStore>();
        assert_sync::<CsvTableStore>();
        assert_send::<MemoryTableStore>();
        assert_sync::<MemoryTableStore>();
    }

    #[test]
    fn config_is_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
        assert_send::<SmoothingPolicy>();
        assert_sync::<SmoothingPolicy>();
    }
}
