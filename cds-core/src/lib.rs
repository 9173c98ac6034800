//! CDS Core: raw spread ingestion and the monthly quantile transform stages.
//!
//! This crate contains the front of the pipeline:
//! - Domain types (observations, calendar months, aggregation methods)
//! - The raw-table supplier seam and a file-backed supplier
//! - Consolidator: merge year tables, average duplicate (date, ticker) rows
//! - Monthly resampler: last observation per ticker per calendar month
//! - Quantile assigner: per-month equal-frequency spread buckets

pub mod consolidate;
pub mod data;
pub mod domain;
pub mod error;
pub mod quantile;
pub mod resample;

pub use consolidate::{consolidate, consolidate_observations};
pub use data::{DirectorySource, InMemorySource, SpreadSchema, SpreadSource, YearTables};
pub use domain::{AggregationMethod, Month, Observation, QuantiledObservation};
pub use error::DataError;
pub use quantile::{
    assign_quantiles, bucket_for_rank, DegenerateMonthWarning, QuantileAssignment,
    DEFAULT_QUANTILES,
};
pub use resample::resample_month_end;
