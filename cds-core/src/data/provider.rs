//! Raw spread supplier trait.
//!
//! The acquisition layer (vendor API client, warehouse export, ...) hands the
//! pipeline one table per year with at least `date`, `ticker` and `parspread`
//! columns. `SpreadSource` abstracts over where those tables come from so the
//! transform stages can be fed from files in production and from in-memory
//! frames in tests.

use polars::prelude::DataFrame;
use std::collections::BTreeMap;

use crate::error::DataError;

/// Raw spread tables keyed by year.
pub type YearTables = BTreeMap<i32, DataFrame>;

/// Trait for raw CDS spread suppliers.
///
/// Implementations only fetch. Validation happens in the consolidator so every
/// supplier gets the same column and cell checks.
pub trait SpreadSource {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch all available raw tables, keyed by year.
    fn fetch_years(&self) -> Result<YearTables, DataError>;
}

/// A source backed by tables already held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    tables: YearTables,
}

impl InMemorySource {
    pub fn new(tables: YearTables) -> Self {
        Self { tables }
    }

    /// Add or replace the table for one year.
    pub fn with_year(mut self, year: i32, table: DataFrame) -> Self {
        self.tables.insert(year, table);
        self
    }
}

impl SpreadSource for InMemorySource {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn fetch_years(&self) -> Result<YearTables, DataError> {
        Ok(self.tables.clone())
    }
}
