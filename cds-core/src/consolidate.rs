//! Consolidation of per-year raw tables into one observation set.
//!
//! All year tables are concatenated row-wise and duplicate (date, ticker)
//! observations are averaged, so the output holds exactly one observation per
//! (date, ticker) pair. Output order is ticker ascending, then date ascending.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::data::{SpreadSchema, YearTables};
use crate::domain::Observation;
use crate::error::DataError;

/// Merge all year tables and average duplicate (date, ticker) rows.
///
/// Fails with `DataFormat` when there are no tables, when any table lacks a
/// required column, or when the tables hold no rows at all.
pub fn consolidate(tables: &YearTables) -> Result<Vec<Observation>, DataError> {
    if tables.is_empty() {
        return Err(DataError::format("no raw spread tables supplied"));
    }

    let mut raw = Vec::new();
    for (year, df) in tables {
        let rows = SpreadSchema::to_observations(*year, df)?;
        debug!(year, rows = rows.len(), "read raw table");
        raw.extend(rows);
    }

    if raw.is_empty() {
        return Err(DataError::format("raw spread tables contain no rows"));
    }

    let consolidated = consolidate_observations(raw);
    info!(rows = consolidated.len(), "consolidated observations");
    Ok(consolidated)
}

/// Average duplicate (date, ticker) observations.
///
/// Non-finite spreads are skipped when averaging. A pair with no finite
/// spread at all is dropped.
pub fn consolidate_observations(
    raw: impl IntoIterator<Item = Observation>,
) -> Vec<Observation> {
    let mut groups: BTreeMap<(String, NaiveDate), (f64, usize)> = BTreeMap::new();
    for obs in raw {
        let acc = groups.entry((obs.ticker, obs.date)).or_insert((0.0, 0));
        if obs.parspread.is_finite() {
            acc.0 += obs.parspread;
            acc.1 += 1;
        }
    }

    let mut dropped = 0usize;
    let out: Vec<Observation> = groups
        .into_iter()
        .filter_map(|((ticker, date), (sum, count))| {
            if count == 0 {
                dropped += 1;
                return None;
            }
            Some(Observation {
                date,
                ticker,
                parspread: sum / count as f64,
            })
        })
        .collect();

    if dropped > 0 {
        debug!(dropped, "dropped (date, ticker) pairs with no finite spread");
    }
    out
}
