//! Monthly resampling: last available observation per ticker per month.
//!
//! The kept row retains its own observation date; it is not moved to the
//! calendar month end. Months without any observation are simply absent.

use std::collections::BTreeMap;
use tracing::info;

use crate::domain::{Month, Observation};

/// Reduce each ticker's series to one observation per calendar month.
///
/// Output order is ticker ascending, then date ascending.
pub fn resample_month_end(observations: &[Observation]) -> Vec<Observation> {
    let mut by_ticker: BTreeMap<&str, BTreeMap<Month, &Observation>> = BTreeMap::new();

    for obs in observations {
        let months = by_ticker.entry(obs.ticker.as_str()).or_default();
        months
            .entry(obs.month())
            .and_modify(|kept| {
                if obs.date > kept.date {
                    *kept = obs;
                }
            })
            .or_insert(obs);
    }

    let out: Vec<Observation> = by_ticker
        .into_values()
        .flat_map(|months| months.into_values().cloned())
        .collect();

    info!(
        input = observations.len(),
        output = out.len(),
        "resampled to month-end observations"
    );
    out
}
