//! Monthly quantile assignment.
//!
//! Each month is ranked independently: entities are stably sorted by spread
//! ascending and cut into N equal-frequency buckets, bucket 1 holding the
//! lowest spreads and bucket N the highest. A ticker's bucket may change from
//! one month to the next.
//!
//! Cuts are rank based. For a month with `n` entities, the entity at sorted
//! position `i` lands in bucket `1` when `i == 0` and in `ceil(i * N / (n - 1))`
//! otherwise. For distinct spreads this is the bucket a right-closed cut at
//! linearly interpolated `k/N` quantiles produces; for tied spreads the stable
//! sort order decides, so ties never collapse buckets. With `n >= N` bucket
//! sizes differ by at most one.
//!
//! Months with fewer than N entities (or fewer than N distinct spreads) are a
//! valid degenerate case: they are bucketed anyway, possibly leaving buckets
//! empty, and reported as [`DegenerateMonthWarning`]s.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::domain::{Month, Observation, QuantiledObservation};
use crate::error::DataError;

/// Default number of spread buckets.
pub const DEFAULT_QUANTILES: usize = 20;

/// A month that could not be split into N clean buckets. Non-fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegenerateMonthWarning {
    pub month: Month,
    pub entities: usize,
    pub distinct_spreads: usize,
    pub n_quantiles: usize,
}

/// Output of [`assign_quantiles`].
#[derive(Debug, Clone, Default)]
pub struct QuantileAssignment {
    /// Rows ordered by month, then by rank within the month.
    pub rows: Vec<QuantiledObservation>,
    pub degenerate_months: Vec<DegenerateMonthWarning>,
}

/// Bucket number (1-based) for the entity at sorted position `rank` out of `count`.
pub fn bucket_for_rank(rank: usize, count: usize, n_quantiles: usize) -> usize {
    if rank == 0 || count <= 1 {
        return 1;
    }
    (rank * n_quantiles + count - 2) / (count - 1)
}

/// Rank every month's observations into `n_quantiles` buckets.
pub fn assign_quantiles(
    monthly: &[Observation],
    n_quantiles: usize,
) -> Result<QuantileAssignment, DataError> {
    if n_quantiles == 0 || n_quantiles > u16::MAX as usize {
        return Err(DataError::InvalidQuantileCount(n_quantiles));
    }

    // Input order is preserved within a month so exact ties keep it.
    let mut by_month: BTreeMap<Month, Vec<&Observation>> = BTreeMap::new();
    for obs in monthly {
        by_month.entry(obs.month()).or_default().push(obs);
    }

    let mut assignment = QuantileAssignment {
        rows: Vec::with_capacity(monthly.len()),
        degenerate_months: Vec::new(),
    };

    for (month, mut members) in by_month {
        members.sort_by(|a, b| a.parspread.total_cmp(&b.parspread));

        let count = members.len();
        let distinct = 1 + members
            .windows(2)
            .filter(|w| w[0].parspread != w[1].parspread)
            .count();

        if count < n_quantiles || distinct < n_quantiles {
            warn!(
                %month,
                entities = count,
                distinct_spreads = distinct,
                n_quantiles,
                "degenerate month: buckets will be uneven or empty"
            );
            assignment.degenerate_months.push(DegenerateMonthWarning {
                month,
                entities: count,
                distinct_spreads: distinct,
                n_quantiles,
            });
        }

        for (rank, obs) in members.into_iter().enumerate() {
            assignment.rows.push(QuantiledObservation {
                observation: obs.clone(),
                month,
                quantile: bucket_for_rank(rank, count, n_quantiles) as u16,
            });
        }
    }

    info!(
        rows = assignment.rows.len(),
        degenerate = assignment.degenerate_months.len(),
        n_quantiles,
        "assigned spread quantiles"
    );
    Ok(assignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn month_of(tickers: &[(&str, f64)], date: &str) -> Vec<Observation> {
        tickers
            .iter()
            .map(|(t, s)| Observation::new(d(date), *t, *s))
            .collect()
    }

    fn bucket_of(rows: &[QuantiledObservation], ticker: &str) -> u16 {
        rows.iter()
            .find(|r| r.observation.ticker == ticker)
            .map(|r| r.quantile)
            .unwrap()
    }

    #[test]
    fn lowest_spread_is_bucket_one_highest_is_bucket_n() {
        let obs = month_of(&[("A", 5.0), ("B", 1.0), ("C", 3.0), ("D", 4.0), ("E", 2.0)], "2020-01-31");
        let out = assign_quantiles(&obs, 5).unwrap();

        assert_eq!(bucket_of(&out.rows, "B"), 1);
        assert_eq!(bucket_of(&out.rows, "E"), 2);
        assert_eq!(bucket_of(&out.rows, "C"), 3);
        assert_eq!(bucket_of(&out.rows, "D"), 4);
        assert_eq!(bucket_of(&out.rows, "A"), 5);
        assert!(out.degenerate_months.is_empty());
    }

    #[test]
    fn forty_names_fill_twenty_buckets_two_each() {
        let obs: Vec<Observation> = (0..40)
            .map(|i| Observation::new(d("2020-01-31"), format!("T{i:02}"), 100.0 - i as f64))
            .collect();
        let out = assign_quantiles(&obs, 20).unwrap();

        let mut sizes = [0usize; 21];
        for r in &out.rows {
            sizes[r.quantile as usize] += 1;
        }
        assert!(sizes[1..].iter().all(|&s| s == 2), "sizes: {sizes:?}");
        // T39 has the lowest spread.
        assert_eq!(bucket_of(&out.rows, "T39"), 1);
        assert_eq!(bucket_of(&out.rows, "T00"), 20);
    }

    #[test]
    fn ties_are_broken_by_input_order() {
        let obs = month_of(&[("A", 1.0), ("B", 1.0), ("C", 1.0), ("D", 1.0)], "2020-01-31");
        let out = assign_quantiles(&obs, 2).unwrap();

        let order: Vec<(&str, u16)> = out
            .rows
            .iter()
            .map(|r| (r.observation.ticker.as_str(), r.quantile))
            .collect();
        assert_eq!(order, vec![("A", 1), ("B", 1), ("C", 2), ("D", 2)]);
        assert_eq!(out.degenerate_months.len(), 1);
        assert_eq!(out.degenerate_months[0].distinct_spreads, 1);
    }

    #[test]
    fn months_are_ranked_independently() {
        let mut obs = month_of(&[("A", 1.0), ("B", 2.0)], "2020-01-31");
        obs.extend(month_of(&[("A", 9.0), ("B", 2.0)], "2020-02-28"));
        let out = assign_quantiles(&obs, 2).unwrap();

        let jan: Vec<_> = out.rows.iter().filter(|r| r.month.month == 1).collect();
        let feb: Vec<_> = out.rows.iter().filter(|r| r.month.month == 2).collect();
        assert_eq!(jan.iter().find(|r| r.observation.ticker == "A").unwrap().quantile, 1);
        assert_eq!(feb.iter().find(|r| r.observation.ticker == "A").unwrap().quantile, 2);
    }

    #[test]
    fn rows_on_different_days_share_a_month() {
        let obs = vec![
            Observation::new(d("2020-01-30"), "A", 1.0),
            Observation::new(d("2020-01-31"), "B", 2.0),
        ];
        let out = assign_quantiles(&obs, 2).unwrap();
        assert_eq!(out.rows[0].month, out.rows[1].month);
        assert_eq!(bucket_of(&out.rows, "A"), 1);
        assert_eq!(bucket_of(&out.rows, "B"), 2);
    }

    #[test]
    fn sparse_month_is_degenerate_but_not_an_error() {
        let obs = month_of(&[("A", 1.0), ("B", 2.0), ("C", 3.0)], "2020-01-31");
        let out = assign_quantiles(&obs, 20).unwrap();

        assert_eq!(out.rows.len(), 3);
        assert_eq!(bucket_of(&out.rows, "A"), 1);
        assert_eq!(bucket_of(&out.rows, "B"), 10);
        assert_eq!(bucket_of(&out.rows, "C"), 20);
        assert_eq!(
            out.degenerate_months,
            vec![DegenerateMonthWarning {
                month: Month { year: 2020, month: 1 },
                entities: 3,
                distinct_spreads: 3,
                n_quantiles: 20,
            }]
        );
    }

    #[test]
    fn single_entity_lands_in_bucket_one() {
        let obs = month_of(&[("A", 1.0)], "2020-01-31");
        let out = assign_quantiles(&obs, 20).unwrap();
        assert_eq!(out.rows[0].quantile, 1);
    }

    #[test]
    fn zero_quantiles_is_rejected() {
        let obs = month_of(&[("A", 1.0)], "2020-01-31");
        assert!(matches!(
            assign_quantiles(&obs, 0),
            Err(DataError::InvalidQuantileCount(0))
        ));
    }

    #[test]
    fn bucket_for_rank_matches_interpolated_cuts() {
        // 21 names, 20 buckets: edges fall exactly on names 0..=20, the
        // lowest edge is inclusive so bucket 1 holds two names.
        let buckets: Vec<usize> = (0..21).map(|i| bucket_for_rank(i, 21, 20)).collect();
        assert_eq!(buckets[0], 1);
        assert_eq!(buckets[1], 1);
        assert_eq!(buckets[2], 2);
        assert_eq!(buckets[20], 20);
    }
}
