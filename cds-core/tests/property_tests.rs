//! Property tests for the monthly transform stages.
//!
//! Uses proptest to verify:
//! 1. Partition: every month's entities land in exactly one bucket
//! 2. Equal frequency: bucket sizes differ by at most one when count >= N
//! 3. Monotonicity: a higher spread never lands in a lower bucket
//! 4. Resampling: one row per (ticker, month), always the latest date

use cds_core::{assign_quantiles, resample_month_end, Month, Observation};
use chrono::NaiveDate;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_spread() -> impl Strategy<Value = f64> {
    // Coarse grid so ties are common.
    (1u32..400).prop_map(|bp| bp as f64 / 10_000.0)
}

/// One month of observations: distinct tickers with arbitrary spreads.
fn arb_month(max_names: usize) -> impl Strategy<Value = Vec<Observation>> {
    prop::collection::vec(arb_spread(), 1..max_names).prop_map(|spreads| {
        let date = NaiveDate::from_ymd_opt(2021, 6, 30).unwrap();
        spreads
            .into_iter()
            .enumerate()
            .map(|(i, s)| Observation::new(date, format!("T{i:03}"), s))
            .collect()
    })
}

/// Daily observations for a handful of tickers over a year.
fn arb_daily() -> impl Strategy<Value = Vec<Observation>> {
    prop::collection::vec((0usize..5, 0i64..365, arb_spread()), 1..200).prop_map(|rows| {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut seen = BTreeSet::new();
        rows.into_iter()
            .filter(|(t, day, _)| seen.insert((*t, *day)))
            .map(|(t, day, s)| {
                Observation::new(start + chrono::Duration::days(day), format!("N{t}"), s)
            })
            .collect()
    })
}

// ── 1. Partition ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn every_entity_lands_in_exactly_one_bucket(
        month in arb_month(120),
        n in 1usize..30,
    ) {
        let out = assign_quantiles(&month, n).unwrap();

        let input: BTreeSet<&str> = month.iter().map(|o| o.ticker.as_str()).collect();
        let mut assigned: Vec<&str> = out.rows.iter().map(|r| r.observation.ticker.as_str()).collect();
        assigned.sort_unstable();
        let unique: BTreeSet<&str> = assigned.iter().copied().collect();

        prop_assert_eq!(assigned.len(), input.len());
        prop_assert_eq!(unique, input);
        for r in &out.rows {
            prop_assert!(r.quantile >= 1 && r.quantile as usize <= n);
        }
    }
}

// ── 2. Equal frequency ───────────────────────────────────────────────

proptest! {
    #[test]
    fn bucket_sizes_differ_by_at_most_one(
        (n, month) in (1usize..25).prop_flat_map(|n| (Just(n), arb_month(150)))
            .prop_filter("needs at least N names", |(n, m)| m.len() >= *n),
    ) {
        let out = assign_quantiles(&month, n).unwrap();

        let mut sizes: HashMap<u16, usize> = (1..=n as u16).map(|b| (b, 0)).collect();
        for r in &out.rows {
            *sizes.entry(r.quantile).or_default() += 1;
        }
        let max = *sizes.values().max().unwrap();
        let min = *sizes.values().min().unwrap();
        prop_assert!(max - min <= 1, "sizes {:?}", sizes);
    }
}

// ── 3. Monotonicity ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn higher_spread_never_in_lower_bucket(month in arb_month(80), n in 1usize..20) {
        let out = assign_quantiles(&month, n).unwrap();
        for a in &out.rows {
            for b in &out.rows {
                if a.observation.parspread < b.observation.parspread {
                    prop_assert!(a.quantile <= b.quantile);
                }
            }
        }
    }
}

// ── 4. Resampling ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn resample_keeps_latest_date_per_ticker_month(daily in arb_daily()) {
        let out = resample_month_end(&daily);

        let mut latest: BTreeMap<(String, Month), NaiveDate> = BTreeMap::new();
        for o in &daily {
            let e = latest.entry((o.ticker.clone(), o.month())).or_insert(o.date);
            if o.date > *e {
                *e = o.date;
            }
        }

        prop_assert_eq!(out.len(), latest.len());
        for o in &out {
            prop_assert_eq!(latest[&(o.ticker.clone(), o.month())], o.date);
        }
    }
}
