//! Domain types shared by every pipeline stage.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DataError;

/// A single spread observation for one entity on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub ticker: String,
    pub parspread: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, ticker: impl Into<String>, parspread: f64) -> Self {
        Self {
            date,
            ticker: ticker.into(),
            parspread,
        }
    }

    /// Calendar month this observation falls in.
    pub fn month(&self) -> Month {
        Month::of(self.date)
    }
}

/// A calendar month period. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Last calendar day of the month.
    pub fn end_date(&self) -> NaiveDate {
        let (y, m) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(y, m, 1)
            .and_then(|first_of_next| first_of_next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// A monthly observation tagged with the bucket it was ranked into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantiledObservation {
    pub observation: Observation,
    pub month: Month,
    /// Bucket number, 1 (lowest spreads) ..= N (highest spreads).
    pub quantile: u16,
}

/// Statistic used to reduce all spreads in a (bucket, month) cell to one value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum AggregationMethod {
    Mean,
    #[default]
    Median,
    /// Self-weighted mean: `Σ(x·x) / Σx`.
    Weighted,
}

impl AggregationMethod {
    pub const ALL: [AggregationMethod; 3] = [
        AggregationMethod::Mean,
        AggregationMethod::Median,
        AggregationMethod::Weighted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationMethod::Mean => "mean",
            AggregationMethod::Median => "median",
            AggregationMethod::Weighted => "weighted",
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AggregationMethod {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(AggregationMethod::Mean),
            "median" => Ok(AggregationMethod::Median),
            "weighted" => Ok(AggregationMethod::Weighted),
            _ => Err(DataError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for AggregationMethod {
    type Error = DataError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn month_end_handles_leap_years_and_december() {
        assert_eq!(Month::of(d("2020-02-10")).end_date(), d("2020-02-29"));
        assert_eq!(Month::of(d("2021-02-10")).end_date(), d("2021-02-28"));
        assert_eq!(Month::of(d("2020-12-01")).end_date(), d("2020-12-31"));
        assert_eq!(Month::of(d("2020-04-30")).end_date(), d("2020-04-30"));
    }

    #[test]
    fn months_order_chronologically() {
        let dec = Month::of(d("2019-12-31"));
        let jan = Month::of(d("2020-01-01"));
        assert!(dec < jan);
        assert_eq!(jan.to_string(), "2020-01");
    }

    #[test]
    fn method_parses_known_names() {
        assert_eq!("mean".parse::<AggregationMethod>().unwrap(), AggregationMethod::Mean);
        assert_eq!(" Median ".parse::<AggregationMethod>().unwrap(), AggregationMethod::Median);
        assert_eq!("WEIGHTED".parse::<AggregationMethod>().unwrap(), AggregationMethod::Weighted);
    }

    #[test]
    fn method_rejects_unknown_names() {
        let err = "mode".parse::<AggregationMethod>().unwrap_err();
        assert!(matches!(err, DataError::UnsupportedMethod(ref m) if m == "mode"));
        assert!(err.to_string().contains("mean, median, weighted"));
    }

    #[test]
    fn method_deserializes_like_it_parses() {
        let m: AggregationMethod = serde_json::from_str("\"Weighted\"").unwrap();
        assert_eq!(m, AggregationMethod::Weighted);
        let err = serde_json::from_str::<AggregationMethod>("\"mode\"").unwrap_err();
        assert!(err.to_string().contains("mean, median, weighted"));
        assert_eq!(serde_json::to_string(&AggregationMethod::Median).unwrap(), "\"median\"");
    }

    #[test]
    fn method_display_matches_cache_key() {
        for m in AggregationMethod::ALL {
            assert_eq!(m.to_string().parse::<AggregationMethod>().unwrap(), m);
        }
    }
}
