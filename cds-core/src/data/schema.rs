//! Raw spread table schema: required columns and row extraction.

use chrono::NaiveDate;
use polars::prelude::*;

use crate::domain::Observation;
use crate::error::DataError;

/// Days between 0001-01-01 (CE day 1) and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Expected columns of a raw spread table.
pub struct SpreadSchema;

impl SpreadSchema {
    pub const DATE: &'static str = "date";
    pub const TICKER: &'static str = "ticker";
    pub const PARSPREAD: &'static str = "parspread";

    pub fn required_columns() -> [&'static str; 3] {
        [Self::DATE, Self::TICKER, Self::PARSPREAD]
    }

    /// Check that every required column is present. Extra columns are allowed.
    pub fn validate(year: i32, df: &DataFrame) -> Result<(), DataError> {
        let schema = df.schema();
        for name in Self::required_columns() {
            if !schema.contains(name) {
                return Err(DataError::format(format!(
                    "table for {year} is missing required column '{name}'"
                )));
            }
        }

        let spread_dtype = df.column(Self::PARSPREAD)?.dtype();
        if !(is_numeric(spread_dtype) || spread_dtype == &DataType::String) {
            return Err(DataError::format(format!(
                "table for {year}: column 'parspread' must be numeric, got {spread_dtype}"
            )));
        }

        Ok(())
    }

    /// Extract observations from a validated raw table, in row order.
    ///
    /// Null spreads become `NaN` and are dropped by the consolidator. Null or
    /// unparseable dates and tickers are format errors.
    pub fn to_observations(year: i32, df: &DataFrame) -> Result<Vec<Observation>, DataError> {
        Self::validate(year, df)?;

        let dates = date_column(year, df.column(Self::DATE)?)?;
        let tickers = df.column(Self::TICKER)?.cast(&DataType::String)?;
        let tickers = tickers.str()?;
        let spreads = spread_column(year, df.column(Self::PARSPREAD)?)?;

        let mut out = Vec::with_capacity(df.height());
        for (i, (date, parspread)) in dates.into_iter().zip(spreads).enumerate() {
            let ticker = tickers.get(i).ok_or_else(|| {
                DataError::format(format!("table for {year}: null ticker at row {i}"))
            })?;
            out.push(Observation {
                date,
                ticker: ticker.to_string(),
                parspread,
            });
        }
        Ok(out)
    }
}

fn is_numeric(dtype: &DataType) -> bool {
    dtype.is_primitive_numeric() || matches!(dtype, DataType::Decimal(_, _) | DataType::Null)
}

/// Spreads as `f64`, missing cells as `NaN`.
///
/// A CSV column whose leading rows are all empty is inferred as text, so
/// string columns are parsed cell by cell; blank cells count as missing.
fn spread_column(year: i32, column: &Column) -> Result<Vec<f64>, DataError> {
    if column.dtype() == &DataType::String {
        return column
            .str()?
            .into_iter()
            .enumerate()
            .map(|(i, cell)| match cell.map(str::trim) {
                None | Some("") => Ok(f64::NAN),
                Some(raw) => raw.parse::<f64>().map_err(|_| {
                    DataError::format(format!(
                        "table for {year}: unparseable parspread '{raw}' at row {i}"
                    ))
                }),
            })
            .collect();
    }
    let spreads = column.cast(&DataType::Float64)?;
    Ok(spreads
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Read a `date` column stored as polars Date, Datetime or ISO string.
fn date_column(year: i32, column: &Column) -> Result<Vec<NaiveDate>, DataError> {
    match column.dtype() {
        DataType::Date => days_to_dates(year, &column.cast(&DataType::Int32)?),
        DataType::Datetime(_, _) => {
            let as_date = column.cast(&DataType::Date)?;
            days_to_dates(year, &as_date.cast(&DataType::Int32)?)
        }
        DataType::String => {
            let ca = column.str()?;
            ca.into_iter()
                .enumerate()
                .map(|(i, cell)| {
                    let raw = cell.ok_or_else(|| {
                        DataError::format(format!("table for {year}: null date at row {i}"))
                    })?;
                    parse_date(raw).ok_or_else(|| {
                        DataError::format(format!(
                            "table for {year}: unparseable date '{raw}' at row {i}"
                        ))
                    })
                })
                .collect()
        }
        other => Err(DataError::format(format!(
            "table for {year}: column 'date' has unsupported type {other}"
        ))),
    }
}

fn days_to_dates(year: i32, days: &Column) -> Result<Vec<NaiveDate>, DataError> {
    days.i32()?
        .into_iter()
        .enumerate()
        .map(|(i, cell)| {
            cell.and_then(|d| NaiveDate::from_num_days_from_ce_opt(d + UNIX_EPOCH_DAYS_FROM_CE))
                .ok_or_else(|| {
                    DataError::format(format!("table for {year}: null date at row {i}"))
                })
        })
        .collect()
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        raw.get(..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
    })
}
