//! The Wide Monthly Table: one row per month-end date, one `cds_{b}` column
//! per quantile bucket, plus its flat CSV form.
//!
//! CSV layout: header `Date,cds_1,...,cds_N`, dates as `YYYY-MM-DD`, values in
//! shortest round-trip decimal form, missing cells empty. Writing then reading
//! reproduces the table exactly.

use chrono::NaiveDate;
use std::io::{Read, Write};

use crate::error::PipelineError;

/// Header of the date column.
pub const DATE_COLUMN: &str = "Date";

/// One month of bucket values. Missing cells are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub date: NaiveDate,
    /// `values[b - 1]` is bucket `b`.
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    n_quantiles: usize,
    rows: Vec<WideRow>,
}

impl WideTable {
    /// Build a table, checking row widths and strictly increasing dates.
    pub fn from_rows(n_quantiles: usize, rows: Vec<WideRow>) -> Result<Self, PipelineError> {
        for (i, row) in rows.iter().enumerate() {
            if row.values.len() != n_quantiles {
                return Err(PipelineError::Table(format!(
                    "row {i} ({}) has {} values, expected {n_quantiles}",
                    row.date,
                    row.values.len()
                )));
            }
        }
        if let Some(w) = rows.windows(2).find(|w| w[0].date >= w[1].date) {
            return Err(PipelineError::Table(format!(
                "dates must be strictly increasing: {} is followed by {}",
                w[0].date, w[1].date
            )));
        }
        Ok(Self { n_quantiles, rows })
    }

    pub fn column_name(bucket: usize) -> String {
        format!("cds_{bucket}")
    }

    /// `cds_1 ..= cds_N`.
    pub fn column_names(&self) -> Vec<String> {
        (1..=self.n_quantiles).map(Self::column_name).collect()
    }

    pub fn n_quantiles(&self) -> usize {
        self.n_quantiles
    }

    /// Highest bucket number, i.e. the widest-spread column.
    pub fn top_bucket(&self) -> usize {
        self.n_quantiles
    }

    pub fn rows(&self) -> &[WideRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    /// Values of bucket `bucket` (1-based), top to bottom.
    pub fn column(&self, bucket: usize) -> Result<Vec<f64>, PipelineError> {
        self.check_bucket(bucket)?;
        Ok(self.rows.iter().map(|r| r.values[bucket - 1]).collect())
    }

    /// Look a column up by its `cds_{b}` name.
    pub fn column_by_name(&self, name: &str) -> Result<Vec<f64>, PipelineError> {
        let bucket = name
            .strip_prefix("cds_")
            .and_then(|b| b.parse::<usize>().ok())
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))?;
        self.column(bucket)
    }

    /// Overwrite bucket `bucket` in place. No other column is touched.
    pub fn set_column(&mut self, bucket: usize, values: &[f64]) -> Result<(), PipelineError> {
        self.check_bucket(bucket)?;
        if values.len() != self.rows.len() {
            return Err(PipelineError::Table(format!(
                "replacement for {} has {} values, table has {} rows",
                Self::column_name(bucket),
                values.len(),
                self.rows.len()
            )));
        }
        for (row, v) in self.rows.iter_mut().zip(values) {
            row.values[bucket - 1] = *v;
        }
        Ok(())
    }

    fn check_bucket(&self, bucket: usize) -> Result<(), PipelineError> {
        if bucket == 0 || bucket > self.n_quantiles {
            return Err(PipelineError::MissingColumn(Self::column_name(bucket)));
        }
        Ok(())
    }

    /// Same dates, same shape, values within `tol`. Missing cells must match.
    pub fn approx_eq(&self, other: &WideTable, tol: f64) -> bool {
        self.n_quantiles == other.n_quantiles
            && self.rows.len() == other.rows.len()
            && self.rows.iter().zip(&other.rows).all(|(a, b)| {
                a.date == b.date
                    && a.values.iter().zip(&b.values).all(|(x, y)| {
                        (x.is_nan() && y.is_nan()) || (x - y).abs() <= tol
                    })
            })
    }

    // ── CSV ──────────────────────────────────────────────────────────

    /// Write the table as CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), PipelineError> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = vec![DATE_COLUMN.to_string()];
        header.extend(self.column_names());
        wtr.write_record(&header)?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(row.values.len() + 1);
            record.push(row.date.format("%Y-%m-%d").to_string());
            record.extend(row.values.iter().map(|v| format_cell(*v)));
            wtr.write_record(&record)?;
        }

        wtr.flush()
            .map_err(|e| PipelineError::Table(format!("failed to flush CSV writer: {e}")))?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, PipelineError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| PipelineError::Table(format!("CSV output is not valid UTF-8: {e}")))
    }

    /// Read a table previously written by [`WideTable::write_csv`].
    ///
    /// The header must be `Date` followed by `cds_1 ..= cds_N` in order.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let mut names = headers.iter();
        match names.next() {
            Some(DATE_COLUMN) => {}
            other => {
                return Err(PipelineError::Table(format!(
                    "first column must be '{DATE_COLUMN}', found {other:?}"
                )))
            }
        }
        let n_quantiles = headers.len() - 1;
        for (i, name) in names.enumerate() {
            let expected = Self::column_name(i + 1);
            if name != expected {
                return Err(PipelineError::Table(format!(
                    "column {} must be '{expected}', found '{name}'",
                    i + 2
                )));
            }
        }

        let mut rows = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let raw_date = record.get(0).unwrap_or_default();
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| {
                PipelineError::Table(format!("row {line}: bad date '{raw_date}': {e}"))
            })?;
            let values = record
                .iter()
                .skip(1)
                .map(|cell| parse_cell(cell).map_err(|e| PipelineError::Table(format!("row {line}: {e}"))))
                .collect::<Result<Vec<f64>, _>>()?;
            rows.push(WideRow { date, values });
        }

        Self::from_rows(n_quantiles, rows)
    }

    pub fn from_csv_str(s: &str) -> Result<Self, PipelineError> {
        Self::read_csv(s.as_bytes())
    }
}

fn format_cell(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

fn parse_cell(cell: &str) -> Result<f64, String> {
    if cell.is_empty() {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>()
        .map_err(|e| format!("bad value '{cell}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample() -> WideTable {
        WideTable::from_rows(
            3,
            vec![
                WideRow {
                    date: d("2020-01-31"),
                    values: vec![0.0012, 0.0101, 0.1 + 0.2],
                },
                WideRow {
                    date: d("2020-02-29"),
                    values: vec![0.0011, f64::NAN, 1.0 / 3.0],
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn csv_layout_has_date_and_bucket_columns() {
        let csv = sample().to_csv_string().unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Date,cds_1,cds_2,cds_3"));
        assert_eq!(lines.next(), Some("2020-01-31,0.0012,0.0101,0.30000000000000004"));
        assert_eq!(lines.next(), Some("2020-02-29,0.0011,,0.3333333333333333"));
    }

    #[test]
    fn csv_read_back_is_exact() {
        let table = sample();
        let back = WideTable::from_csv_str(&table.to_csv_string().unwrap()).unwrap();

        assert_eq!(back.dates(), table.dates());
        assert_eq!(back.column(1).unwrap(), table.column(1).unwrap());
        assert_eq!(back.column(3).unwrap(), table.column(3).unwrap());
        assert!(back.column(2).unwrap()[1].is_nan());
        assert!(back.approx_eq(&table, 0.0));
    }

    #[test]
    fn header_with_spaces_is_accepted() {
        let table = WideTable::from_csv_str("Date, cds_1, cds_2\n2020-01-31, 1.5, 2.5\n").unwrap();
        assert_eq!(table.n_quantiles(), 2);
        assert_eq!(table.column(2).unwrap(), vec![2.5]);
    }

    #[test]
    fn wrong_header_is_rejected() {
        let err = WideTable::from_csv_str("Date,cds_2,cds_1\n2020-01-31,1,2\n").unwrap_err();
        assert!(err.to_string().contains("must be 'cds_1'"));

        let err = WideTable::from_csv_str("month,cds_1\n2020-01-31,1\n").unwrap_err();
        assert!(err.to_string().contains("first column"));
    }

    #[test]
    fn garbage_cells_are_rejected() {
        let err = WideTable::from_csv_str("Date,cds_1\n2020-01-31,wide\n").unwrap_err();
        assert!(err.to_string().contains("bad value 'wide'"));

        let err = WideTable::from_csv_str("Date,cds_1\nJanuary,1\n").unwrap_err();
        assert!(err.to_string().contains("bad date"));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(WideTable::from_csv_str("Date,cds_1,cds_2\n2020-01-31,1\n").is_err());
    }

    #[test]
    fn unordered_dates_are_rejected() {
        let rows = vec![
            WideRow { date: d("2020-02-29"), values: vec![1.0] },
            WideRow { date: d("2020-01-31"), values: vec![1.0] },
        ];
        assert!(WideTable::from_rows(1, rows).is_err());
    }

    #[test]
    fn set_column_touches_only_that_bucket() {
        let mut table = sample();
        table.set_column(3, &[9.0, 8.0]).unwrap();
        assert_eq!(table.column(3).unwrap(), vec![9.0, 8.0]);
        assert_eq!(table.column(1).unwrap(), vec![0.0012, 0.0011]);
        assert!(table.set_column(4, &[1.0, 1.0]).is_err());
        assert!(table.set_column(1, &[1.0]).is_err());
    }

    #[test]
    fn column_by_name_resolves_bucket() {
        let table = sample();
        assert_eq!(table.column_by_name("cds_1").unwrap(), vec![0.0012, 0.0011]);
        assert!(matches!(
            table.column_by_name("cds_20"),
            Err(PipelineError::MissingColumn(_))
        ));
        assert!(matches!(
            table.column_by_name("Date"),
            Err(PipelineError::MissingColumn(_))
        ));
    }
}
