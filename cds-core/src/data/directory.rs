//! File-backed spread source.
//!
//! Layout: `{dir}/{year}.csv` or `{dir}/{year}.parquet`, one file per year as
//! dropped by the acquisition job. Files whose stem is not a year are ignored.

use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::provider::{SpreadSource, YearTables};
use crate::error::DataError;

/// Reads raw per-year spread tables from a directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Year files present in the directory, sorted by year.
    pub fn year_files(&self) -> Result<Vec<(i32, PathBuf)>, DataError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let ext = path.extension().and_then(|e| e.to_str());
            if !matches!(ext, Some("csv") | Some("parquet")) {
                continue;
            }
            let year = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<i32>().ok());
            match year {
                Some(year) => files.push((year, path)),
                None => debug!(path = %path.display(), "skipping non-year file"),
            }
        }
        files.sort();
        Ok(files)
    }
}

impl SpreadSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    fn fetch_years(&self) -> Result<YearTables, DataError> {
        let mut tables = YearTables::new();
        for (year, path) in self.year_files()? {
            if tables.contains_key(&year) {
                return Err(DataError::format(format!(
                    "more than one raw file for {year} in {}",
                    self.dir.display()
                )));
            }
            let df = read_table(&path)?;
            debug!(year, rows = df.height(), path = %path.display(), "loaded raw table");
            tables.insert(year, df);
        }
        Ok(tables)
    }
}

fn read_table(path: &Path) -> Result<DataFrame, DataError> {
    let lf = match path.extension().and_then(|e| e.to_str()) {
        Some("parquet") => LazyFrame::scan_parquet(path, Default::default())?,
        _ => LazyCsvReader::new(path)
            .with_has_header(true)
            .with_try_parse_dates(true)
            .finish()?,
    };
    Ok(lf.collect()?)
}
