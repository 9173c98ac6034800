//! Wide-table cache: one entry per aggregation method.
//!
//! Layout: `{output_dir}/cds_monthly_spread_{method}.csv`, plus a metadata
//! sidecar `cds_monthly_spread_{method}.meta.json` (row count, date range,
//! content hash) used for status reporting.
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Corrupt files fail loudly; they are never silently recomputed
//! - Invalidation only by deleting the entry (or a forced refresh upstream)
//!
//! Concurrent writers for the same method are not coordinated.

use cds_core::AggregationMethod;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::wide_table::WideTable;

/// Key-value store for wide tables, keyed by aggregation method.
pub trait WideTableStore {
    /// Stored table for `method`, or `None` if there is no entry.
    fn get(&self, method: AggregationMethod) -> Result<Option<WideTable>, PipelineError>;

    /// Store `table` under `method`, replacing any existing entry.
    fn put(&self, method: AggregationMethod, table: &WideTable) -> Result<(), PipelineError>;

    /// Delete the entry for `method`. Returns whether one existed.
    fn remove(&self, method: AggregationMethod) -> Result<bool, PipelineError>;
}

/// Metadata sidecar for a cached wide table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub method: AggregationMethod,
    pub n_quantiles: usize,
    pub rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    /// BLAKE3 hash of the CSV bytes.
    pub data_hash: String,
    pub written_at: chrono::NaiveDateTime,
}

/// Cache status for a single method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub method: AggregationMethod,
    pub path: PathBuf,
    pub cached: bool,
    pub meta: Option<CacheMeta>,
}

/// File-backed store writing one CSV per method.
#[derive(Debug, Clone)]
pub struct CsvTableStore {
    dir: PathBuf,
}

impl CsvTableStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(method: AggregationMethod) -> String {
        format!("cds_monthly_spread_{method}.csv")
    }

    /// Path of the cache file for a method.
    pub fn table_path(&self, method: AggregationMethod) -> PathBuf {
        self.dir.join(Self::file_name(method))
    }

    fn meta_path(&self, method: AggregationMethod) -> PathBuf {
        self.dir
            .join(format!("cds_monthly_spread_{method}.meta.json"))
    }

    /// Metadata sidecar for a method, if present and readable.
    pub fn get_meta(&self, method: AggregationMethod) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(method)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Status of every method's entry.
    pub fn status(&self) -> Vec<CacheStatus> {
        AggregationMethod::ALL
            .iter()
            .map(|&method| {
                let path = self.table_path(method);
                CacheStatus {
                    method,
                    cached: path.exists(),
                    meta: self.get_meta(method),
                    path,
                }
            })
            .collect()
    }

    /// Remove every method's entry. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, PipelineError> {
        let mut removed = 0;
        for method in AggregationMethod::ALL {
            if self.remove(method)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl WideTableStore for CsvTableStore {
    fn get(&self, method: AggregationMethod) -> Result<Option<WideTable>, PipelineError> {
        let path = self.table_path(method);
        if !path.exists() {
            return Ok(None);
        }

        let file = fs::File::open(&path).map_err(|e| PipelineError::cache_io(&path, e))?;
        let table = WideTable::read_csv(file).map_err(|e| PipelineError::CacheCorrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), rows = table.len(), "loaded cached wide table");
        Ok(Some(table))
    }

    fn put(&self, method: AggregationMethod, table: &WideTable) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.dir).map_err(|e| PipelineError::cache_io(&self.dir, e))?;

        let csv = table.to_csv_string()?;
        let path = self.table_path(method);
        let tmp_path = path.with_extension("csv.tmp");

        fs::write(&tmp_path, csv.as_bytes()).map_err(|e| PipelineError::cache_io(&tmp_path, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            PipelineError::cache_io(&path, e)
        })?;

        let dates = table.dates();
        let meta = CacheMeta {
            method,
            n_quantiles: table.n_quantiles(),
            rows: table.len(),
            first_date: dates.first().copied(),
            last_date: dates.last().copied(),
            data_hash: blake3::hash(csv.as_bytes()).to_hex().to_string(),
            written_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| PipelineError::Table(format!("meta serialization: {e}")))?;
        let meta_path = self.meta_path(method);
        fs::write(&meta_path, meta_json).map_err(|e| PipelineError::cache_io(&meta_path, e))?;

        info!(path = %path.display(), rows = table.len(), "wrote wide table cache");
        Ok(())
    }

    fn remove(&self, method: AggregationMethod) -> Result<bool, PipelineError> {
        let path = self.table_path(method);
        let existed = path.exists();
        if existed {
            fs::remove_file(&path).map_err(|e| PipelineError::cache_io(&path, e))?;
        }
        let meta_path = self.meta_path(method);
        if meta_path.exists() {
            fs::remove_file(&meta_path).map_err(|e| PipelineError::cache_io(&meta_path, e))?;
        }
        Ok(existed)
    }
}

/// In-process store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: Mutex<BTreeMap<AggregationMethod, WideTable>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<AggregationMethod, WideTable>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WideTableStore for MemoryTableStore {
    fn get(&self, method: AggregationMethod) -> Result<Option<WideTable>, PipelineError> {
        Ok(self.lock().get(&method).cloned())
    }

    fn put(&self, method: AggregationMethod, table: &WideTable) -> Result<(), PipelineError> {
        self.lock().insert(method, table.clone());
        Ok(())
    }

    fn remove(&self, method: AggregationMethod) -> Result<bool, PipelineError> {
        Ok(self.lock().remove(&method).is_some())
    }
}
