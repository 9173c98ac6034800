//! CDS quantile CLI: build, smooth and manage cached wide tables.
//!
//! Commands:
//! - `wide`: print the wide monthly table for a method as CSV
//! - `smoothed`: same, with the top bucket smoothed
//! - `cache status`: list cached methods, row counts and date ranges
//! - `cache clear`: delete cached tables (one method or all)
//!
//! Logs go to stderr (`RUST_LOG` overrides the default filter), so stdout
//! can be redirected straight into a CSV file.

use anyhow::{Context, Result};
use cds_core::{AggregationMethod, DirectorySource};
use cds_runner::{CsvTableStore, Pipeline, PipelineConfig, WideTable, WideTableStore};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "cds-quantiles.toml";

#[derive(Parser)]
#[command(
    name = "cds-quantiles",
    about = "Monthly CDS spread quantile tables"
)]
struct Cli {
    /// Path to a TOML pipeline config. Defaults to ./cds-quantiles.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the wide monthly table as CSV.
    Wide {
        /// Aggregation method: mean, median or weighted. Defaults to the config's.
        #[arg(long)]
        method: Option<String>,

        /// Ignore any cached table, recompute and overwrite it.
        #[arg(long, default_value_t = false)]
        force_refresh: bool,
    },
    /// Print the wide monthly table with the top bucket smoothed.
    Smoothed {
        /// Aggregation method: mean, median or weighted. Defaults to the config's.
        #[arg(long)]
        method: Option<String>,

        /// Ignore any cached table, recompute and overwrite it.
        #[arg(long, default_value_t = false)]
        force_refresh: bool,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached methods with row counts and date ranges.
    Status,
    /// Delete cached tables.
    Clear {
        /// Only clear this method's table.
        #[arg(long)]
        method: Option<String>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Wide {
            method,
            force_refresh,
        } => run_table(&config, method.as_deref(), force_refresh, false),
        Commands::Smoothed {
            method,
            force_refresh,
        } => run_table(&config, method.as_deref(), force_refresh, true),
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&config.output_dir),
            CacheAction::Clear { method } => run_cache_clear(&config.output_dir, method.as_deref()),
        },
    }
}

fn init_tracing() {
    use tracing_subscriber::prelude::*;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cds_core=info,cds_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<PipelineConfig> {
    if let Some(path) = explicit {
        return PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()));
    }
    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        tracing::info!(path = DEFAULT_CONFIG_FILE, "using config from working directory");
        return PipelineConfig::from_file(default_path)
            .with_context(|| format!("loading config {DEFAULT_CONFIG_FILE}"));
    }
    Ok(PipelineConfig::default())
}

fn parse_method(method: Option<&str>, config: &PipelineConfig) -> Result<AggregationMethod> {
    match method {
        Some(m) => Ok(m.parse::<AggregationMethod>()?),
        None => Ok(config.default_method),
    }
}

fn run_table(
    config: &PipelineConfig,
    method: Option<&str>,
    force_refresh: bool,
    smoothed: bool,
) -> Result<()> {
    let method = parse_method(method, config)?;
    let source = DirectorySource::new(&config.data_dir);
    let store = CsvTableStore::new(&config.output_dir);
    let pipeline = Pipeline::from_config(config, &source, &store)?
        .with_force_refresh(config.force_refresh || force_refresh);

    let table = if smoothed {
        pipeline.get_smoothed_wide_table(method)
    } else {
        pipeline.get_wide_table(method)
    }
    .with_context(|| format!("building {method} wide table from {}", config.data_dir.display()))?;

    print_table(&table)
}

fn print_table(table: &WideTable) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    table.write_csv(&mut out)?;
    out.flush()?;
    Ok(())
}

fn run_cache_status(output_dir: &Path) -> Result<()> {
    if !output_dir.exists() {
        println!("Cache directory does not exist: {}", output_dir.display());
        return Ok(());
    }

    let store = CsvTableStore::new(output_dir);
    println!("Cache: {}", output_dir.display());
    println!();
    println!(
        "{:<10} {:<8} {:>6} {:>10} {:<25}",
        "Method", "Cached", "Rows", "Buckets", "Date Range"
    );
    println!("{}", "-".repeat(63));
    for status in store.status() {
        let (rows, buckets, range) = match &status.meta {
            Some(meta) => (
                meta.rows.to_string(),
                meta.n_quantiles.to_string(),
                match (meta.first_date, meta.last_date) {
                    (Some(first), Some(last)) => format!("{first} to {last}"),
                    _ => "(empty)".to_string(),
                },
            ),
            None if status.cached => ("?".into(), "?".into(), "(no meta)".into()),
            None => ("-".into(), "-".into(), "-".into()),
        };
        println!(
            "{:<10} {:<8} {:>6} {:>10} {:<25}",
            status.method.as_str(),
            if status.cached { "yes" } else { "no" },
            rows,
            buckets,
            range
        );
    }
    Ok(())
}

fn run_cache_clear(output_dir: &Path, method: Option<&str>) -> Result<()> {
    let store = CsvTableStore::new(output_dir);
    match method {
        Some(m) => {
            let method: AggregationMethod = m.parse()?;
            if store.remove(method)? {
                println!("Removed {}", store.table_path(method).display());
            } else {
                println!("No cached {method} table in {}", output_dir.display());
            }
        }
        None => {
            let removed = store.clear()?;
            println!("Removed {removed} cached table(s) from {}", output_dir.display());
        }
    }
    Ok(())
}
