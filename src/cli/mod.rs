//! Command-line interface
//!
//! Global flags configure the shared pieces (data directory, worker pool,
//! retry ceiling, pacing, API key, metrics exporter); each subcommand drives
//! one stage of the pipeline.

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::downloader::config::{DEFAULT_END_YEAR, DEFAULT_START_YEAR, MAX_CONCURRENCY};
use crate::Metric;

pub mod commands;
pub mod error;

pub use error::CliError;

/// Parse and validate a concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON summary on stdout
    Json,
    /// Human-readable summary
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// County Crop Harvester CLI
#[derive(Parser, Debug)]
#[command(name = "county-crop-harvester")]
#[command(about = "Download and reconcile USDA NASS county crop statistics", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Data root; exports go to `{data_dir}/raw`, merged output to `{data_dir}/processed`
    #[arg(long, global = true, default_value = "data")]
    pub data_dir: PathBuf,

    /// Number of units in flight (default: 4, max: 32)
    ///
    /// QuickStats throttles aggressive clients; values above 8 mostly buy
    /// 429 responses.
    #[arg(long, global = true, default_value = "4", value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Attempts per HTTP call, including the first (default: 3, range: 1-20)
    #[arg(long, global = true, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: u32,

    /// Pause after every request, in milliseconds
    #[arg(long, global = true, default_value = "1000")]
    pub request_delay_ms: u64,

    /// QuickStats API key for the table command (falls back to USDA_NASS_API_KEY, then DEMO_KEY)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve and download per-year county exports
    Fetch(FetchArgs),

    /// Reconcile every cached export into the merged dataset
    Merge(MergeArgs),

    /// Concatenate cached exports into one file per crop and metric
    Consolidate(SelectionArgs),

    /// Download whole-range tables through the keyed JSON API
    Table(TableArgs),

    /// Aggregate surface soil properties per county
    Soil(SoilArgs),
}

/// Crop and metric selection shared by several commands
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Crops, comma-separated (default: the major field crops)
    #[arg(long, value_delimiter = ',')]
    pub crops: Vec<String>,

    /// Metrics, comma-separated
    #[arg(long, value_delimiter = ',', default_value = "yield,acres_planted")]
    pub metrics: Vec<Metric>,
}

impl SelectionArgs {
    /// Requested crops, or the major crops when none were given
    pub fn crops(&self) -> Vec<String> {
        if self.crops.is_empty() {
            crate::MAJOR_CROPS.iter().map(|c| c.to_string()).collect()
        } else {
            self.crops.iter().map(|c| c.trim().to_uppercase()).collect()
        }
    }
}

/// Inclusive year range
#[derive(Args, Debug, Clone, Copy)]
pub struct YearArgs {
    /// First survey year
    #[arg(long, default_value_t = DEFAULT_START_YEAR)]
    pub start_year: i32,

    /// Last survey year
    #[arg(long, default_value_t = DEFAULT_END_YEAR)]
    pub end_year: i32,
}

impl YearArgs {
    /// Validated range
    pub fn range(&self) -> Result<std::ops::RangeInclusive<i32>, CliError> {
        if self.start_year > self.end_year {
            return Err(CliError::InvalidArgument(format!(
                "start year {} is after end year {}",
                self.start_year, self.end_year
            )));
        }
        Ok(self.start_year..=self.end_year)
    }
}

/// Arguments for `fetch`
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Crops and metrics to fetch
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Years to fetch
    #[command(flatten)]
    pub years: YearArgs,

    /// Merge the retrieved exports once the batch finishes
    #[arg(long, default_value_t = false)]
    pub merge: bool,
}

/// Arguments for `merge`
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Merged CSV destination (default: `{data_dir}/processed/us_major_crops_county_all_years_major_crops.csv`)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Arguments for `table`
#[derive(Args, Debug)]
pub struct TableArgs {
    /// Crops and metrics to request
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Year range covered by each request
    #[command(flatten)]
    pub years: YearArgs,
}

/// Arguments for `soil`
#[derive(Args, Debug)]
pub struct SoilArgs {
    /// County reference table (default: `{data_dir}/raw/county_centroids.csv`)
    #[arg(long)]
    pub reference: Option<PathBuf>,
}
