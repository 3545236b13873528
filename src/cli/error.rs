//! CLI error types and conversions

use crate::config::ConfigError;
use crate::downloader::FetchError;
use crate::merge::MergeError;
use crate::output::OutputError;
use crate::quickstats::QuickStatsError;
use crate::soil::SoilError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Directory setup failed
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// QuickStats client could not be set up
    #[error("quickstats error: {0}")]
    QuickStatsError(#[from] QuickStatsError),

    /// Fetch error
    #[error("fetch error: {0}")]
    FetchError(#[from] FetchError),

    /// Merge error
    #[error("merge error: {0}")]
    MergeError(#[from] MergeError),

    /// Soil error
    #[error("soil error: {0}")]
    SoilError(#[from] SoilError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Metrics exporter could not be started
    #[error("metrics error: {0}")]
    MetricsError(String),
}
