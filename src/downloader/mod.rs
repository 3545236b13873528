//! Resolution, retrieval and batch orchestration
//!
//! The downloader turns (crop, metric, year) units into cached exports:
//!
//! 1. **Cache check**: a raw file with the unit's prefix short-circuits everything
//! 2. **Resolution**: [`resolver::QueryResolver`] walks the ranked candidate
//!    descriptions until the encode endpoint returns a usable handle
//! 3. **Retrieval**: [`retriever::Retriever`] exchanges the handle for CSV and
//!    writes it atomically; a failed download falls through to the next candidate
//! 4. **Fan-out**: [`executor::BatchFetcher`] runs units over a bounded worker
//!    pool and collects results as they finish
//!
//! [`table::TableFetcher`] is the single-request-per-crop variant over the
//! keyed JSON API.
//!
//! # Error Handling
//!
//! Per-unit failures are logged and counted, never propagated: a batch always
//! completes with a [`BatchReport`]. [`FetchError`] surfaces only from the
//! building blocks and from the table writer.

use std::path::PathBuf;

use crate::output::OutputError;
use crate::quickstats::QuickStatsError;
use crate::Metric;

pub mod config;
pub mod executor;
pub mod job;
pub mod progress;
pub mod rate_limit;
pub mod resolver;
pub mod retriever;
pub mod table;

pub use executor::{run_bounded, BatchFetcher, BatchReport, Collected};
pub use job::{FetchUnit, UnitReport};
pub use rate_limit::RequestPacer;
pub use resolver::{QueryResolver, Resolution};
pub use retriever::Retriever;
pub use table::{TableFetcher, TableReport};

/// Downloader errors
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// No candidate description produced a handle
    #[error("no candidate description resolved for {crop} {metric} {year}")]
    NotFound {
        /// Crop as queried
        crop: String,
        /// Target metric
        metric: Metric,
        /// Survey year
        year: i32,
    },

    /// Transport or API failure
    #[error("QuickStats error: {0}")]
    QuickStats(#[from] QuickStatsError),

    /// Writing a result failed
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Raw directory could not be read
    #[error("cannot read {path}: {reason}")]
    RawDir {
        /// Directory that failed
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },
}
