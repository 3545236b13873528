//! # County Crop Harvester Library
//!
//! Acquires county-level agricultural statistics (yield, acres planted, acres
//! harvested, production) from USDA NASS QuickStats and reconciles the
//! resulting spreadsheet exports into one dataset keyed by
//! (state, county, year, crop).
//!
//! ## Features
//!
//! - **Query Resolution**: QuickStats has no stable query API for its
//!   spreadsheet exports, so each statistic is discovered by trying a ranked
//!   list of candidate descriptions until the encoder hands back a result handle
//! - **Idempotent Retrieval**: exports are cached on disk under a deterministic
//!   name; an existing file short-circuits every network call for that unit
//! - **Bounded Concurrency**: crop × metric × year units are fanned out over a
//!   bounded worker pool that tolerates per-unit failures and Ctrl+C
//! - **Reconciliation**: heterogeneous exports are classified, coerced and
//!   grouped into wide rows with a per-row source count
//!
//! ## Quick Start
//!
//! ```no_run
//! use county_crop_harvester::downloader::{BatchFetcher, FetchUnit};
//! use county_crop_harvester::quickstats::QuickStatsHttpClient;
//! use county_crop_harvester::Metric;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = Arc::new(QuickStatsHttpClient::shared()?);
//! let units = FetchUnit::cross_product(&["CORN"], &[Metric::Yield], 2020..=2021);
//!
//! let report = BatchFetcher::new(api, "data/raw").with_concurrency(4).run(units).await;
//! let merged = county_crop_harvester::merge::merge(&report.retrieved)?;
//! merged.write_csv("data/processed/merged.csv")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`quickstats`] - HTTP transport, query construction and result handles
//! - [`downloader`] - Query resolver, retriever and the parallel batch fetcher
//! - [`merge`] - Reconciliation of raw exports into the merged dataset
//! - [`output`] - Cache file naming and CSV writers
//! - [`soil`] - Per-county soil aggregates from NRCS Soil Data Access
//! - [`config`] - Directory provisioning and API key lookup

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Directory and credential configuration
pub mod config;

/// Resolution, retrieval and batch orchestration
pub mod downloader;

/// Merge engine for retrieved exports
pub mod merge;

/// Observability counters
pub mod metrics;

/// Cache naming and CSV writers
pub mod output;

/// QuickStats transport and query model
pub mod quickstats;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// NRCS soil data variant
pub mod soil;

/// Field crops fetched by default (unified "ALL CLASSES" commodities)
pub const MAJOR_CROPS: [&str; 12] = [
    "CORN",
    "SOYBEANS",
    "WHEAT",
    "COTTON",
    "RICE",
    "BARLEY",
    "SORGHUM",
    "PEANUTS",
    "SUGARCANE",
    "SUGARBEETS",
    "OATS",
    "SUNFLOWER",
];

/// Target statistic of a fetch unit and of a merged value column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    /// Yield, bushels per acre
    #[serde(rename = "yield")]
    Yield,
    /// Acres planted
    #[serde(rename = "acres_planted")]
    AcresPlanted,
    /// Acres harvested
    #[serde(rename = "acres_harvested")]
    AcresHarvested,
    /// Production, bushels
    #[serde(rename = "production")]
    Production,
}

impl Metric {
    /// Every metric, in merged-column order
    pub const ALL: [Metric; 4] = [
        Metric::Yield,
        Metric::AcresPlanted,
        Metric::AcresHarvested,
        Metric::Production,
    ];

    /// Tag used in cache filenames and CLI arguments
    pub fn tag(&self) -> &'static str {
        match self {
            Metric::Yield => "yield",
            Metric::AcresPlanted => "acres_planted",
            Metric::AcresHarvested => "acres_harvested",
            Metric::Production => "production",
        }
    }

    /// QuickStats `statisticcat_desc` for this metric
    pub fn category(&self) -> &'static str {
        match self {
            Metric::Yield => "YIELD",
            Metric::AcresPlanted => "AREA PLANTED",
            Metric::AcresHarvested => "AREA HARVESTED",
            Metric::Production => "PRODUCTION",
        }
    }

    /// Column name in the merged dataset
    pub fn column(&self) -> &'static str {
        match self {
            Metric::Yield => "Yield_BuPerAcre",
            Metric::AcresPlanted => "Acres_Planted",
            Metric::AcresHarvested => "Acres_Harvested",
            Metric::Production => "Production",
        }
    }

    /// Label used in consolidated per-crop filenames
    pub fn consolidated_label(&self) -> &'static str {
        match self {
            Metric::Yield => "yield",
            Metric::AcresPlanted => "area_planted",
            Metric::AcresHarvested => "area_harvested",
            Metric::Production => "production",
        }
    }

    /// Position in [`Metric::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Metric::Yield => 0,
            Metric::AcresPlanted => 1,
            Metric::AcresHarvested => 2,
            Metric::Production => 3,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yield" => Ok(Metric::Yield),
            "acres_planted" | "area_planted" | "planted" => Ok(Metric::AcresPlanted),
            "acres_harvested" | "area_harvested" | "harvested" => Ok(Metric::AcresHarvested),
            "production" => Ok(Metric::Production),
            _ => Err(format!(
                "Invalid metric: {s}. Valid options: yield, acres_planted, acres_harvested, production"
            )),
        }
    }
}

/// Normalize a crop name for filenames and the merged `Crop` column
///
/// Upper-cases, trims, turns spaces into underscores and drops commas:
/// `"sweet corn, "` becomes `"SWEET_CORN"`.
pub fn sanitize_crop_name(crop: &str) -> String {
    crop.trim().to_uppercase().replace(' ', "_").replace(',', "")
}
