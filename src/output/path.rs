//! Raw cache file naming
//!
//! Every retrieved export is stored flat in the raw directory as
//! `{CROP_TAG}__{metric}__{year}__{handle}.csv`. The name carries everything
//! the merge engine needs to classify rows when the export itself is vague,
//! and its prefix is what the batch fetcher checks for cache hits.
//!
//! ```rust
//! use county_crop_harvester::output::path::{cache_filename, ExportName};
//! use county_crop_harvester::quickstats::ResultHandle;
//! use county_crop_harvester::Metric;
//!
//! let handle = ResultHandle::parse("\"6B9F-11AA\"").unwrap();
//! let name = cache_filename("CORN", Metric::Yield, 2020, &handle);
//! assert_eq!(name, "CORN__yield__2020__6B9F-11AA.csv");
//!
//! let parsed = ExportName::parse(&name).unwrap();
//! assert_eq!(parsed.metric, Metric::Yield);
//! ```

use std::path::{Path, PathBuf};

use crate::quickstats::ResultHandle;
use crate::Metric;

/// Separator between filename components
pub const SEPARATOR: &str = "__";

/// Soil aggregates filename inside the raw directory
pub const SOIL_AGGREGATES_FILENAME: &str = "county_soil_aggregates.csv";

/// Cache filename for a retrieved export
pub fn cache_filename(crop_tag: &str, metric: Metric, year: i32, handle: &ResultHandle) -> String {
    format!("{}{}.csv", unit_prefix(crop_tag, metric, year), handle.as_str())
}

/// Filename prefix shared by every export of one unit
pub fn unit_prefix(crop_tag: &str, metric: Metric, year: i32) -> String {
    format!(
        "{crop_tag}{SEPARATOR}{}{SEPARATOR}{year}{SEPARATOR}",
        metric.tag()
    )
}

/// First cached export for a unit, if any
///
/// A unit is cached when any CSV file in `raw_dir` starts with its prefix,
/// whatever handle produced it. Candidates are sorted so the choice is
/// stable across runs.
pub fn find_cached_export(raw_dir: &Path, crop_tag: &str, metric: Metric, year: i32) -> Option<PathBuf> {
    let prefix = unit_prefix(crop_tag, metric, year);
    let mut matches: Vec<PathBuf> = std::fs::read_dir(raw_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.starts_with(&prefix) && name.ends_with(".csv"))
                    .unwrap_or(false)
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Every canonical export in `raw_dir`, sorted by filename
pub fn list_exports(raw_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut exports: Vec<PathBuf> = std::fs::read_dir(raw_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && ExportName::from_path(path).is_some())
        .collect();
    exports.sort();
    Ok(exports)
}

/// Components of a canonical cache filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportName {
    /// Sanitized crop tag
    pub crop_tag: String,
    /// Target metric
    pub metric: Metric,
    /// Survey year
    pub year: i32,
    /// Handle the export was downloaded with
    pub handle: String,
}

impl ExportName {
    /// Parse a bare filename; `None` unless it follows the cache convention
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".csv")?;
        let parts: Vec<&str> = stem.split(SEPARATOR).collect();
        let [crop_tag, metric, year, handle] = parts.as_slice() else {
            return None;
        };
        if crop_tag.is_empty() || handle.is_empty() {
            return None;
        }
        let metric = Metric::ALL.into_iter().find(|m| m.tag() == *metric)?;
        let year = year.parse().ok()?;

        Some(Self {
            crop_tag: crop_tag.to_string(),
            metric,
            year,
            handle: handle.to_string(),
        })
    }

    /// Parse the filename component of `path`
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name().and_then(|name| name.to_str()).and_then(Self::parse)
    }
}

/// Consolidated per-crop file, e.g. `us_corn_area_planted_county_all_years.csv`
pub fn consolidated_filename(crop_tag: &str, metric: Metric) -> String {
    format!(
        "us_{}_{}_county_all_years.csv",
        crop_tag.to_lowercase(),
        metric.consolidated_label()
    )
}

/// Single-table download, e.g. `us_major_crops_area_harvested.csv`
pub fn table_filename(metric: Metric) -> String {
    format!("us_major_crops_{}.csv", metric.consolidated_label())
}
