//! Per-county soil aggregates from NRCS Soil Data Access
//!
//! For every county in the reference table, the surface horizons of its soil
//! map units are pulled from Soil Data Access and reduced to
//! component-percentage weighted averages of available water capacity, clay,
//! pH and organic matter. The results land in `raw/county_soil_aggregates.csv`
//! next to the crop exports.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::output::OutputError;
use crate::quickstats::QuickStatsError;

pub mod aggregate;
pub mod batch;
pub mod client;

pub use aggregate::{aggregate_county, HorizonRow, SoilAggregate};
pub use batch::{write_aggregates, SoilFetcher, SoilReport};
pub use client::{surface_horizon_query, SoilDataAccessClient, SoilDataSource, SDA_URL};

/// Soil variant errors
#[derive(Debug, thiserror::Error)]
pub enum SoilError {
    /// County reference table could not be read
    #[error("failed to read county reference {path}: {reason}")]
    Reference {
        /// Reference file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// County reference table lacks a required column
    #[error("county reference {path} has no {column} column")]
    MissingColumn {
        /// Reference file
        path: PathBuf,
        /// Missing column name
        column: &'static str,
    },

    /// Transport failure talking to Soil Data Access
    #[error("soil data request failed: {0}")]
    Request(#[from] QuickStatsError),

    /// Soil Data Access answered with something other than a table
    #[error("unexpected soil data response: {0}")]
    Parse(String),

    /// Writing the aggregates failed
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Zero-padded state and county FIPS codes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CountyFips {
    /// Two-digit state code
    pub state: String,
    /// Three-digit county code
    pub county: String,
}

impl CountyFips {
    /// Normalize raw codes; `None` unless both are short digit strings
    ///
    /// ```
    /// use county_crop_harvester::soil::CountyFips;
    ///
    /// let story = CountyFips::new("19", "169").unwrap();
    /// assert_eq!(CountyFips::new("19", "169.0"), Some(story.clone()));
    /// assert_eq!(CountyFips::new("1", "1").unwrap().areasymbol(), "US01001");
    /// assert_eq!(CountyFips::new("IA", "169"), None);
    /// ```
    pub fn new(state: &str, county: &str) -> Option<Self> {
        Some(Self {
            state: pad_code(state, 2)?,
            county: pad_code(county, 3)?,
        })
    }

    /// Survey area symbol used by Soil Data Access
    pub fn areasymbol(&self) -> String {
        format!("US{}{}", self.state, self.county)
    }
}

impl std::fmt::Display for CountyFips {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.state, self.county)
    }
}

fn pad_code(raw: &str, width: usize) -> Option<String> {
    let trimmed = raw.trim();
    // Spreadsheet round-trips turn integer codes into floats.
    let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > width || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{digits:0>width$}"))
}

/// Read the county reference table
///
/// Needs `State_FIPS` and `County_FIPS` columns. Codes are zero-padded,
/// duplicates removed and the result sorted; rows with unusable codes are
/// skipped with a warning.
pub fn read_county_reference(path: &Path) -> Result<Vec<CountyFips>, SoilError> {
    let unreadable = |reason: String| SoilError::Reference {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::Reader::from_path(path).map_err(|e| unreadable(e.to_string()))?;
    let headers = reader.headers().map_err(|e| unreadable(e.to_string()))?.clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
            .ok_or_else(|| SoilError::MissingColumn {
                path: path.to_path_buf(),
                column: name,
            })
    };
    let state_index = column("State_FIPS")?;
    let county_index = column("County_FIPS")?;

    let mut counties = BTreeSet::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record.map_err(|e| unreadable(e.to_string()))?;
        let state = record.get(state_index).unwrap_or_default();
        let county = record.get(county_index).unwrap_or_default();
        match CountyFips::new(state, county) {
            Some(fips) => {
                counties.insert(fips);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, "Skipped rows with unusable FIPS codes");
    }
    info!(path = %path.display(), counties = counties.len(), "Loaded county reference");
    Ok(counties.into_iter().collect())
}
