//! Batch units and their outcomes

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::PathBuf;

use crate::metrics::UnitOutcome;
use crate::{sanitize_crop_name, Metric};

/// One crop × metric × year request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchUnit {
    /// Commodity as sent to QuickStats (e.g. "CORN")
    pub crop: String,
    /// Target statistic
    pub metric: Metric,
    /// Survey year
    pub year: i32,
}

impl FetchUnit {
    /// Create a unit
    pub fn new(crop: impl Into<String>, metric: Metric, year: i32) -> Self {
        Self {
            crop: crop.into(),
            metric,
            year,
        }
    }

    /// Every combination of crops, metrics and years
    ///
    /// Ordered crop-major, then metric, then year.
    pub fn cross_product<S: AsRef<str>>(
        crops: &[S],
        metrics: &[Metric],
        years: RangeInclusive<i32>,
    ) -> Vec<Self> {
        let mut units = Vec::with_capacity(
            crops.len() * metrics.len() * years.clone().count(),
        );
        for crop in crops {
            for &metric in metrics {
                for year in years.clone() {
                    units.push(Self::new(crop.as_ref(), metric, year));
                }
            }
        }
        units
    }

    /// Crop tag used in cache filenames
    pub fn crop_tag(&self) -> String {
        sanitize_crop_name(&self.crop)
    }
}

impl std::fmt::Display for FetchUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.crop, self.metric, self.year)
    }
}

/// What happened to one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    /// The unit
    pub unit: FetchUnit,
    /// Outcome class
    pub outcome: UnitOutcome,
    /// Export on disk, for cache hits and retrievals
    pub path: Option<PathBuf>,
    /// Rank of the winning candidate, for retrievals
    pub rank: Option<usize>,
}

impl UnitReport {
    /// Unit satisfied from the cache
    pub fn cache_hit(unit: FetchUnit, path: PathBuf) -> Self {
        Self {
            unit,
            outcome: UnitOutcome::CacheHit,
            path: Some(path),
            rank: None,
        }
    }

    /// Unit downloaded using the candidate at `rank`
    pub fn retrieved(unit: FetchUnit, path: PathBuf, rank: usize) -> Self {
        Self {
            unit,
            outcome: UnitOutcome::Retrieved,
            path: Some(path),
            rank: Some(rank),
        }
    }

    /// Unit that exhausted its candidates
    pub fn failed(unit: FetchUnit) -> Self {
        Self {
            unit,
            outcome: UnitOutcome::Failed,
            path: None,
            rank: None,
        }
    }
}
