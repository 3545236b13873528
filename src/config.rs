//! Directory provisioning and API key lookup
//!
//! These are the collaborators the harvesting engine consumes but does not
//! own: a raw/processed directory pair and a QuickStats API key string.

use std::path::PathBuf;
use tracing::{debug, info};

/// Environment variable holding the QuickStats API key
pub const API_KEY_ENV: &str = "USDA_NASS_API_KEY";

/// Key used when nothing is configured
pub const DEFAULT_API_KEY: &str = "DEMO_KEY";

/// Placeholder written by setup templates; treated as unset
const API_KEY_PLACEHOLDER: &str = "your_api_key_here";

/// Merged dataset filename inside the processed directory
pub const MERGED_FILENAME: &str = "us_major_crops_county_all_years_major_crops.csv";

/// County reference table filename inside the raw directory
pub const COUNTY_REFERENCE_FILENAME: &str = "county_centroids.csv";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Directory could not be created
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        /// Directory that failed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Raw and processed data directories under one root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirs {
    /// Root data directory (e.g. `data`)
    pub root: PathBuf,
    /// Raw export cache (`{root}/raw`)
    pub raw: PathBuf,
    /// Reconciled outputs (`{root}/processed`)
    pub processed: PathBuf,
}

impl DataDirs {
    /// Describe the layout under `root` without touching the filesystem
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        let root = root.into();
        Self {
            raw: root.join("raw"),
            processed: root.join("processed"),
            root,
        }
    }

    /// Create the raw and processed directories if missing
    pub fn provision<P: Into<PathBuf>>(root: P) -> Result<Self, ConfigError> {
        let dirs = Self::new(root);
        for dir in [&dirs.raw, &dirs.processed] {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        info!(root = %dirs.root.display(), "Data directories ready");
        Ok(dirs)
    }

    /// Default location of the merged dataset
    pub fn merged_output(&self) -> PathBuf {
        self.processed.join(MERGED_FILENAME)
    }

    /// Default location of the county reference table
    pub fn county_reference(&self) -> PathBuf {
        self.raw.join(COUNTY_REFERENCE_FILENAME)
    }
}

/// Resolve the QuickStats API key
///
/// Order: explicit value, then `USDA_NASS_API_KEY` (a `.env` file in the
/// working directory is loaded first), then [`DEFAULT_API_KEY`].
pub fn resolve_api_key(explicit: Option<&str>) -> String {
    if explicit.is_none() && dotenvy::dotenv().is_ok() {
        debug!("Loaded .env file");
    }
    select_api_key(explicit, std::env::var(API_KEY_ENV).ok())
}

fn select_api_key(explicit: Option<&str>, from_env: Option<String>) -> String {
    let usable = |key: &str| {
        let key = key.trim();
        !key.is_empty() && key != API_KEY_PLACEHOLDER
    };

    if let Some(key) = explicit.filter(|k| usable(k)) {
        return key.trim().to_string();
    }
    match from_env {
        Some(key) if usable(&key) => key.trim().to_string(),
        _ => DEFAULT_API_KEY.to_string(),
    }
}
