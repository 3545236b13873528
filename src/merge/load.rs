//! Loading raw exports as untyped text
//!
//! Every field stays a string so codes like State ANSI `"01"` keep their
//! leading zeros. Required columns missing from an export read as null, and
//! the spreadsheet-style headers QuickStats uses in some exports are mapped
//! onto the API-style names.

use std::path::{Path, PathBuf};

use super::MergeError;

/// Columns every loaded row exposes, null-filled when absent
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "Year",
    "State",
    "State ANSI",
    "County",
    "County ANSI",
    "Value",
    "CV (%)",
    "short_desc",
    "commodity_desc",
    "Unit",
];

/// Accepted header spellings per required column, first match wins
const COLUMN_ALIASES: [(&str, &[&str]); 10] = [
    ("Year", &["Year", "year"]),
    ("State", &["State", "state_name"]),
    ("State ANSI", &["State ANSI", "state_ansi"]),
    ("County", &["County", "county_name"]),
    ("County ANSI", &["County ANSI", "county_ansi"]),
    ("Value", &["Value"]),
    ("CV (%)", &["CV (%)"]),
    ("short_desc", &["short_desc", "Data Item"]),
    ("commodity_desc", &["commodity_desc", "Commodity", "Crop"]),
    ("Unit", &["Unit", "unit_desc"]),
];

/// One raw row projected onto the required columns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportRow {
    /// Survey year as written
    pub year: Option<String>,
    /// State name
    pub state: Option<String>,
    /// State FIPS code
    pub state_ansi: Option<String>,
    /// County name
    pub county: Option<String>,
    /// County FIPS code
    pub county_ansi: Option<String>,
    /// Statistic value, possibly with thousands separators or a suppression code
    pub value: Option<String>,
    /// Coefficient of variation
    pub cv: Option<String>,
    /// Statistic description
    pub short_desc: Option<String>,
    /// Commodity
    pub commodity_desc: Option<String>,
    /// Unit of measure
    pub unit: Option<String>,
}

/// A loaded export
#[derive(Debug, Clone)]
pub struct RawExport {
    /// File the rows came from
    pub source: PathBuf,
    /// Rows in file order
    pub rows: Vec<ExportRow>,
}

impl RawExport {
    /// Bare filename of the source, empty when not representable
    pub fn file_name(&self) -> &str {
        self.source
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

/// Read an export; any IO or CSV error makes the whole file unreadable
pub fn load_export(path: &Path) -> Result<RawExport, MergeError> {
    let unreadable = |reason: String| MergeError::Unreadable {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| unreadable(e.to_string()))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| unreadable(e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(unreadable("missing header row".to_string()));
    }

    let positions: Vec<Option<usize>> = COLUMN_ALIASES
        .iter()
        .map(|(_, aliases)| {
            aliases
                .iter()
                .find_map(|alias| headers.iter().position(|h| h == alias))
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| unreadable(e.to_string()))?;
        let field = |column: usize| -> Option<String> {
            positions[column]
                .and_then(|index| record.get(index))
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        };
        rows.push(ExportRow {
            year: field(0),
            state: field(1),
            state_ansi: field(2),
            county: field(3),
            county_ansi: field(4),
            value: field(5),
            cv: field(6),
            short_desc: field(7),
            commodity_desc: field(8),
            unit: field(9),
        });
    }

    Ok(RawExport {
        source: path.to_path_buf(),
        rows,
    })
}
