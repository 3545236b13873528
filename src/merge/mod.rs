//! Reconciliation of raw exports into the merged dataset
//!
//! Exports differ in column set, description wording and even in whether
//! they say which statistic they hold. [`merge`] loads them all as text,
//! classifies every row, coerces its value, and folds rows sharing a key
//! (State, State ANSI, County, County ANSI, Year, Crop) into one wide
//! [`MergedRecord`].
//!
//! Within a key, each metric keeps the first non-null value in input order:
//! files in the order given, rows in file order. When two exports disagree on
//! a non-null value the earlier one silently wins; [`MergeStats::conflicts`]
//! counts how often that happened so the loss is at least visible.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, info_span, warn};

use crate::output::{AtomicCsvWriter, OutputError};
use crate::Metric;

pub mod classify;
pub mod consolidate;
pub mod load;

pub use consolidate::{consolidate, ConsolidationReport};
pub use load::{load_export, ExportRow, RawExport, REQUIRED_COLUMNS};

/// Key columns of the merged dataset, in sort order
pub const KEY_COLUMNS: [&str; 6] = ["State", "State ANSI", "County", "County ANSI", "Year", "Crop"];

/// Audit column holding the number of contributing raw rows
pub const SOURCE_ROWS_COLUMN: &str = "SourceRowsCount";

/// Merge engine errors
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// No export could be loaded
    #[error("nothing to merge: none of the {attempted} exports could be loaded")]
    NothingToMerge {
        /// Exports offered
        attempted: usize,
    },

    /// An export could not be read
    #[error("cannot read {path}: {reason}")]
    Unreadable {
        /// Offending file
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// Writing the result failed
    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

/// Grouping key of the merged dataset
///
/// Field order is the output sort order. Only the crop is mandatory; rows
/// with other key parts missing are still grouped (with null in that part).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MergeKey {
    /// State name
    pub state: Option<String>,
    /// State FIPS code
    pub state_ansi: Option<String>,
    /// County name
    pub county: Option<String>,
    /// County FIPS code
    pub county_ansi: Option<String>,
    /// Survey year
    pub year: Option<i32>,
    /// Crop
    pub crop: String,
}

impl MergeKey {
    /// Key for a row, or `None` when no crop can be determined
    pub fn from_row(row: &ExportRow) -> Option<Self> {
        let crop = classify::determine_crop(row.commodity_desc.as_deref(), row.short_desc.as_deref())?;
        Some(Self {
            state: row.state.clone(),
            state_ansi: row.state_ansi.clone(),
            county: row.county.clone(),
            county_ansi: row.county_ansi.clone(),
            year: row.year.as_deref().and_then(|year| year.trim().parse().ok()),
            crop,
        })
    }
}

/// One reconciled row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRecord {
    /// Grouping key
    pub key: MergeKey,
    /// One value per metric, indexed by [`Metric::index`]
    pub values: [Option<Decimal>; 4],
    /// Raw rows that carried this key, classified or not
    pub source_rows: usize,
}

impl MergedRecord {
    fn new(key: MergeKey) -> Self {
        Self {
            key,
            values: [None; 4],
            source_rows: 0,
        }
    }

    /// Value for a metric
    pub fn value(&self, metric: Metric) -> Option<Decimal> {
        self.values[metric.index()]
    }
}

/// Counters describing one merge pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Exports read successfully
    pub files_loaded: usize,
    /// Exports skipped as unreadable
    pub files_skipped: usize,
    /// Raw rows read
    pub rows_loaded: usize,
    /// Rows dropped for lack of a crop
    pub rows_dropped: usize,
    /// Keyed rows no classification rule matched
    pub rows_unclassified: usize,
    /// Classified rows whose value was not numeric
    pub values_non_numeric: usize,
    /// Non-null values discarded because an earlier row already set the cell
    /// to something different
    pub conflicts: usize,
}

/// Result of [`merge`]
#[derive(Debug, Clone, Default)]
pub struct MergedDataset {
    /// Records sorted by key
    pub records: Vec<MergedRecord>,
    /// Merge counters
    pub stats: MergeStats,
}

impl MergedDataset {
    /// Write the dataset as CSV, atomically
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf, MergeError> {
        let mut writer = AtomicCsvWriter::create(path.as_ref())?;

        let mut header: Vec<&str> = KEY_COLUMNS.to_vec();
        header.extend(Metric::ALL.iter().map(|metric| metric.column()));
        header.push(SOURCE_ROWS_COLUMN);
        writer.write_header(&header)?;

        for record in &self.records {
            let key = &record.key;
            let mut row: Vec<String> = vec![
                key.state.clone().unwrap_or_default(),
                key.state_ansi.clone().unwrap_or_default(),
                key.county.clone().unwrap_or_default(),
                key.county_ansi.clone().unwrap_or_default(),
                key.year.map(|year| year.to_string()).unwrap_or_default(),
                key.crop.clone(),
            ];
            row.extend(
                record
                    .values
                    .iter()
                    .map(|value| value.map(|v| v.normalize().to_string()).unwrap_or_default()),
            );
            row.push(record.source_rows.to_string());
            writer.write_row(&row)?;
        }

        Ok(writer.commit()?)
    }
}

/// Merge exports in the order given
///
/// Unreadable exports are skipped with a warning. Fails only when no export
/// at all could be loaded.
pub fn merge<P: AsRef<Path>>(paths: &[P]) -> Result<MergedDataset, MergeError> {
    let _span = info_span!("merge", exports = paths.len()).entered();

    let mut stats = MergeStats::default();
    let mut groups: BTreeMap<MergeKey, MergedRecord> = BTreeMap::new();

    for path in paths {
        let export = match load_export(path.as_ref()) {
            Ok(export) => export,
            Err(e) => {
                warn!(error = %e, "Skipping export");
                stats.files_skipped += 1;
                continue;
            }
        };
        stats.files_loaded += 1;
        fold_export(&export, &mut groups, &mut stats);
    }

    if stats.files_loaded == 0 {
        return Err(MergeError::NothingToMerge {
            attempted: paths.len(),
        });
    }

    let records: Vec<MergedRecord> = groups.into_values().collect();
    crate::metrics::record_merge_rows(
        stats.rows_loaded as u64,
        stats.rows_unclassified as u64,
        stats.rows_dropped as u64,
        records.len() as u64,
    );
    if stats.conflicts > 0 {
        warn!(
            conflicts = stats.conflicts,
            "Conflicting values resolved by input order"
        );
    }
    info!(
        files = stats.files_loaded,
        skipped = stats.files_skipped,
        rows = stats.rows_loaded,
        records = records.len(),
        "Merge complete"
    );

    Ok(MergedDataset { records, stats })
}

/// Merge and write in one step
pub fn merge_to_file<P: AsRef<Path>>(paths: &[P], output: &Path) -> Result<MergedDataset, MergeError> {
    let dataset = merge(paths)?;
    dataset.write_csv(output)?;
    info!(path = %output.display(), rows = dataset.records.len(), "Saved merged dataset");
    Ok(dataset)
}

fn fold_export(export: &RawExport, groups: &mut BTreeMap<MergeKey, MergedRecord>, stats: &mut MergeStats) {
    let file_name = export.file_name();
    let explicit = classify::explicit_tag(file_name);

    for row in &export.rows {
        stats.rows_loaded += 1;

        let Some(key) = MergeKey::from_row(row) else {
            stats.rows_dropped += 1;
            continue;
        };
        let record = groups
            .entry(key)
            .or_insert_with_key(|key| MergedRecord::new(key.clone()));
        record.source_rows += 1;

        let Some(metric) = classify::classify(explicit, row.short_desc.as_deref(), file_name) else {
            stats.rows_unclassified += 1;
            continue;
        };
        let Some(value) = row.value.as_deref().and_then(classify::parse_value) else {
            stats.values_non_numeric += 1;
            continue;
        };

        match record.values[metric.index()] {
            None => record.values[metric.index()] = Some(value),
            Some(existing) if existing != value => stats.conflicts += 1,
            Some(_) => {}
        }
    }
}
