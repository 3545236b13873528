//! Per-crop, per-metric consolidation of raw exports
//!
//! Gathers every `{CROP}__{metric}__*.csv` export into one
//! `us_{crop}_{label}_county_all_years.csv` file in the raw directory, the
//! layout downstream preprocessing reads. Columns are the union across
//! exports; exact duplicate rows are dropped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::MergeError;
use crate::output::path::{consolidated_filename, ExportName};
use crate::output::AtomicCsvWriter;
use crate::{sanitize_crop_name, Metric};

/// Outcome of a consolidation pass
#[derive(Debug, Default)]
pub struct ConsolidationReport {
    /// Files written
    pub written: Vec<PathBuf>,
    /// Crop × metric pairs with no usable export
    pub missing: Vec<(String, Metric)>,
}

struct Sheet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Consolidate every crop × metric pair found in `raw_dir`
pub fn consolidate<S: AsRef<str>>(
    raw_dir: &Path,
    crops: &[S],
    metrics: &[Metric],
) -> Result<ConsolidationReport, MergeError> {
    let exports = crate::output::path::list_exports(raw_dir).map_err(|e| MergeError::Unreadable {
        path: raw_dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut report = ConsolidationReport::default();
    for &metric in metrics {
        for crop in crops {
            let crop_tag = sanitize_crop_name(crop.as_ref());
            let sources: Vec<&PathBuf> = exports
                .iter()
                .filter(|path| {
                    ExportName::from_path(path)
                        .map(|name| name.crop_tag == crop_tag && name.metric == metric)
                        .unwrap_or(false)
                })
                .collect();

            let destination = raw_dir.join(consolidated_filename(&crop_tag, metric));
            match consolidate_files(&sources, &destination)? {
                Some(rows) => {
                    info!(%crop_tag, %metric, files = sources.len(), rows, "Consolidated");
                    report.written.push(destination);
                }
                None => {
                    warn!(%crop_tag, %metric, files = sources.len(), "No usable exports");
                    report.missing.push((crop_tag, metric));
                }
            }
        }
    }
    Ok(report)
}

/// Union `sources` into `destination`; `None` when none has data rows
pub fn consolidate_files<P: AsRef<Path>>(sources: &[P], destination: &Path) -> Result<Option<usize>, MergeError> {
    let mut sheets = Vec::new();
    for source in sources {
        match read_sheet(source.as_ref()) {
            Ok(sheet) if !sheet.rows.is_empty() => sheets.push(sheet),
            Ok(_) => {}
            Err(e) => warn!(path = %source.as_ref().display(), error = %e, "Skipping export"),
        }
    }
    if sheets.is_empty() {
        return Ok(None);
    }

    let mut columns: Vec<String> = Vec::new();
    for sheet in &sheets {
        for header in &sheet.headers {
            if !columns.contains(header) {
                columns.push(header.clone());
            }
        }
    }

    let mut writer = AtomicCsvWriter::create(destination)?;
    writer.write_header(&columns)?;

    let mut seen: HashSet<Vec<String>> = HashSet::new();
    for sheet in &sheets {
        let positions: Vec<Option<usize>> = columns
            .iter()
            .map(|column| sheet.headers.iter().position(|h| h == column))
            .collect();
        for row in &sheet.rows {
            let aligned: Vec<String> = positions
                .iter()
                .map(|position| {
                    position
                        .and_then(|index| row.get(index))
                        .cloned()
                        .unwrap_or_default()
                })
                .collect();
            if seen.insert(aligned.clone()) {
                writer.write_row(&aligned)?;
            }
        }
    }

    let rows = writer.rows_written() as usize;
    writer.commit()?;
    Ok(Some(rows))
}

fn read_sheet(path: &Path) -> Result<Sheet, MergeError> {
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

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| unreadable(e.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Sheet { headers, rows })
}
