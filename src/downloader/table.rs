//! Single-table variant over the keyed JSON API
//!
//! Instead of one export per year, each crop × metric is one API request
//! covering the whole year range. All crops of a metric are concatenated into
//! `raw/us_major_crops_{label}.csv`.

use indicatif::ProgressBar;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::config::{clamp_concurrency, DEFAULT_CONCURRENCY, DELAY_BETWEEN_REQUESTS};
use super::executor::run_bounded;
use super::rate_limit::RequestPacer;
use super::FetchError;
use crate::metrics::{self, UnitOutcome};
use crate::output::path::table_filename;
use crate::output::{AtomicCsvWriter, OutputResult};
use crate::quickstats::{QueryParameters, QuickStatsApi, TableRecord};
use crate::shutdown::SharedShutdown;
use crate::Metric;

/// Summary of a table run
#[derive(Debug, Default)]
pub struct TableReport {
    /// Tables written, one per metric with data
    pub written: Vec<PathBuf>,
    /// Rows written across all tables
    pub rows: usize,
    /// Crop × metric requests that failed
    pub failed: Vec<(String, Metric)>,
    /// Whether shutdown cut the run short
    pub interrupted: bool,
}

/// Downloads whole-range tables per metric
pub struct TableFetcher {
    api: Arc<dyn QuickStatsApi>,
    raw_dir: PathBuf,
    concurrency: usize,
    request_delay: Duration,
    shutdown: Option<SharedShutdown>,
    progress: Option<ProgressBar>,
}

impl TableFetcher {
    /// Fetcher writing into `raw_dir`
    pub fn new(api: Arc<dyn QuickStatsApi>, raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            raw_dir: raw_dir.into(),
            concurrency: DEFAULT_CONCURRENCY,
            request_delay: DELAY_BETWEEN_REQUESTS,
            shutdown: None,
            progress: None,
        }
    }

    /// Worker pool size
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = clamp_concurrency(concurrency);
        self
    }

    /// Pause after every request
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Stop scheduling when shutdown is requested
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Advance `bar` once per finished request
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Fetch and write one table per metric
    pub async fn run(
        &self,
        crops: &[String],
        metrics: &[Metric],
        start_year: i32,
        end_year: i32,
    ) -> Result<TableReport, FetchError> {
        let mut pacer = RequestPacer::new(self.request_delay);
        if let Some(shutdown) = &self.shutdown {
            pacer = pacer.with_shutdown(shutdown.clone());
        }

        let mut report = TableReport::default();
        for &metric in metrics {
            let requests: Vec<(usize, &String)> = crops.iter().enumerate().collect();
            let mut collected = run_bounded(
                requests,
                self.concurrency,
                self.shutdown.as_deref(),
                self.progress.as_ref(),
                |(index, crop)| {
                    let pacer = &pacer;
                    async move {
                        let params = QueryParameters::for_table(crop, metric, start_year, end_year);
                        let outcome = self.api.fetch_table(&params).await;
                        pacer.pause().await;
                        (index, crop, outcome)
                    }
                },
            )
            .await;

            // Completion order is arbitrary; keep the crop order stable in the output.
            collected.results.sort_by_key(|(index, _, _)| *index);

            let mut records = Vec::new();
            for (_, crop, outcome) in collected.results {
                match outcome {
                    Ok(rows) => {
                        info!(%crop, %metric, records = rows.len(), "Retrieved table");
                        metrics::record_unit("table", Some(metric), UnitOutcome::Retrieved);
                        records.extend(rows);
                    }
                    Err(e) => {
                        warn!(%crop, %metric, error = %e, "Table request failed");
                        metrics::record_unit("table", Some(metric), UnitOutcome::Failed);
                        report.failed.push((crop.clone(), metric));
                    }
                }
            }

            if records.is_empty() {
                warn!(%metric, "No data returned; table not written");
            } else {
                let path = self.raw_dir.join(table_filename(metric));
                let rows = write_table(&path, &records)?;
                info!(path = %path.display(), rows, "Saved table");
                report.rows += rows;
                report.written.push(path);
            }

            if collected.interrupted {
                report.interrupted = true;
                break;
            }
        }
        Ok(report)
    }
}

/// Write API records as CSV with the union of their fields as columns
///
/// Columns appear in first-seen order; missing fields are empty. Thousands
/// separators are removed from `Value`.
pub fn write_table(path: &Path, records: &[TableRecord]) -> OutputResult<usize> {
    let mut columns: Vec<&str> = Vec::new();
    let mut seen = HashSet::new();
    for record in records {
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                columns.push(key.as_str());
            }
        }
    }

    let mut writer = AtomicCsvWriter::create(path)?;
    writer.write_header(&columns)?;
    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| {
                let text = record.get(*column).map(field_text).unwrap_or_default();
                if *column == "Value" {
                    text.replace(',', "")
                } else {
                    text
                }
            })
            .collect();
        writer.write_row(&row)?;
    }
    let rows = writer.rows_written() as usize;
    writer.commit()?;
    Ok(rows)
}

fn field_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
