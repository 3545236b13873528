//! Parallel soil retrieval over the county reference

use indicatif::ProgressBar;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::aggregate::{aggregate_county, SoilAggregate};
use super::client::SoilDataSource;
use super::{CountyFips, SoilError};
use crate::downloader::config::{clamp_concurrency, DEFAULT_CONCURRENCY, DELAY_BETWEEN_REQUESTS};
use crate::downloader::{run_bounded, RequestPacer};
use crate::metrics::{self, UnitOutcome};
use crate::output::path::SOIL_AGGREGATES_FILENAME;
use crate::output::{AtomicCsvWriter, OutputResult};
use crate::shutdown::SharedShutdown;

/// Columns of the soil aggregates file
pub const SOIL_COLUMNS: [&str; 6] = ["State_FIPS", "County_FIPS", "AWC_avg", "Clay_avg", "pH_avg", "OM_avg"];

/// Summary of a soil run
#[derive(Debug, Default)]
pub struct SoilReport {
    /// Aggregates file, when at least one county produced data
    pub written: Option<PathBuf>,
    /// Counties scheduled
    pub total: usize,
    /// Counties with usable soil data
    pub aggregated: usize,
    /// Counties whose request failed or returned no weighted rows
    pub failed: Vec<CountyFips>,
    /// Whether shutdown cut the run short
    pub interrupted: bool,
}

impl SoilReport {
    /// One-line human summary
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Soil data for {} of {} counties, {} without data",
            self.aggregated,
            self.total,
            self.failed.len()
        );
        if self.interrupted {
            summary.push_str(" (interrupted)");
        }
        summary
    }
}

/// Fetches and aggregates soil data for a set of counties
pub struct SoilFetcher {
    source: Arc<dyn SoilDataSource>,
    raw_dir: PathBuf,
    concurrency: usize,
    request_delay: Duration,
    shutdown: Option<SharedShutdown>,
    progress: Option<ProgressBar>,
}

impl SoilFetcher {
    /// Fetcher writing into `raw_dir`
    pub fn new(source: Arc<dyn SoilDataSource>, raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
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

    /// Advance `bar` once per finished county
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Query every county and write the aggregates file
    pub async fn run(&self, counties: Vec<CountyFips>) -> Result<SoilReport, SoilError> {
        let mut pacer = RequestPacer::new(self.request_delay);
        if let Some(shutdown) = &self.shutdown {
            pacer = pacer.with_shutdown(shutdown.clone());
        }

        let mut report = SoilReport {
            total: counties.len(),
            ..SoilReport::default()
        };

        let collected = run_bounded(
            counties,
            self.concurrency,
            self.shutdown.as_deref(),
            self.progress.as_ref(),
            |county| {
                let pacer = &pacer;
                async move {
                    let outcome = self.source.surface_horizons(&county).await;
                    pacer.pause().await;
                    (county, outcome)
                }
            },
        )
        .await;
        report.interrupted = collected.interrupted;

        let mut aggregates = Vec::new();
        for (county, outcome) in collected.results {
            let aggregate = match outcome {
                Ok(rows) => {
                    debug!(%county, rows = rows.len(), "Soil rows received");
                    aggregate_county(county.clone(), &rows)
                }
                Err(e) => {
                    warn!(%county, error = %e, "Soil request failed");
                    None
                }
            };
            match aggregate {
                Some(aggregate) => {
                    metrics::record_unit("soil", None, UnitOutcome::Retrieved);
                    aggregates.push(aggregate);
                }
                None => {
                    metrics::record_unit("soil", None, UnitOutcome::Failed);
                    report.failed.push(county);
                }
            }
        }
        aggregates.sort_by(|a, b| a.county.cmp(&b.county));
        report.failed.sort();
        report.aggregated = aggregates.len();

        if aggregates.is_empty() {
            warn!("No soil data retrieved; aggregates not written");
        } else {
            let path = self.raw_dir.join(SOIL_AGGREGATES_FILENAME);
            write_aggregates(&path, &aggregates)?;
            info!(path = %path.display(), counties = aggregates.len(), "Saved soil aggregates");
            report.written = Some(path);
        }
        Ok(report)
    }
}

/// Write aggregates with the [`SOIL_COLUMNS`] header; missing averages are empty
pub fn write_aggregates(path: &Path, aggregates: &[SoilAggregate]) -> OutputResult<PathBuf> {
    let text = |value: Option<Decimal>| value.map(|v| v.to_string()).unwrap_or_default();

    let mut writer = AtomicCsvWriter::create(path)?;
    writer.write_header(SOIL_COLUMNS)?;
    for aggregate in aggregates {
        writer.write_row([
            aggregate.county.state.clone(),
            aggregate.county.county.clone(),
            text(aggregate.awc),
            text(aggregate.clay),
            text(aggregate.ph),
            text(aggregate.om),
        ])?;
    }
    writer.commit()
}
