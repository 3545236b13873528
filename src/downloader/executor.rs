//! Parallel batch execution
//!
//! [`run_bounded`] is the shared fan-out: items are mapped to futures and
//! driven through `buffer_unordered`, and results are collected by the single
//! consuming loop as they complete. When shutdown is requested the loop stops
//! polling, in-flight futures are dropped, and whatever already finished is
//! returned. Dropping a download mid-write is safe because exports are
//! written through temp files that clean themselves up.

use futures::pin_mut;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, warn, Instrument};

use super::config::{clamp_concurrency, DEFAULT_CONCURRENCY, DELAY_BETWEEN_REQUESTS};
use super::job::{FetchUnit, UnitReport};
use super::rate_limit::RequestPacer;
use super::resolver::QueryResolver;
use super::retriever::Retriever;
use crate::metrics::{self, UnitOutcome};
use crate::output::path::{cache_filename, find_cached_export};
use crate::quickstats::QuickStatsApi;
use crate::shutdown::{SharedShutdown, ShutdownCoordinator};

/// Results gathered by [`run_bounded`]
#[derive(Debug)]
pub struct Collected<R> {
    /// Results in completion order
    pub results: Vec<R>,
    /// Whether shutdown cut the run short
    pub interrupted: bool,
}

/// Run `work` over `items` with at most `concurrency` in flight
///
/// No ordering guarantee. A single failing item never affects the others;
/// `work` is expected to turn its own failures into values.
pub async fn run_bounded<T, R, F, Fut>(
    items: Vec<T>,
    concurrency: usize,
    shutdown: Option<&ShutdownCoordinator>,
    progress: Option<&ProgressBar>,
    work: F,
) -> Collected<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    let mut results = Vec::with_capacity(items.len());
    let mut interrupted = false;

    let pending = stream::iter(items)
        .map(work)
        .buffer_unordered(clamp_concurrency(concurrency));
    pin_mut!(pending);

    loop {
        let next = match shutdown {
            Some(shutdown) => {
                tokio::select! {
                    biased;
                    _ = shutdown.wait_for_shutdown() => {
                        interrupted = true;
                        break;
                    }
                    next = pending.next() => next,
                }
            }
            None => pending.next().await,
        };

        match next {
            Some(result) => {
                results.push(result);
                if let Some(bar) = progress {
                    bar.inc(1);
                }
            }
            None => break,
        }
    }

    Collected {
        results,
        interrupted,
    }
}

/// Summary of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Exports available for the merge, cached or freshly downloaded
    pub retrieved: Vec<PathBuf>,
    /// Units scheduled
    pub total: usize,
    /// Units satisfied from the cache
    pub cache_hits: usize,
    /// Units downloaded in this run
    pub downloaded: usize,
    /// Units that exhausted their candidates
    pub failed: usize,
    /// The failed units themselves
    pub failed_units: Vec<FetchUnit>,
    /// Whether shutdown cut the run short
    pub interrupted: bool,
}

impl BatchReport {
    fn record(&mut self, report: UnitReport) {
        match report.outcome {
            UnitOutcome::CacheHit => self.cache_hits += 1,
            UnitOutcome::Retrieved => self.downloaded += 1,
            UnitOutcome::Failed => {
                self.failed += 1;
                self.failed_units.push(report.unit);
            }
        }
        if let Some(path) = report.path {
            self.retrieved.push(path);
        }
    }

    /// Units that completed in either direction
    pub fn completed(&self) -> usize {
        self.cache_hits + self.downloaded + self.failed
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} of {} units done: {} downloaded, {} cached, {} failed",
            self.completed(),
            self.total,
            self.downloaded,
            self.cache_hits,
            self.failed
        );
        if self.interrupted {
            summary.push_str(" (interrupted)");
        }
        summary
    }
}

/// Resolves and retrieves many units concurrently
pub struct BatchFetcher {
    api: Arc<dyn QuickStatsApi>,
    raw_dir: PathBuf,
    concurrency: usize,
    request_delay: Duration,
    shutdown: Option<SharedShutdown>,
    progress: Option<ProgressBar>,
}

impl BatchFetcher {
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

    /// Worker pool size, clamped to `1..=MAX_CONCURRENCY`
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = clamp_concurrency(concurrency);
        self
    }

    /// Pause after every encode attempt
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Stop scheduling when shutdown is requested
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Advance `bar` once per finished unit
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// Configured worker pool size
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetch every unit; per-unit failures are counted, never returned
    pub async fn run(&self, units: Vec<FetchUnit>) -> BatchReport {
        let total = units.len();
        info!(units = total, concurrency = self.concurrency, "Starting batch fetch");

        let mut pacer = RequestPacer::new(self.request_delay);
        if let Some(shutdown) = &self.shutdown {
            pacer = pacer.with_shutdown(shutdown.clone());
        }
        let resolver = QueryResolver::new(self.api.clone()).with_pacer(pacer);
        let retriever = Retriever::new(self.api.clone());

        let collected = run_bounded(
            units,
            self.concurrency,
            self.shutdown.as_deref(),
            self.progress.as_ref(),
            |unit| self.fetch_unit(&resolver, &retriever, unit),
        )
        .await;

        let mut report = BatchReport {
            total,
            interrupted: collected.interrupted,
            ..BatchReport::default()
        };
        for unit_report in collected.results {
            report.record(unit_report);
        }

        if report.interrupted {
            warn!("{}", report.summary());
        } else {
            info!("{}", report.summary());
        }
        report
    }

    async fn fetch_unit(
        &self,
        resolver: &QueryResolver,
        retriever: &Retriever,
        unit: FetchUnit,
    ) -> UnitReport {
        let span = info_span!("fetch_unit", crop = %unit.crop, metric = %unit.metric, year = unit.year);
        async move {
            let crop_tag = unit.crop_tag();
            if let Some(path) = find_cached_export(&self.raw_dir, &crop_tag, unit.metric, unit.year) {
                info!(path = %path.display(), "Cache hit");
                metrics::record_unit("export", Some(unit.metric), UnitOutcome::CacheHit);
                return UnitReport::cache_hit(unit, path);
            }

            let mut start_rank = 0;
            loop {
                let resolution = match resolver
                    .resolve_from(&unit.crop, unit.metric, unit.year, start_rank)
                    .await
                {
                    Ok(resolution) => resolution,
                    Err(e) => {
                        warn!(error = %e, "Unit failed");
                        metrics::record_unit("export", Some(unit.metric), UnitOutcome::Failed);
                        return UnitReport::failed(unit);
                    }
                };

                let destination = self.raw_dir.join(cache_filename(
                    &crop_tag,
                    unit.metric,
                    unit.year,
                    &resolution.handle,
                ));
                if retriever.retrieve(&resolution.handle, &destination).await {
                    metrics::record_unit("export", Some(unit.metric), UnitOutcome::Retrieved);
                    return UnitReport::retrieved(unit, destination, resolution.rank);
                }

                warn!(
                    rank = resolution.rank,
                    description = %resolution.description,
                    "Download failed, trying next candidate"
                );
                start_rank = resolution.rank + 1;
            }
        }
        .instrument(span)
        .await
    }
}
