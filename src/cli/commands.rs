//! Command execution

use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{Cli, Commands, CliError, FetchArgs, MergeArgs, OutputFormat, SelectionArgs, SoilArgs, TableArgs};
use crate::config::{resolve_api_key, DataDirs};
use crate::downloader::config::RETRY_DELAY;
use crate::downloader::progress::unit_progress_bar;
use crate::downloader::{BatchFetcher, BatchReport, FetchUnit, TableFetcher};
use crate::merge::{consolidate, merge_to_file, MergedDataset};
use crate::output::path::list_exports;
use crate::output::OutputError;
use crate::quickstats::{QuickStatsHttpClient, RetryPolicy};
use crate::shutdown::SharedShutdown;
use crate::soil::{read_county_reference, SoilDataAccessClient, SoilFetcher};

/// Settings shared by every command, resolved from the global flags
struct RunContext {
    dirs: DataDirs,
    concurrency: usize,
    retry: RetryPolicy,
    request_delay: Duration,
    output_format: OutputFormat,
    shutdown: SharedShutdown,
}

impl RunContext {
    fn from_cli(cli: &Cli, shutdown: SharedShutdown) -> Result<Self, CliError> {
        Ok(Self {
            dirs: DataDirs::provision(&cli.data_dir)?,
            concurrency: cli.concurrency,
            retry: RetryPolicy::new(cli.max_retries, RETRY_DELAY),
            request_delay: Duration::from_millis(cli.request_delay_ms),
            output_format: cli.output_format,
            shutdown,
        })
    }

    fn quickstats(&self) -> Result<QuickStatsHttpClient, CliError> {
        Ok(QuickStatsHttpClient::shared()?.with_retry_policy(self.retry))
    }

    fn emit(&self, human: &str, json: serde_json::Value) {
        match self.output_format {
            OutputFormat::Human => println!("{human}"),
            OutputFormat::Json => println!("{json}"),
        }
    }
}

/// Run the parsed command line
pub async fn execute(cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
    if let Some(addr) = cli.metrics_addr {
        crate::metrics::init_metrics(addr)
            .await
            .map_err(|e| CliError::MetricsError(e.to_string()))?;
    }

    let ctx = RunContext::from_cli(cli, shutdown)?;
    match &cli.command {
        Commands::Fetch(args) => fetch(&ctx, args).await,
        Commands::Merge(args) => merge(&ctx, args),
        Commands::Consolidate(args) => consolidate_exports(&ctx, args),
        Commands::Table(args) => table(&ctx, cli.api_key.as_deref(), args).await,
        Commands::Soil(args) => soil(&ctx, args).await,
    }
}

async fn fetch(ctx: &RunContext, args: &FetchArgs) -> Result<(), CliError> {
    let crops = args.selection.crops();
    let units = FetchUnit::cross_product(&crops, &args.selection.metrics, args.years.range()?);
    info!(
        units = units.len(),
        crops = crops.len(),
        concurrency = ctx.concurrency,
        "Starting fetch"
    );

    let bar = unit_progress_bar(units.len() as u64, "Fetching county exports");
    let report = BatchFetcher::new(Arc::new(ctx.quickstats()?), &ctx.dirs.raw)
        .with_concurrency(ctx.concurrency)
        .with_request_delay(ctx.request_delay)
        .with_shutdown(ctx.shutdown.clone())
        .with_progress(bar.clone())
        .run(units)
        .await;
    bar.finish_and_clear();

    for unit in &report.failed_units {
        warn!(%unit, "No candidate description produced an export");
    }
    ctx.emit(
        &report.summary(),
        json!({
            "command": "fetch",
            "total": report.total,
            "downloaded": report.downloaded,
            "cached": report.cache_hits,
            "failed": report.failed,
            "failed_units": report.failed_units.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "interrupted": report.interrupted,
        }),
    );

    if !args.merge {
        return Ok(());
    }
    let output = ctx.dirs.merged_output();
    if let Some(dataset) = merge_retrieved(&report, &output)? {
        emit_merge(ctx, &dataset, output);
    }
    Ok(())
}

/// Merge what a batch retrieved into `output`
///
/// An interrupted batch still merges the exports that finished; only an
/// interrupted batch with nothing retrieved is skipped (`Ok(None)`). A
/// completed batch with nothing retrieved fails with `NothingToMerge`.
pub fn merge_retrieved(report: &BatchReport, output: &Path) -> Result<Option<MergedDataset>, CliError> {
    if report.interrupted {
        if report.retrieved.is_empty() {
            warn!("Fetch was interrupted before any export was retrieved; nothing to merge");
            return Ok(None);
        }
        warn!(
            exports = report.retrieved.len(),
            "Fetch was interrupted; merging the exports retrieved so far"
        );
    }
    Ok(Some(merge_to_file(&report.retrieved, output)?))
}

fn merge(ctx: &RunContext, args: &MergeArgs) -> Result<(), CliError> {
    let exports = list_exports(&ctx.dirs.raw)
        .map_err(|e| OutputError::IoError(format!("Failed to list {}: {e}", ctx.dirs.raw.display())))?;
    info!(exports = exports.len(), "Merging cached exports");

    let output = args.output.clone().unwrap_or_else(|| ctx.dirs.merged_output());
    let dataset = merge_to_file(&exports, &output)?;
    emit_merge(ctx, &dataset, output);
    Ok(())
}

fn emit_merge(ctx: &RunContext, dataset: &MergedDataset, output: PathBuf) {
    let stats = &dataset.stats;
    ctx.emit(
        &format!(
            "Merged {} rows from {} exports into {} ({} rows dropped, {} unclassified, {} conflicting values)",
            dataset.records.len(),
            stats.files_loaded,
            output.display(),
            stats.rows_dropped,
            stats.rows_unclassified,
            stats.conflicts
        ),
        json!({
            "command": "merge",
            "output": output.display().to_string(),
            "records": dataset.records.len(),
            "files_loaded": stats.files_loaded,
            "files_skipped": stats.files_skipped,
            "rows_loaded": stats.rows_loaded,
            "rows_dropped": stats.rows_dropped,
            "rows_unclassified": stats.rows_unclassified,
            "values_non_numeric": stats.values_non_numeric,
            "conflicts": stats.conflicts,
        }),
    );
}

fn consolidate_exports(ctx: &RunContext, args: &SelectionArgs) -> Result<(), CliError> {
    let report = consolidate(&ctx.dirs.raw, &args.crops(), &args.metrics)?;
    ctx.emit(
        &format!(
            "Consolidated {} files, {} crop/metric pairs without exports",
            report.written.len(),
            report.missing.len()
        ),
        json!({
            "command": "consolidate",
            "written": report.written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            "missing": report
                .missing
                .iter()
                .map(|(crop, metric)| format!("{crop} {metric}"))
                .collect::<Vec<_>>(),
        }),
    );
    Ok(())
}

async fn table(ctx: &RunContext, api_key: Option<&str>, args: &TableArgs) -> Result<(), CliError> {
    let crops = args.selection.crops();
    let metrics = &args.selection.metrics;
    let years = args.years.range()?;
    let api = ctx.quickstats()?.with_api_key(resolve_api_key(api_key));

    let bar = unit_progress_bar((crops.len() * metrics.len()) as u64, "Fetching tables");
    let report = TableFetcher::new(Arc::new(api), &ctx.dirs.raw)
        .with_concurrency(ctx.concurrency)
        .with_request_delay(ctx.request_delay)
        .with_shutdown(ctx.shutdown.clone())
        .with_progress(bar.clone())
        .run(&crops, metrics, *years.start(), *years.end())
        .await?;
    bar.finish_and_clear();

    ctx.emit(
        &format!(
            "Wrote {} tables with {} rows, {} requests failed{}",
            report.written.len(),
            report.rows,
            report.failed.len(),
            if report.interrupted { " (interrupted)" } else { "" }
        ),
        json!({
            "command": "table",
            "written": report.written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            "rows": report.rows,
            "failed": report
                .failed
                .iter()
                .map(|(crop, metric)| format!("{crop} {metric}"))
                .collect::<Vec<_>>(),
            "interrupted": report.interrupted,
        }),
    );
    Ok(())
}

async fn soil(ctx: &RunContext, args: &SoilArgs) -> Result<(), CliError> {
    let reference = args.reference.clone().unwrap_or_else(|| ctx.dirs.county_reference());
    let counties = read_county_reference(&reference)?;
    let client = SoilDataAccessClient::connect()?.with_retry_policy(ctx.retry);

    let bar = unit_progress_bar(counties.len() as u64, "Fetching soil data");
    let report = SoilFetcher::new(Arc::new(client), &ctx.dirs.raw)
        .with_concurrency(ctx.concurrency)
        .with_request_delay(ctx.request_delay)
        .with_shutdown(ctx.shutdown.clone())
        .with_progress(bar.clone())
        .run(counties)
        .await?;
    bar.finish_and_clear();

    ctx.emit(
        &report.summary(),
        json!({
            "command": "soil",
            "output": report.written.as_ref().map(|p| p.display().to_string()),
            "total": report.total,
            "aggregated": report.aggregated,
            "failed": report.failed.len(),
            "interrupted": report.interrupted,
        }),
    );
    Ok(())
}
