//! Observability counters for harvesting runs
//!
//! Counters are recorded unconditionally through the `metrics` facade; they
//! are only exported when [`init_metrics`] has installed the Prometheus
//! recorder (the CLI does this when `--metrics-addr` is given). Without a
//! recorder every call is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::Metric;

static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Install the Prometheus exporter on `addr`
///
/// Idempotent: later calls are ignored once a recorder is installed.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "quickstats_requests_total",
        Unit::Count,
        "HTTP attempts against QuickStats and Soil Data Access, by endpoint and outcome"
    );
    describe_counter!(
        "quickstats_retries_total",
        Unit::Count,
        "Attempts that were followed by a retry"
    );
    describe_histogram!(
        "quickstats_request_duration_seconds",
        Unit::Seconds,
        "Duration of a single HTTP attempt"
    );
    describe_counter!(
        "fetch_units_total",
        Unit::Count,
        "Completed batch units, by kind and outcome"
    );
    describe_counter!(
        "merge_rows_total",
        Unit::Count,
        "Rows seen by the merge engine, by disposition"
    );

    *initialized = true;
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Timing for one HTTP attempt
pub struct RequestMetrics {
    endpoint: &'static str,
    start_time: Instant,
}

impl RequestMetrics {
    /// Start timing an attempt against `endpoint` (a short label, not a URL)
    pub fn start(endpoint: &'static str) -> Self {
        Self {
            endpoint,
            start_time: Instant::now(),
        }
    }

    /// Record the attempt's outcome (`ok`, a status code, or an error class)
    pub fn record(&self, outcome: impl Into<String>) {
        let outcome = outcome.into();
        counter!(
            "quickstats_requests_total",
            "endpoint" => self.endpoint,
            "outcome" => outcome.clone(),
        )
        .increment(1);
        histogram!(
            "quickstats_request_duration_seconds",
            "endpoint" => self.endpoint,
        )
        .record(self.start_time.elapsed().as_secs_f64());

        debug!(
            endpoint = self.endpoint,
            outcome = %outcome,
            duration_ms = self.start_time.elapsed().as_millis() as u64,
            "HTTP attempt finished"
        );
    }
}

/// Count a retry pause
pub fn record_retry_backoff(endpoint: &'static str, backoff: Duration) {
    counter!("quickstats_retries_total", "endpoint" => endpoint).increment(1);
    debug!(endpoint, backoff_ms = backoff.as_millis() as u64, "Retry backoff");
}

/// Outcome of one batch unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Export already on disk
    CacheHit,
    /// Resolved and downloaded
    Retrieved,
    /// Every candidate failed
    Failed,
}

impl UnitOutcome {
    fn label(&self) -> &'static str {
        match self {
            UnitOutcome::CacheHit => "cache_hit",
            UnitOutcome::Retrieved => "retrieved",
            UnitOutcome::Failed => "failed",
        }
    }
}

/// Count a finished unit of the given kind (`export`, `table`, `soil`)
pub fn record_unit(kind: &'static str, metric: Option<Metric>, outcome: UnitOutcome) {
    counter!(
        "fetch_units_total",
        "kind" => kind,
        "metric" => metric.map(|m| m.tag()).unwrap_or("none"),
        "outcome" => outcome.label(),
    )
    .increment(1);
}

/// Count the merge engine's row dispositions
pub fn record_merge_rows(loaded: u64, unclassified: u64, dropped: u64, merged: u64) {
    counter!("merge_rows_total", "disposition" => "loaded").increment(loaded);
    counter!("merge_rows_total", "disposition" => "unclassified").increment(unclassified);
    counter!("merge_rows_total", "disposition" => "dropped").increment(dropped);
    counter!("merge_rows_total", "disposition" => "merged").increment(merged);

    if dropped > 0 {
        warn!(dropped, "Rows without a determinable crop were dropped");
    }
}
