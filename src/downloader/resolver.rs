//! Ranked candidate cascade against the encode endpoint

use std::sync::Arc;
use tracing::{debug, info};

use super::rate_limit::RequestPacer;
use super::FetchError;
use crate::quickstats::{candidate_descriptions, QueryParameters, QuickStatsApi, ResultHandle};
use crate::Metric;

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Position of the winning candidate in the ranked list
    pub rank: usize,
    /// Description that resolved
    pub description: String,
    /// Handle returned by the encoder
    pub handle: ResultHandle,
}

/// Turns (crop, metric, year) into a result handle
///
/// Candidates are tried strictly in rank order and the first usable handle
/// wins; nothing after it is requested. Empty or malformed handles and
/// transport failures (after the transport's own retries) are soft failures
/// that move on to the next candidate. The pacer runs after every attempt.
pub struct QueryResolver {
    api: Arc<dyn QuickStatsApi>,
    pacer: RequestPacer,
}

impl QueryResolver {
    /// Resolver with the default inter-request delay
    pub fn new(api: Arc<dyn QuickStatsApi>) -> Self {
        Self {
            api,
            pacer: RequestPacer::default(),
        }
    }

    /// Replace the pacer
    pub fn with_pacer(mut self, pacer: RequestPacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Resolve starting from the top-ranked candidate
    pub async fn resolve(&self, crop: &str, metric: Metric, year: i32) -> Result<Resolution, FetchError> {
        self.resolve_from(crop, metric, year, 0).await
    }

    /// Resolve starting at `start_rank`, skipping better-ranked candidates
    pub async fn resolve_from(
        &self,
        crop: &str,
        metric: Metric,
        year: i32,
        start_rank: usize,
    ) -> Result<Resolution, FetchError> {
        let candidates = candidate_descriptions(crop, metric);

        for (rank, description) in candidates.into_iter().enumerate().skip(start_rank) {
            let params = QueryParameters::for_candidate(crop, metric, &description, year);
            let outcome = self.api.encode_query(&params).await;
            self.pacer.pause().await;

            match outcome {
                Ok(body) => match ResultHandle::parse(&body) {
                    Some(handle) => {
                        info!(%crop, %metric, year, rank, %description, %handle, "Resolved query");
                        return Ok(Resolution {
                            rank,
                            description,
                            handle,
                        });
                    }
                    None => {
                        debug!(%crop, %metric, year, rank, %description, "Empty or malformed handle");
                    }
                },
                Err(e) => {
                    debug!(%crop, %metric, year, rank, %description, error = %e, "Candidate failed");
                }
            }
        }

        Err(FetchError::NotFound {
            crop: crop.to_string(),
            metric,
            year,
        })
    }
}
