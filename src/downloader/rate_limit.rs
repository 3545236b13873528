//! Fixed-delay request pacing
//!
//! QuickStats publishes no rate limit; it silently degrades (empty handles,
//! HTML error pages) when hit too quickly. Every encode attempt is therefore
//! followed by a fixed pause. The pause ends early on shutdown so Ctrl+C is
//! not held up by a sleeping worker.

use std::time::Duration;
use tokio::time::sleep;

use super::config::DELAY_BETWEEN_REQUESTS;
use crate::shutdown::SharedShutdown;

/// Fixed pause between requests, shared by one worker's attempts
#[derive(Debug, Clone)]
pub struct RequestPacer {
    delay: Duration,
    shutdown: Option<SharedShutdown>,
}

impl RequestPacer {
    /// Pacer with the given delay
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            shutdown: None,
        }
    }

    /// Pacer that never waits
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Cut pauses short when shutdown is requested
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Configured delay
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait out the delay
    pub async fn pause(&self) {
        if self.delay.is_zero() {
            return;
        }
        match &self.shutdown {
            Some(shutdown) => {
                tokio::select! {
                    _ = sleep(self.delay) => {}
                    _ = shutdown.wait_for_shutdown() => {}
                }
            }
            None => sleep(self.delay).await,
        }
    }
}

impl Default for RequestPacer {
    fn default() -> Self {
        Self::new(DELAY_BETWEEN_REQUESTS)
    }
}
