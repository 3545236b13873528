//! Graceful shutdown coordination.
//!
//! A [`ShutdownCoordinator`] is shared between the Ctrl+C listener and the
//! batch fetcher. Once shutdown is requested the fetcher stops scheduling
//! units and hands back whatever has already completed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

/// Handle passed to fetchers, pacers and the signal listener
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// One-way latch: once requested, stays requested
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    requested: AtomicBool,
    notify: Notify,
}

impl ShutdownCoordinator {
    /// Unrequested latch
    pub fn new() -> Self {
        Self::default()
    }

    /// Unrequested latch behind an [`Arc`]
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Flip the latch; only the first call wakes waiters
    pub fn request_shutdown(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether the latch has flipped
    pub fn is_shutdown_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolve once the latch flips, immediately if it already has
    pub async fn wait_for_shutdown(&self) {
        // Register interest before checking the flag so a request landing in
        // between cannot be missed.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if !self.requested.load(Ordering::SeqCst) {
            notified.await;
        }
    }

    /// Spawn a task that requests shutdown on the first Ctrl+C.
    pub fn listen_for_ctrl_c(self: &Arc<Self>) {
        let shutdown = Arc::clone(self);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    warn!("Interrupted; in-flight units finish, no new units start");
                    shutdown.request_shutdown();
                }
                Err(e) => warn!(error = %e, "Ctrl+C handler unavailable"),
            }
        });
    }
}
