//! Handle-to-file retrieval with an on-disk cache

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::output;
use crate::quickstats::{QuickStatsApi, ResultHandle};

/// Downloads spreadsheet exports into the raw cache
///
/// An existing destination is never re-downloaded. Downloads go through the
/// transport's retry policy; the file is written atomically and only once the
/// whole body has arrived, so a partial export never lands on disk.
pub struct Retriever {
    api: Arc<dyn QuickStatsApi>,
}

impl Retriever {
    /// Retriever over `api`
    pub fn new(api: Arc<dyn QuickStatsApi>) -> Self {
        Self { api }
    }

    /// Make `destination` hold the export behind `handle`
    ///
    /// Returns `false` when the download failed after all retries or the
    /// file could not be written.
    pub async fn retrieve(&self, handle: &ResultHandle, destination: &Path) -> bool {
        if destination.exists() {
            debug!(path = %destination.display(), "Export already cached");
            return true;
        }

        let body = match self.api.download_export(handle).await {
            Ok(body) => body,
            Err(e) => {
                warn!(%handle, error = %e, "Export download failed");
                return false;
            }
        };

        match output::write_atomic(destination, &body) {
            Ok(()) => {
                info!(path = %destination.display(), bytes = body.len(), "Saved export");
                true
            }
            Err(e) => {
                warn!(path = %destination.display(), error = %e, "Failed to write export");
                false
            }
        }
    }
}
