//! Raw cache naming and CSV writers

use std::io::Write;
use std::path::Path;

pub mod csv;
pub mod path;

pub use self::csv::AtomicCsvWriter;
pub use path::{cache_filename, find_cached_export, ExportName};

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Temp file could not be moved into place
    #[error("failed to persist {path}: {reason}")]
    PersistError {
        /// Destination path
        path: String,
        /// Underlying failure
        reason: String,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

impl From<::csv::Error> for OutputError {
    fn from(err: ::csv::Error) -> Self {
        OutputError::CsvError(err.to_string())
    }
}

/// Write `bytes` to `path` atomically
///
/// The payload goes to a temp file in the destination directory, is synced,
/// then renamed over `path`. A failure at any step leaves `path` untouched and
/// the temp file is removed when dropped.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> OutputResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .map_err(|e| OutputError::IoError(format!("Failed to create {}: {e}", parent.display())))?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;
    temp_file
        .write_all(bytes)
        .map_err(|e| OutputError::IoError(format!("Failed to write temp file: {e}")))?;
    temp_file
        .flush()
        .map_err(|e| OutputError::IoError(format!("Failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;

    persist(temp_file, path)
}

/// Rename a synced temp file over `path` and fsync the directory
pub(crate) fn persist(temp_file: tempfile::NamedTempFile, path: &Path) -> OutputResult<()> {
    temp_file
        .persist(path)
        .map_err(|e| OutputError::PersistError {
            path: path.display().to_string(),
            reason: e.error.to_string(),
        })?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}
