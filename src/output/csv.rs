//! CSV writers that only publish complete files
//!
//! Rows are written into a temp file next to the destination; the file only
//! appears under its final name once [`AtomicCsvWriter::commit`] has flushed
//! and synced everything. Dropping the writer without committing discards it.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{persist, OutputError, OutputResult};

/// Buffered CSV writer targeting a temp file in the destination directory
pub struct AtomicCsvWriter {
    writer: csv::Writer<BufWriter<NamedTempFile>>,
    destination: PathBuf,
    rows_written: u64,
}

impl AtomicCsvWriter {
    /// Start a file that will be published at `destination`
    pub fn create<P: AsRef<Path>>(destination: P) -> OutputResult<Self> {
        let destination = destination.as_ref().to_path_buf();
        let parent = destination.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| {
            OutputError::IoError(format!("Failed to create {}: {e}", parent.display()))
        })?;

        let temp_file = NamedTempFile::new_in(parent)
            .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(temp_file));

        Ok(Self {
            writer,
            destination,
            rows_written: 0,
        })
    }

    /// Write the header row
    pub fn write_header<I, T>(&mut self, columns: I) -> OutputResult<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(columns)?;
        Ok(())
    }

    /// Write one data row
    pub fn write_row<I, T>(&mut self, fields: I) -> OutputResult<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(fields)?;
        self.rows_written += 1;
        Ok(())
    }

    /// Data rows written so far
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush, sync and move the file into place
    pub fn commit(mut self) -> OutputResult<PathBuf> {
        self.writer
            .flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush CSV writer: {e}")))?;
        let buffered = self
            .writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to finish CSV writer: {e}")))?;
        let mut temp_file = buffered
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to flush buffer: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;

        persist(temp_file, &self.destination)?;
        Ok(self.destination)
    }
}
