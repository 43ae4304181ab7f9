//! CSV record sink

use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{OutputError, OutputResult, RecordSink};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// Append-only CSV file
///
/// The file (and its parent directory) is created on the first non-empty append, so a
/// run that resolves nothing leaves nothing behind. Headers come from the record's
/// serde field names. Every append is flushed before returning.
pub struct CsvRecordSink<T> {
    path: PathBuf,
    writer: Option<Writer<BufWriter<File>>>,
    records_written: u64,
    _record: PhantomData<fn(&T)>,
}

impl<T> CsvRecordSink<T> {
    /// Sink writing to `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
            records_written: 0,
            _record: PhantomData,
        }
    }

    /// Target path, whether or not it exists yet
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> OutputResult<&mut Writer<BufWriter<File>>> {
        if self.writer.is_none() {
            info!("Creating CSV writer: path={}", self.path.display());

            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    OutputError::IoError(format!("Failed to create directory: {e}"))
                })?;
            }

            let file = File::create(&self.path)
                .map_err(|e| OutputError::IoError(format!("Failed to create file: {e}")))?;
            let buf_writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file);
            self.writer = Some(Writer::from_writer(buf_writer));
        }

        self.writer
            .as_mut()
            .ok_or_else(|| OutputError::IoError("CSV writer unavailable".to_string()))
    }
}

impl<T: Serialize> RecordSink<T> for CsvRecordSink<T> {
    fn append(&mut self, records: &[T]) -> OutputResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let writer = self.writer()?;
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| OutputError::CsvError(format!("Failed to write record: {e}")))?;
        }
        writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {e}")))?;

        self.records_written += records.len() as u64;
        debug!(
            appended = records.len(),
            total = self.records_written,
            "CSV records appended"
        );
        Ok(())
    }

    fn location(&self) -> Option<PathBuf> {
        self.writer.as_ref().map(|_| self.path.clone())
    }

    fn records_written(&self) -> u64 {
        self.records_written
    }
}
