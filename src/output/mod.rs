//! Record and item sinks
//!
//! - [`RecordSink`] receives resolved records once per page or batch (append-only)
//! - [`ItemSink`] stores per-token artifacts and is idempotent per key

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

pub mod csv;
pub mod files;

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Append-only destination for resolved records
pub trait RecordSink<T> {
    /// Persist `records` as one unit; an empty slice is a no-op
    fn append(&mut self, records: &[T]) -> OutputResult<()>;

    /// Where records were written, once anything has been written
    fn location(&self) -> Option<PathBuf>;

    /// Records persisted so far
    fn records_written(&self) -> u64;
}

/// In-memory sink, mostly useful for tests and library callers
impl<T: Clone> RecordSink<T> for Vec<T> {
    fn append(&mut self, records: &[T]) -> OutputResult<()> {
        self.extend_from_slice(records);
        Ok(())
    }

    fn location(&self) -> Option<PathBuf> {
        None
    }

    fn records_written(&self) -> u64 {
        self.len() as u64
    }
}

/// Kind of per-token artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Image bytes
    Image,
    /// Metadata JSON
    Metadata,
}

impl ArtifactKind {
    /// Short label used in per-item status lines
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "IMG",
            ArtifactKind::Metadata => "JSON",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of an idempotent write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Newly written
    Written,
    /// Destination already existed; nothing was written
    Cached,
}

/// Idempotent per-token artifact store
pub trait ItemSink: Send + Sync {
    /// Whether an artifact of `kind` already exists for `id`
    fn exists(&self, kind: ArtifactKind, id: u64) -> bool;

    /// Store image bytes for `id`
    fn write_binary(&self, id: u64, bytes: &[u8]) -> OutputResult<WriteOutcome>;

    /// Store a metadata document for `id`
    fn write_json(&self, id: u64, value: &Value) -> OutputResult<WriteOutcome>;

    /// Root directory of the store
    fn location(&self) -> PathBuf;
}

/// Filesystem-safe UTC timestamp, e.g. `2024-05-01T12-30-05-123Z`
pub fn file_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

/// Listing output filename: `me-rarity-<chain>-<collection>-<timestamp>.csv`
pub fn listing_filename(chain: &str, collection: &str, now: DateTime<Utc>) -> String {
    format!("me-rarity-{chain}-{collection}-{}.csv", file_timestamp(now))
}

/// Snapshot output filename: `sei_snapshot_<timestamp>.csv`
pub fn snapshot_filename(now: DateTime<Utc>) -> String {
    format!("sei_snapshot_{}.csv", file_timestamp(now))
}
