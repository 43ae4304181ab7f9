//! Acquisition orchestration, rate limiting and retry
//!
//! # Overview
//!
//! The engine composes four building blocks:
//!
//! 1. **Rate limiting**: one shared [`rate_limit::RateLimiter`] spaces every upstream call
//! 2. **Retry**: [`retry::RetryPolicy`] re-runs transient failures with exponential backoff
//! 3. **Batching**: [`scheduler::BatchScheduler`] drains bounded-concurrency batches in order
//! 4. **Pagination**: [`crate::fetcher::pagination::PaginationCursor`] walks a listing
//!
//! [`executor::AcquisitionEngine`] wires them into three modes: listing, snapshot and
//! download.
//!
//! # Quick Start
//!
//! ```no_run
//! use collection_downloader::downloader::{AcquisitionConfig, AcquisitionEngine};
//! use collection_downloader::fetcher::magic_eden::MagicEdenSource;
//! use collection_downloader::identifier::CollectionIdentifier;
//! use collection_downloader::output::csv::CsvRecordSink;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let collection = CollectionIdentifier::parse("ethereum:0xa6423b238f3936c3922b375f8ebf42005fecc40b")?;
//! let source = MagicEdenSource::new(collection);
//! let mut sink = CsvRecordSink::new("./output/listing.csv");
//!
//! let engine = AcquisitionEngine::new(AcquisitionConfig::default());
//! let summary = engine.run_listing(&source, &mut sink).await?;
//! println!("{} listings saved to {:?}", summary.item_count, summary.output_location);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Engine entry points return `Result<Summary, AcquisitionError>`:
//! - Transient upstream errors are retried and, if they persist, counted per item
//! - Absent items are skipped, not failed
//! - Configuration and capability errors abort before any work starts
//! - Records gathered before a fatal error are flushed to the sink first

use crate::fetcher::FetcherError;
use crate::output::OutputError;

pub mod config;
pub mod executor;
pub mod job;
pub mod progress;
pub mod rate_limit;
pub mod retry;
pub mod scheduler;

pub use config::AcquisitionConfig;
pub use executor::{
    AcquisitionEngine, AcquisitionMode, ArtifactStatus, DownloadOutcome, DownloadPlan, Summary,
};
pub use job::{AcquisitionResult, PageRequest};
pub use rate_limit::RateLimiter;
pub use retry::{RetryError, RetryPolicy};
pub use scheduler::{BatchReport, BatchScheduler};

/// Acquisition errors
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    /// Invalid settings or an unusable data source, detected before any work
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The upstream rejected the request itself (bad identifier or parameters)
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The first operation of a run exhausted its retries
    #[error("{operation} failed after {attempts} attempts, source unreachable: {source}")]
    Unreachable {
        /// Operation that failed
        operation: String,
        /// Attempts made
        attempts: u32,
        /// Last error
        source: FetcherError,
    },

    /// Non-retryable upstream failure
    #[error("{operation} failed: {source}")]
    Source {
        /// Operation that failed
        operation: String,
        /// Underlying error
        source: FetcherError,
    },

    /// Sink failure
    #[error("output error: {0}")]
    Output(#[from] OutputError),
}
