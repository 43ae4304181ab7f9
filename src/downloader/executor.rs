//! Acquisition engine
//!
//! Composes the rate limiter, retry policy, pagination cursor, strategy probe and
//! batch scheduler into three modes:
//!
//! - **listing**: walk a cursor-paginated listing, flush once at the end
//! - **snapshot**: probe the contract, then enumerate `[0, totalSupply)` in batches,
//!   flushing after every batch
//! - **download**: mirror per-token artifacts for an id range in batches, skipping
//!   anything already on disk
//!
//! Every upstream call acquires the shared limiter first, inside each retry attempt.

use futures_util::StreamExt;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::config::AcquisitionConfig;
use super::job::{AcquisitionResult, OutcomeTag};
use super::progress::{ProgressCallback, ProgressEvent};
use super::rate_limit::RateLimiter;
use super::retry::{RetryError, RetryPolicy};
use super::scheduler::{BatchReport, BatchScheduler};
use super::AcquisitionError;
use crate::fetcher::pagination::PaginationCursor;
use crate::fetcher::retry_formatter::{RetryContext, RetryErrorType};
use crate::fetcher::strategy::StrategyProbe;
use crate::fetcher::{
    EnumerableSource, ErrorKind, FetcherError, FetcherResult, ItemSource, ListingSource,
};
use crate::metrics::AcquisitionMetrics;
use crate::output::{ArtifactKind, ItemSink, RecordSink, WriteOutcome};
use crate::shutdown::{self, SharedShutdown};
use crate::{EnumerationStrategy, OwnershipRecord, TokenId};

/// Acquisition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    /// Cursor-paginated marketplace listing
    Listing,
    /// Contract ownership enumeration
    Snapshot,
    /// Per-token artifact mirroring
    Download,
}

impl AcquisitionMode {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionMode::Listing => "listing",
            AcquisitionMode::Snapshot => "snapshot",
            AcquisitionMode::Download => "download",
        }
    }
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Mode that produced this summary
    pub mode: AcquisitionMode,
    /// Items expected (snapshot, download) or records gathered (listing)
    pub total: u64,
    /// Records or items acquired
    pub item_count: u64,
    /// Items skipped (absent upstream or already cached)
    pub skipped_count: u64,
    /// Items or pages that failed
    pub error_count: u64,
    /// Listing pages requested
    pub pages_fetched: u64,
    /// Strategy used by a snapshot
    pub strategy: Option<EnumerationStrategy>,
    /// Where results were written
    pub output_location: Option<PathBuf>,
    /// Whether the run stopped early on a shutdown request
    pub interrupted: bool,
}

impl Summary {
    fn new(mode: AcquisitionMode, total: u64) -> Self {
        Self {
            mode,
            total,
            item_count: 0,
            skipped_count: 0,
            error_count: 0,
            pages_fetched: 0,
            strategy: None,
            output_location: None,
            interrupted: false,
        }
    }

    /// Items resolved in any way
    pub fn completed(&self) -> u64 {
        self.item_count + self.skipped_count + self.error_count
    }

    fn absorb<T>(&mut self, report: &BatchReport<T>) {
        self.item_count += report.records.len() as u64;
        self.skipped_count += report.skipped.len() as u64;
        self.error_count += report.failed.len() as u64;
    }
}

/// Id range and artifact kinds for a download run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    /// First id (inclusive)
    pub start_id: u64,
    /// Last id (inclusive)
    pub end_id: u64,
    /// Artifacts to fetch per id
    pub kinds: Vec<ArtifactKind>,
}

impl DownloadPlan {
    /// Plan for `start_id..=end_id`
    pub fn new(start_id: u64, end_id: u64, kinds: Vec<ArtifactKind>) -> Self {
        Self {
            start_id,
            end_id,
            kinds,
        }
    }

    /// Number of ids in the range, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.span().unwrap_or(u64::MAX)
    }

    fn span(&self) -> Option<u64> {
        self.end_id.checked_sub(self.start_id)?.checked_add(1)
    }

    /// Reject inverted or uncountable ranges and empty kind lists
    pub fn validate(&self) -> Result<(), AcquisitionError> {
        if self.start_id > self.end_id {
            return Err(AcquisitionError::Configuration(format!(
                "start id {} is greater than end id {}",
                self.start_id, self.end_id
            )));
        }
        if self.span().is_none() {
            return Err(AcquisitionError::Configuration(format!(
                "id range {}..={} holds more than {} ids",
                self.start_id,
                self.end_id,
                u64::MAX
            )));
        }
        if self.kinds.is_empty() {
            return Err(AcquisitionError::Configuration(
                "nothing to download: enable images and/or metadata".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-artifact result in download mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// Fetched and written
    Written,
    /// Already on disk; no request made
    Cached,
    /// Not found upstream
    Absent,
    /// Fetch or write failed
    Failed,
}

impl ArtifactStatus {
    /// Status tag for log lines
    pub fn tag(&self) -> OutcomeTag {
        match self {
            ArtifactStatus::Written => OutcomeTag::Ok,
            ArtifactStatus::Cached | ArtifactStatus::Absent => OutcomeTag::Skip,
            ArtifactStatus::Failed => OutcomeTag::Err,
        }
    }
}

/// Artifacts processed for one id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Token id
    pub id: u64,
    /// Status per artifact kind
    pub artifacts: Vec<(ArtifactKind, ArtifactStatus)>,
}

impl DownloadOutcome {
    /// e.g. `[IMG:OK] [JSON:SKIP]`
    pub fn status_line(&self) -> String {
        self.artifacts
            .iter()
            .map(|(kind, status)| format!("[{kind}:{}]", status.tag()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn all_in(&self, wanted: &[ArtifactStatus]) -> bool {
        self.artifacts
            .iter()
            .all(|(_, status)| wanted.contains(status))
    }
}

/// Composition root for every acquisition mode
pub struct AcquisitionEngine {
    config: AcquisitionConfig,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    shutdown: Option<SharedShutdown>,
    progress: Option<ProgressCallback>,
}

impl AcquisitionEngine {
    /// Engine with its own limiter derived from `config`
    pub fn new(config: AcquisitionConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.request_interval()));
        let retry = RetryPolicy::from_config(&config);
        Self {
            config,
            limiter,
            retry,
            shutdown: shutdown::get_global_shutdown(),
            progress: None,
        }
    }

    /// Share a limiter with other engines targeting the same upstream
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Observe page and batch boundaries
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Limiter used for every upstream call
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Walk a listing to exhaustion and flush every record to `sink` once
    ///
    /// A 404, or a 400 after the first page, ends the walk and keeps what was gathered.
    /// Retry exhaustion on the first page aborts; on a later page it is counted as one
    /// error and the partial listing is kept. Any other failure aborts after flushing.
    pub async fn run_listing<S, K>(&self, source: &S, sink: &mut K) -> Result<Summary, AcquisitionError>
    where
        S: ListingSource + ?Sized,
        K: RecordSink<S::Item> + ?Sized,
    {
        let span = info_span!("listing", page_size = self.config.page_size);
        self.listing_inner(source, sink).instrument(span).await
    }

    /// Snapshot token ownership of an enumerable contract into `sink`
    pub async fn run_snapshot<S, K>(&self, source: &S, sink: &mut K) -> Result<Summary, AcquisitionError>
    where
        S: EnumerableSource + ?Sized,
        K: RecordSink<OwnershipRecord> + ?Sized,
    {
        let span = info_span!("snapshot", batch_size = self.config.batch_size);
        self.snapshot_inner(source, sink).instrument(span).await
    }

    /// Mirror artifacts for every id in `plan` into `sink`
    pub async fn run_download<S, K>(
        &self,
        source: &S,
        sink: &K,
        plan: &DownloadPlan,
    ) -> Result<Summary, AcquisitionError>
    where
        S: ItemSource + ?Sized,
        K: ItemSink + ?Sized,
    {
        let span = info_span!(
            "download",
            start_id = plan.start_id,
            end_id = plan.end_id,
            batch_size = self.config.batch_size
        );
        self.download_inner(source, sink, plan).instrument(span).await
    }

    async fn listing_inner<S, K>(&self, source: &S, sink: &mut K) -> Result<Summary, AcquisitionError>
    where
        S: ListingSource + ?Sized,
        K: RecordSink<S::Item> + ?Sized,
    {
        self.config.validate()?;
        let metrics = AcquisitionMetrics::start(AcquisitionMode::Listing.as_str());
        info!(
            rate_limit = self.config.rate_limit_per_minute,
            interval_ms = self.limiter.interval().as_millis() as u64,
            "Starting listing acquisition"
        );

        let mut cursor = PaginationCursor::new(source, &self.limiter, self.retry, self.config.page_size);
        let mut accumulated: Vec<S::Item> = Vec::new();
        let mut summary = Summary::new(AcquisitionMode::Listing, 0);
        let mut fatal: Option<AcquisitionError> = None;

        loop {
            if self.shutdown_requested() {
                info!(records = accumulated.len(), "Shutdown requested, stopping pagination");
                summary.interrupted = true;
                break;
            }

            let page = match cursor.next_page().await {
                None => break,
                Some(Ok(page)) => page,
                Some(Err(err)) => {
                    let number = cursor.pages_fetched();
                    let operation = format!("page {number}");
                    match (err.error().kind(), err.is_exhausted()) {
                        (ErrorKind::NotFoundOrAbsent, _) if number == 1 => {
                            warn!(error = %err, "Collection not found or no assets available");
                        }
                        (ErrorKind::NotFoundOrAbsent, _) | (ErrorKind::MalformedRequest, _)
                            if number > 1 =>
                        {
                            warn!(
                                page = number,
                                records = accumulated.len(),
                                error = %err,
                                "Reached end of collection or API limit, keeping partial results"
                            );
                        }
                        (_, true) if number > 1 => {
                            self.log_exhausted(&operation, &err);
                            summary.error_count += 1;
                        }
                        _ => fatal = Some(self.fatal_error(&operation, err)),
                    }
                    break;
                }
            };

            let items = page.items.len();
            accumulated.extend(page.items);
            info!(
                page = cursor.pages_fetched(),
                items = items,
                total = accumulated.len(),
                "Fetched listing page"
            );
            self.emit(ProgressEvent::Page {
                number: cursor.pages_fetched(),
                items,
                accumulated: accumulated.len(),
            });
        }

        summary.pages_fetched = cursor.pages_fetched();
        summary.item_count = accumulated.len() as u64;
        summary.total = summary.item_count;

        if let Err(e) = sink.append(&accumulated) {
            metrics.record_failure(&e.to_string());
            return Err(e.into());
        }
        summary.output_location = sink.location();
        metrics.record_items(summary.item_count, 0, summary.error_count);

        if let Some(err) = fatal {
            metrics.record_failure(&err.to_string());
            return Err(err);
        }

        info!(
            records = summary.item_count,
            pages = summary.pages_fetched,
            "Completed fetching listing"
        );
        metrics.record_success(summary.item_count, summary.error_count);
        Ok(summary)
    }

    async fn snapshot_inner<S, K>(&self, source: &S, sink: &mut K) -> Result<Summary, AcquisitionError>
    where
        S: EnumerableSource + ?Sized,
        K: RecordSink<OwnershipRecord> + ?Sized,
    {
        self.config.validate()?;
        let metrics = AcquisitionMetrics::start(AcquisitionMode::Snapshot.as_str());

        let total = match self.call("totalSupply", || source.total_supply()).await {
            Ok(total) => total,
            Err(err) => {
                let err = self.fatal_error("totalSupply", err);
                metrics.record_failure(&err.to_string());
                return Err(err);
            }
        };
        info!(total_supply = total, "Total supply fetched");

        let mut summary = Summary::new(AcquisitionMode::Snapshot, total);
        if total == 0 {
            info!("Collection is empty, nothing to snapshot");
            metrics.record_success(0, 0);
            return Ok(summary);
        }

        let strategy = StrategyProbe::detect(source, &self.limiter).await;
        if strategy == EnumerationStrategy::Unknown {
            let err = AcquisitionError::Configuration(
                "could not determine how to enumerate tokens: tokenByIndex(0) and ownerOf(1) both failed"
                    .to_string(),
            );
            metrics.record_failure(&err.to_string());
            return Err(err);
        }
        summary.strategy = Some(strategy);
        info!(strategy = %strategy, "Enumeration strategy selected");

        let reports = self
            .scheduler()
            .run(total, |index| self.resolve_owner(source, strategy, index));
        let mut reports = pin!(reports);

        while let Some(report) = reports.next().await {
            if let Err(e) = sink.append(&report.records) {
                metrics.record_failure(&e.to_string());
                return Err(e.into());
            }
            for (index, reason) in &report.skipped {
                warn!(index = index, reason = %reason, "Token skipped (missing or burned?)");
            }
            self.finish_batch(&mut summary, &report, &metrics);
        }

        summary.output_location = sink.location();
        self.finish_enumeration(&mut summary, &metrics);
        Ok(summary)
    }

    async fn download_inner<S, K>(
        &self,
        source: &S,
        sink: &K,
        plan: &DownloadPlan,
    ) -> Result<Summary, AcquisitionError>
    where
        S: ItemSource + ?Sized,
        K: ItemSink + ?Sized,
    {
        self.config.validate()?;
        plan.validate()?;
        let metrics = AcquisitionMetrics::start(AcquisitionMode::Download.as_str());

        let total = plan.total();
        info!(
            total = total,
            kinds = ?plan.kinds,
            destination = %sink.location().display(),
            "Starting download"
        );

        let mut summary = Summary::new(AcquisitionMode::Download, total);
        let reports = self.scheduler().run(total, |index| {
            self.download_item(source, sink, &plan.kinds, plan.start_id + index)
        });
        let mut reports = pin!(reports);

        while let Some(report) = reports.next().await {
            self.finish_batch(&mut summary, &report, &metrics);
        }

        summary.output_location = Some(sink.location());
        self.finish_enumeration(&mut summary, &metrics);
        Ok(summary)
    }

    async fn resolve_owner<S>(
        &self,
        source: &S,
        strategy: EnumerationStrategy,
        index: u64,
    ) -> AcquisitionResult<OwnershipRecord>
    where
        S: EnumerableSource + ?Sized,
    {
        let token_id = match strategy {
            EnumerationStrategy::Indexed => {
                let operation = format!("tokenByIndex({index})");
                match self.call(&operation, || source.token_by_index(index)).await {
                    Ok(token_id) => token_id,
                    Err(err) => return item_outcome(err),
                }
            }
            EnumerationStrategy::Sequential => TokenId::from(index + 1),
            EnumerationStrategy::Unknown => {
                return AcquisitionResult::Failed("no enumeration strategy".to_string())
            }
        };

        let operation = format!("ownerOf({token_id})");
        match self.call(&operation, || source.owner_of(&token_id)).await {
            Ok(owner) => AcquisitionResult::Success(OwnershipRecord {
                index,
                token_id,
                owner: owner.to_lowercase(),
            }),
            Err(err) => item_outcome(err),
        }
    }

    async fn download_item<S, K>(
        &self,
        source: &S,
        sink: &K,
        kinds: &[ArtifactKind],
        id: u64,
    ) -> AcquisitionResult<DownloadOutcome>
    where
        S: ItemSource + ?Sized,
        K: ItemSink + ?Sized,
    {
        let mut outcome = DownloadOutcome {
            id,
            artifacts: Vec::with_capacity(kinds.len()),
        };
        let mut errors = Vec::new();

        for &kind in kinds {
            let status = if sink.exists(kind, id) {
                ArtifactStatus::Cached
            } else {
                match self.fetch_artifact(source, sink, kind, id).await {
                    Ok(status) => status,
                    Err(message) => {
                        errors.push(format!("{kind}: {message}"));
                        ArtifactStatus::Failed
                    }
                }
            };
            outcome.artifacts.push((kind, status));
        }

        debug!(id = id, status = %outcome.status_line(), "Item processed");

        if !errors.is_empty() {
            AcquisitionResult::Failed(format!("{} {}", outcome.status_line(), errors.join("; ")))
        } else if outcome.all_in(&[ArtifactStatus::Cached]) {
            AcquisitionResult::Skipped("cached".to_string())
        } else if outcome.all_in(&[ArtifactStatus::Cached, ArtifactStatus::Absent]) {
            AcquisitionResult::Skipped("absent".to_string())
        } else {
            AcquisitionResult::Success(outcome)
        }
    }

    async fn fetch_artifact<S, K>(
        &self,
        source: &S,
        sink: &K,
        kind: ArtifactKind,
        id: u64,
    ) -> Result<ArtifactStatus, String>
    where
        S: ItemSource + ?Sized,
        K: ItemSink + ?Sized,
    {
        let written = match kind {
            ArtifactKind::Image => {
                let operation = format!("image {id}");
                match self.call(&operation, || source.fetch_image(id)).await {
                    Ok(bytes) => sink.write_binary(id, &bytes),
                    Err(err) => return artifact_failure(err),
                }
            }
            ArtifactKind::Metadata => {
                let operation = format!("metadata {id}");
                match self.call(&operation, || source.fetch_metadata(id)).await {
                    Ok(value) => sink.write_json(id, &value),
                    Err(err) => return artifact_failure(err),
                }
            }
        };

        match written {
            Ok(WriteOutcome::Written) => Ok(ArtifactStatus::Written),
            Ok(WriteOutcome::Cached) => Ok(ArtifactStatus::Cached),
            Err(e) => Err(e.to_string()),
        }
    }

    /// One logical upstream call: limiter grant plus request, retried as a unit
    async fn call<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, RetryError<FetcherError>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = FetcherResult<T>>,
    {
        let limiter = &self.limiter;
        self.retry
            .execute(
                operation,
                move || {
                    let attempt = op();
                    async move {
                        limiter.acquire().await;
                        attempt.await
                    }
                },
                FetcherError::is_retryable,
            )
            .await
    }

    fn scheduler(&self) -> BatchScheduler {
        let scheduler =
            BatchScheduler::new(self.config.batch_size).with_batch_delay(self.config.batch_delay);
        match &self.shutdown {
            Some(shutdown) => scheduler.with_shutdown(shutdown.clone()),
            None => scheduler,
        }
    }

    fn finish_batch<T>(
        &self,
        summary: &mut Summary,
        report: &BatchReport<T>,
        metrics: &AcquisitionMetrics,
    ) {
        summary.absorb(report);
        for (index, message) in &report.failed {
            error!(index = index, error = %message, "Item failed");
        }
        metrics.record_items(
            report.records.len() as u64,
            report.skipped.len() as u64,
            report.failed.len() as u64,
        );

        let event = ProgressEvent::Batch {
            completed: report.completed,
            total: report.total,
        };
        info!(
            batch = report.batch_index,
            completed = report.completed,
            total = report.total,
            "{}",
            event.format_progress()
        );
        self.emit(event);
    }

    fn finish_enumeration(&self, summary: &mut Summary, metrics: &AcquisitionMetrics) {
        summary.interrupted = summary.completed() < summary.total;
        if summary.interrupted {
            warn!(
                completed = summary.completed(),
                total = summary.total,
                "Stopped before every item was processed"
            );
        }
        info!(
            succeeded = summary.item_count,
            skipped = summary.skipped_count,
            failed = summary.error_count,
            "{} complete",
            summary.mode
        );
        metrics.record_success(summary.item_count, summary.error_count);
    }

    fn fatal_error(&self, operation: &str, err: RetryError<FetcherError>) -> AcquisitionError {
        if err.is_exhausted() {
            self.log_exhausted(operation, &err);
            let attempts = err.attempts();
            return AcquisitionError::Unreachable {
                operation: operation.to_string(),
                attempts,
                source: err.into_inner(),
            };
        }

        let source = err.into_inner();
        match source.kind() {
            ErrorKind::MalformedRequest => {
                AcquisitionError::MalformedRequest(format!("{operation}: {source}"))
            }
            _ => AcquisitionError::Source {
                operation: operation.to_string(),
                source,
            },
        }
    }

    fn log_exhausted(&self, operation: &str, err: &RetryError<FetcherError>) {
        let ctx = RetryContext::for_fetcher_error(
            err.attempts(),
            self.retry.max_attempts(),
            Duration::ZERO,
            operation,
            err.error(),
        );
        error!("{}", ctx.format_failure(RetryErrorType::from(err.error())));
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.progress {
            callback(&event);
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}

fn item_outcome<T>(err: RetryError<FetcherError>) -> AcquisitionResult<T> {
    if err.error().is_absent() {
        AcquisitionResult::Skipped(err.to_string())
    } else {
        AcquisitionResult::Failed(err.to_string())
    }
}

fn artifact_failure(err: RetryError<FetcherError>) -> Result<ArtifactStatus, String> {
    if err.error().is_absent() {
        Ok(ArtifactStatus::Absent)
    } else {
        Err(err.to_string())
    }
}
