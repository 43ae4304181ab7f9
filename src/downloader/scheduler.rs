//! Batched, bounded-concurrency enumeration
//!
//! [`BatchScheduler::run`] splits `[0, total)` into consecutive batches. Every index
//! in a batch is dispatched at once (at most `batch_size` in flight), and the batch is
//! fully drained before the next one starts. Each drained batch is yielded as a
//! [`BatchReport`]; the consumer flushes it, and the inter-batch delay runs on the next
//! poll, after every flushed batch including the last.

use futures_util::stream::{self, Stream, StreamExt};
use std::future::Future;
use std::ops::Range;
use std::time::Duration;
use tracing::{debug, info};

use super::config::{DEFAULT_BATCH_DELAY_MS, DEFAULT_BATCH_SIZE};
use super::job::AcquisitionResult;
use super::progress::{percent, ProgressCounter};
use crate::shutdown::{sleep_or_shutdown, SharedShutdown};

/// Outcome of one drained batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport<T> {
    /// 0-based batch number
    pub batch_index: usize,
    /// Indices covered by this batch
    pub range: Range<u64>,
    /// Successful records, in index order
    pub records: Vec<T>,
    /// Skipped indices with reasons
    pub skipped: Vec<(u64, String)>,
    /// Failed indices with errors
    pub failed: Vec<(u64, String)>,
    /// Items resolved across the run so far
    pub completed: u64,
    /// Items in the whole run
    pub total: u64,
}

impl<T> BatchReport<T> {
    /// Completion percentage after this batch
    pub fn percent(&self) -> f64 {
        percent(self.completed, self.total)
    }

    /// Items resolved in this batch
    pub fn len(&self) -> usize {
        self.records.len() + self.skipped.len() + self.failed.len()
    }

    /// Whether the batch resolved nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split `[0, total)` into consecutive ranges of at most `batch_size`
pub fn batch_ranges(total: u64, batch_size: usize) -> Vec<Range<u64>> {
    let size = batch_size.max(1) as u64;
    (0..total.div_ceil(size))
        .map(|n| {
            let start = n * size;
            start..(start + size).min(total)
        })
        .collect()
}

/// Batch scheduler; consumed by [`BatchScheduler::run`]
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    batch_delay: Duration,
    shutdown: Option<SharedShutdown>,
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchScheduler {
    /// Scheduler with `batch_size` items per batch (minimum 1)
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            shutdown: None,
        }
    }

    /// Pause between batches
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Stop dispatching new batches once shutdown is requested
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Items per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Drive `worker` over `[0, total)`
    ///
    /// The returned stream is finite and yields one report per batch, in index order.
    pub fn run<T, F, Fut>(self, total: u64, worker: F) -> impl Stream<Item = BatchReport<T>>
    where
        F: Fn(u64) -> Fut,
        Fut: Future<Output = AcquisitionResult<T>>,
    {
        let ranges = batch_ranges(total, self.batch_size);
        debug!(
            total = total,
            batch_size = self.batch_size,
            batches = ranges.len(),
            "Batch schedule prepared"
        );

        let state = RunState {
            scheduler: self,
            ranges: ranges.into_iter().enumerate(),
            worker,
            counter: ProgressCounter::new(total),
            dispatched_any: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.dispatched_any && !state.scheduler.batch_delay.is_zero() {
                let shutdown = state.scheduler.shutdown.as_deref();
                sleep_or_shutdown(shutdown, state.scheduler.batch_delay).await;
            }

            let (batch_index, range) = state.ranges.next()?;

            if state.shutdown_requested() {
                info!(
                    batch = batch_index,
                    completed = state.counter.completed(),
                    total = state.counter.total(),
                    "Shutdown requested, not dispatching further batches"
                );
                return None;
            }

            state.dispatched_any = true;
            let report = state.run_batch(batch_index, range).await;
            Some((report, state))
        })
    }
}

struct RunState<F, I> {
    scheduler: BatchScheduler,
    ranges: I,
    worker: F,
    counter: ProgressCounter,
    dispatched_any: bool,
}

impl<F, I> RunState<F, I> {
    fn shutdown_requested(&self) -> bool {
        self.scheduler
            .shutdown
            .as_ref()
            .is_some_and(|s| s.is_shutdown_requested())
    }

    async fn run_batch<T, Fut>(&self, batch_index: usize, range: Range<u64>) -> BatchReport<T>
    where
        F: Fn(u64) -> Fut,
        Fut: Future<Output = AcquisitionResult<T>>,
    {
        let worker = &self.worker;
        let counter = &self.counter;

        let mut outcomes: Vec<(u64, AcquisitionResult<T>)> = stream::iter(range.clone())
            .map(move |index| async move {
                let outcome = worker(index).await;
                counter.record(1);
                (index, outcome)
            })
            .buffer_unordered(self.scheduler.batch_size)
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let mut report = BatchReport {
            batch_index,
            range,
            records: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            completed: self.counter.completed(),
            total: self.counter.total(),
        };

        for (index, outcome) in outcomes {
            match outcome {
                AcquisitionResult::Success(record) => report.records.push(record),
                AcquisitionResult::Skipped(reason) => report.skipped.push((index, reason)),
                AcquisitionResult::Failed(error) => report.failed.push((index, error)),
            }
        }

        debug!(
            batch = batch_index,
            succeeded = report.records.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            completed = report.completed,
            total = report.total,
            "Batch drained"
        );

        report
    }
}
