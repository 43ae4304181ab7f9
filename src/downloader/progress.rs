//! Progress counting and reporting
//!
//! [`ProgressCounter`] is the only counter touched by concurrent batch workers; it is a
//! single atomic so updates never interleave. [`ProgressEvent`]s are emitted at page
//! and batch boundaries for the CLI or any other observer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic completed/total counter
#[derive(Debug)]
pub struct ProgressCounter {
    completed: AtomicU64,
    total: u64,
}

impl ProgressCounter {
    /// Counter for `total` expected items
    pub fn new(total: u64) -> Self {
        Self {
            completed: AtomicU64::new(0),
            total,
        }
    }

    /// Record `n` resolved items and return the new completed count
    pub fn record(&self, n: u64) -> u64 {
        self.completed.fetch_add(n, Ordering::SeqCst) + n
    }

    /// Items resolved so far
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Items expected
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Completion percentage (0-100); an empty run is 100% complete
    pub fn percent(&self) -> f64 {
        percent(self.completed(), self.total)
    }
}

/// `completed / total` as a percentage
pub fn percent(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (completed as f64 / total as f64) * 100.0
}

/// Progress notification emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A listing page was fetched
    Page {
        /// 1-based page number
        number: u64,
        /// Records on this page
        items: usize,
        /// Records accumulated so far
        accumulated: usize,
    },
    /// A batch of indices resolved
    Batch {
        /// Items resolved so far
        completed: u64,
        /// Items expected
        total: u64,
    },
}

impl ProgressEvent {
    /// Human-readable progress line
    pub fn format_progress(&self) -> String {
        match self {
            ProgressEvent::Page {
                number,
                items,
                accumulated,
            } => format!("[PROGRESS] Page {number}: {items} records (total: {accumulated})"),
            ProgressEvent::Batch { completed, total } => format!(
                "[PROGRESS] {completed}/{total} ({:.2}%)",
                percent(*completed, *total)
            ),
        }
    }
}

/// Observer invoked at every page or batch boundary
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;
