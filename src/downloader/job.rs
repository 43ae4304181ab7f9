//! Units of work and their outcomes

use serde::Serialize;
use std::fmt;

/// Request for one listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    /// Continuation token from the previous page, `None` for the first page
    pub cursor: Option<String>,
    /// Records requested
    pub page_size: usize,
}

impl PageRequest {
    /// First page of a listing
    pub fn first(page_size: usize) -> Self {
        Self {
            cursor: None,
            page_size,
        }
    }

    /// Page following `cursor`
    pub fn after(cursor: impl Into<String>, page_size: usize) -> Self {
        Self {
            cursor: Some(cursor.into()),
            page_size,
        }
    }
}

/// Outcome of one request
///
/// `Skipped` marks a legitimately absent or already-present item and is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionResult<T> {
    /// Record resolved
    Success(T),
    /// Item absent upstream, or already present locally
    Skipped(String),
    /// Transient failure that exhausted retries, or a fatal per-item error
    Failed(String),
}

impl<T> AcquisitionResult<T> {
    /// Whether the record resolved
    pub fn is_success(&self) -> bool {
        matches!(self, AcquisitionResult::Success(_))
    }

    /// Whether the item was skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self, AcquisitionResult::Skipped(_))
    }

    /// Whether the item failed
    pub fn is_failed(&self) -> bool {
        matches!(self, AcquisitionResult::Failed(_))
    }

    /// Short status tag used in per-item log lines
    pub fn tag(&self) -> OutcomeTag {
        match self {
            AcquisitionResult::Success(_) => OutcomeTag::Ok,
            AcquisitionResult::Skipped(_) => OutcomeTag::Skip,
            AcquisitionResult::Failed(_) => OutcomeTag::Err,
        }
    }
}

/// Per-item status tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeTag {
    /// Succeeded
    Ok,
    /// Skipped (cached or absent)
    Skip,
    /// Failed
    Err,
}

impl fmt::Display for OutcomeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeTag::Ok => "OK",
            OutcomeTag::Skip => "SKIP",
            OutcomeTag::Err => "ERR",
        };
        f.write_str(s)
    }
}
