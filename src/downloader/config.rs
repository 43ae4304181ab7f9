//! Acquisition configuration constants and backoff calculation

use std::time::Duration;

use super::AcquisitionError;

/// Default upstream request budget per minute.
/// Matches the published marketplace allowance for keyed clients.
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 180;

/// Default multiplier applied to the per-request interval.
/// 1.2 keeps a 20% margin under the allowance for large collections.
pub const DEFAULT_SAFETY_FACTOR: f64 = 1.2;

/// Default number of attempts per logical operation, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff in milliseconds.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 2000; // 2 seconds

/// Default number of indices dispatched together in one batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Default pause between consecutive batches in milliseconds.
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1000; // 1 second

/// Default number of records requested per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Calculate exponential backoff delay
///
/// `attempt` counts from 0, so the first retry waits `base`, the second `2 * base`.
pub fn calculate_backoff(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Minimum spacing between two grants for a per-minute budget
///
/// `ceil(60000 / rate * safety)` milliseconds. The product is rounded to micro-millisecond
/// precision first so float noise (e.g. `400.00000000000006`) does not bump the ceiling.
pub fn request_interval(rate_per_minute: u32, safety_factor: f64) -> Duration {
    if rate_per_minute == 0 {
        return Duration::ZERO;
    }
    let raw_ms = 60_000.0 / f64::from(rate_per_minute) * safety_factor;
    let ms = ((raw_ms * 1000.0).round() / 1000.0).ceil().max(0.0);
    Duration::from_millis(ms as u64)
}

/// Tunables shared by every acquisition mode
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionConfig {
    /// Upstream budget in requests per minute
    pub rate_limit_per_minute: u32,
    /// Multiplier applied on top of the raw per-request interval
    pub safety_factor: f64,
    /// Attempts per logical operation, including the first
    pub max_attempts: u32,
    /// Base delay for exponential backoff
    pub retry_base_delay: Duration,
    /// Indices per batch (also the in-flight bound)
    pub batch_size: usize,
    /// Pause between batches
    pub batch_delay: Duration,
    /// Records requested per listing page
    pub page_size: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            safety_factor: DEFAULT_SAFETY_FACTOR,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AcquisitionConfig {
    /// Interval the shared rate limiter enforces
    pub fn request_interval(&self) -> Duration {
        request_interval(self.rate_limit_per_minute, self.safety_factor)
    }

    /// Reject values that would stall or spin the engine
    pub fn validate(&self) -> Result<(), AcquisitionError> {
        if self.rate_limit_per_minute == 0 {
            return Err(AcquisitionError::Configuration(
                "rate limit must be at least 1 request per minute".to_string(),
            ));
        }
        if !self.safety_factor.is_finite() || self.safety_factor < 1.0 {
            return Err(AcquisitionError::Configuration(format!(
                "safety factor must be >= 1.0, got {}",
                self.safety_factor
            )));
        }
        if self.max_attempts == 0 {
            return Err(AcquisitionError::Configuration(
                "max attempts must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AcquisitionError::Configuration(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(AcquisitionError::Configuration(
                "page size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
