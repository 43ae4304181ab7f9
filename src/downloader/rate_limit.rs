//! Request spacing for a single upstream
//!
//! Every caller targeting the same source shares one [`RateLimiter`]. Each
//! [`RateLimiter::acquire`] reserves the next free slot under a mutex and then sleeps
//! until that slot, so concurrent batch workers are serialized without holding the
//! lock while they wait.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

use super::config::request_interval;
use crate::metrics::record_limiter_wait;

/// Minimum-interval rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter that grants at most one request per `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Create a limiter from a per-minute budget and safety factor
    ///
    /// # Arguments
    /// * `rate_per_minute` - Requests allowed per minute by the upstream
    /// * `safety_factor` - Multiplier applied to the raw interval (1.2 = 20% margin)
    pub fn per_minute(rate_per_minute: u32, safety_factor: f64) -> Self {
        Self::new(request_interval(rate_per_minute, safety_factor))
    }

    /// A limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Spacing enforced between grants
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next grant
    ///
    /// The first call returns immediately. Later calls return no earlier than
    /// `interval` after the previous grant.
    pub async fn acquire(&self) {
        let requested_at = Instant::now();

        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next_slot = Some(slot + self.interval);
            slot
        };

        sleep_until(slot).await;

        let waited = slot.saturating_duration_since(requested_at);
        if !waited.is_zero() {
            trace!(wait_ms = waited.as_millis() as u64, "rate limiter grant after wait");
        }
        record_limiter_wait(waited);
    }
}
