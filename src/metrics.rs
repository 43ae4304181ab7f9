//! Observability metrics for collection acquisition
//!
//! Collects counters and histograms for upstream requests, 429 responses, retry
//! behavior, rate limiter waits and per-mode item outcomes.
//!
//! ## Architecture
//!
//! - Uses the `metrics` crate facade; recording is a no-op until a recorder is installed
//! - Optional Prometheus exporter for a scrape endpoint (e.g. `:9090/metrics`)
//! - Correlation ids tie request log lines together

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Set once the exporter is installed
static METRICS_INITIALIZED: OnceCell<SocketAddr> = OnceCell::new();

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Metrics setup errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Exporter could not be installed
    #[error("failed to install Prometheus exporter: {0}")]
    Install(String),
}

/// Install the Prometheus exporter on `addr` and register metric descriptions
///
/// Later calls are ignored once an exporter is installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    if let Some(existing) = METRICS_INITIALIZED.get() {
        debug!(addr = %existing, "Metrics already initialized, skipping");
        return Ok(());
    }


    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    describe_counter!(
        "http_requests_total",
        Unit::Count,
        "Total number of upstream HTTP requests"
    );
    describe_counter!(
        "http_429_errors_total",
        Unit::Count,
        "Total number of 429 rate limit responses"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "Upstream request duration in seconds"
    );
    describe_counter!("retries_total", Unit::Count, "Total number of retry attempts");
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Duration of retry backoff in seconds"
    );
    describe_histogram!(
        "rate_limit_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for a rate limiter grant"
    );
    describe_counter!(
        "items_total",
        Unit::Count,
        "Items resolved, labelled by mode and outcome"
    );
    describe_counter!(
        "acquisitions_failed_total",
        Unit::Count,
        "Acquisition runs that ended with an error"
    );

    let _ = METRICS_INITIALIZED.set(addr);
    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Whether an exporter has been installed
pub fn is_initialized() -> bool {
    METRICS_INITIALIZED.get().is_some()
}

/// Next correlation id, formatted `req-` plus eight hex digits
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing guard for one upstream call
///
/// Labels are keyed by the endpoint path so listing pages, RPC calls and
/// artifact fetches show up as separate series.
pub struct HttpRequestMetrics {
    endpoint: String,
    started: Instant,
    correlation_id: String,
}

impl HttpRequestMetrics {
    /// Begin timing a call against `endpoint`
    pub fn start(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let correlation_id = generate_correlation_id();
        debug!(correlation_id = %correlation_id, endpoint = %endpoint, "Upstream call started");
        Self {
            endpoint,
            started: Instant::now(),
            correlation_id,
        }
    }

    fn count(&self, status: String) -> u64 {
        counter!(
            "http_requests_total",
            "endpoint" => self.endpoint.clone(),
            "status" => status,
        )
        .increment(1);
        self.started.elapsed().as_millis() as u64
    }

    /// Record a response with the given status code
    pub fn record_complete(&self, status_code: u16) {
        histogram!("http_request_duration_seconds", "endpoint" => self.endpoint.clone())
            .record(self.started.elapsed().as_secs_f64());
        let elapsed_ms = self.count(status_code.to_string());

        if status_code == 429 {
            counter!("http_429_errors_total", "endpoint" => self.endpoint.clone()).increment(1);
            warn!(
                correlation_id = %self.correlation_id,
                endpoint = %self.endpoint,
                elapsed_ms,
                "Upstream throttled the call (429)"
            );
        } else {
            debug!(
                correlation_id = %self.correlation_id,
                endpoint = %self.endpoint,
                status = status_code,
                elapsed_ms,
                "Upstream call finished"
            );
        }
    }

    /// Record a call that never produced a status (connect failure, timeout)
    pub fn record_network_error(&self) {
        let elapsed_ms = self.count("network_error".to_string());
        warn!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            elapsed_ms,
            "Upstream call failed without a response"
        );
    }

    /// Correlation id attached to this call's log lines
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record retry backoff duration
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!("retries_total", "attempt" => attempt.to_string()).increment(1);
    histogram!("retry_backoff_duration_seconds").record(duration.as_secs_f64());
}

/// Record time spent waiting on the rate limiter
pub fn record_limiter_wait(waited: Duration) {
    histogram!("rate_limit_wait_seconds").record(waited.as_secs_f64());
}

/// Per-run acquisition metrics
pub struct AcquisitionMetrics {
    mode: &'static str,
    start_time: Instant,
}

impl AcquisitionMetrics {
    /// Start tracking a run
    pub fn start(mode: &'static str) -> Self {
        info!(mode = mode, "Acquisition started");
        Self {
            mode,
            start_time: Instant::now(),
        }
    }

    /// Count resolved items by outcome
    pub fn record_items(&self, succeeded: u64, skipped: u64, failed: u64) {
        for (outcome, n) in [("success", succeeded), ("skipped", skipped), ("failed", failed)] {
            if n > 0 {
                counter!("items_total", "mode" => self.mode, "outcome" => outcome).increment(n);
            }
        }
    }

    /// Record a completed run
    pub fn record_success(&self, item_count: u64, error_count: u64) {
        info!(
            mode = self.mode,
            item_count = item_count,
            error_count = error_count,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Acquisition finished"
        );
    }

    /// Record a run that ended with an error
    pub fn record_failure(&self, error: &str) {
        counter!("acquisitions_failed_total", "mode" => self.mode).increment(1);
        error!(
            mode = self.mode,
            error = %error,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Acquisition failed"
        );
    }
}
