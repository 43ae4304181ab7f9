//! Retry message formatting
//!
//! Keeps retry and failure log lines consistent across the listing, snapshot and
//! download paths.

use std::time::Duration;

use crate::fetcher::FetcherError;

/// Classification of retry errors for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request timed out
    NetworkTimeout,
    /// Connection refused, reset, DNS failure
    NetworkOffline,
    /// HTTP 429 rate limit exceeded
    RateLimit,
    /// HTTP 5xx server error
    ServerError(u16),
    /// HTTP 400 invalid request / bad collection id
    InvalidRequest,
    /// HTTP 404 or absent item
    NotFound,
    /// Contract call reverted
    Reverted,
    /// Other HTTP client errors (401, 403, ...)
    ClientError(u16),
    /// JSON-RPC error object
    RpcError,
    /// Undecodable or malformed response
    BadResponse,
}

impl RetryErrorType {
    /// User-friendly description string used inside retry log messages.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::InvalidRequest => "invalid request",
            Self::NotFound => "resource not found",
            Self::Reverted => "contract call reverted",
            Self::ClientError(code) => match code {
                401 | 403 => "authentication failed",
                _ => "client error",
            },
            Self::RpcError => "RPC error",
            Self::BadResponse => "malformed response",
        }
    }

    /// Suggested remediation presented after a final failure.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Check your network connection and firewall settings",
            Self::NetworkOffline => "Verify internet connectivity and the endpoint URL",
            Self::RateLimit => "Lower --rate-limit or raise --safety-factor",
            Self::ServerError(_) => "The upstream may be experiencing issues, try again later",
            Self::InvalidRequest => "Check the collection address and chain for typos",
            Self::NotFound => "Verify the collection exists on the selected chain",
            Self::Reverted => "The token may not exist or may have been burned",
            Self::ClientError(_) => "Verify your API key and its permissions",
            Self::RpcError => "Check that the RPC endpoint supports eth_call for this chain",
            Self::BadResponse => "The upstream response format may have changed",
        }
    }
}

impl From<&FetcherError> for RetryErrorType {
    fn from(err: &FetcherError) -> Self {
        match err {
            FetcherError::RateLimited => Self::RateLimit,
            FetcherError::Network(_) => Self::NetworkOffline,
            FetcherError::Timeout(_) => Self::NetworkTimeout,
            FetcherError::Server { status, .. } => Self::ServerError(*status),
            FetcherError::BadRequest(_) => Self::InvalidRequest,
            FetcherError::NotFound(_) => Self::NotFound,
            FetcherError::Reverted(_) => Self::Reverted,
            FetcherError::HttpStatus { status, .. } => Self::ClientError(*status),
            FetcherError::Rpc { .. } => Self::RpcError,
            FetcherError::Parse(_) | FetcherError::InvalidResponse(_) => Self::BadResponse,
        }
    }
}

/// Context for formatting retry messages.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Attempt that just failed (1-based)
    pub attempt: u32,
    /// Maximum number of attempts configured
    pub max_attempts: u32,
    /// Short reason for the failure
    pub reason: String,
    /// Backoff duration until next attempt
    pub backoff_duration: Duration,
    /// Operation being retried (e.g. "page 3", "ownerOf(42)")
    pub operation: String,
    /// Original error message for details
    pub error_message: String,
}

impl RetryContext {
    /// Convenience constructor used throughout the retry logic.
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        reason: impl Into<String>,
        backoff_duration: Duration,
        operation: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            reason: reason.into(),
            backoff_duration,
            operation: operation.into(),
            error_message: error_message.into(),
        }
    }

    /// Build a context from a fetcher error, using its classified description.
    pub fn for_fetcher_error(
        attempt: u32,
        max_attempts: u32,
        backoff_duration: Duration,
        operation: impl Into<String>,
        err: &FetcherError,
    ) -> Self {
        Self::new(
            attempt,
            max_attempts,
            RetryErrorType::from(err).description(),
            backoff_duration,
            operation,
            err.to_string(),
        )
    }

    /// Attempts left after the one that just failed.
    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt)
    }

    /// Format standardized retry message with attempt counters and context.
    pub fn format_retry(&self) -> String {
        let mut message = format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... ({} left)",
            self.attempt + 1,
            self.max_attempts,
            self.reason,
            self.backoff_duration.as_secs_f64(),
            self.remaining_attempts()
        );
        append_operation(&mut message, &self.operation);
        message
    }

    /// Format retry success message when a previous attempt eventually works.
    pub fn format_success(&self) -> String {
        let mut message = format!(
            "Retry attempt {}/{} succeeded - resuming",
            self.attempt, self.max_attempts
        );
        append_operation(&mut message, &self.operation);
        message
    }

    /// Format final failure summary with actionable suggestions.
    pub fn format_failure(&self, error_type: RetryErrorType) -> String {
        let operation = if self.operation.is_empty() {
            "unknown"
        } else {
            &self.operation
        };

        let mut lines = vec![
            format!("[FAILED] Request failed after {} attempts", self.attempt),
            format!("  Last error: {}", self.error_message),
            format!("  Operation: {operation}"),
            "  Suggestions:".to_string(),
        ];
        lines.push(format!("    - {}", error_type.suggestion()));
        if error_type == RetryErrorType::RateLimit || matches!(error_type, RetryErrorType::ServerError(_)) {
            lines.push(format!(
                "    - Try increasing --max-attempts (current: {})",
                self.max_attempts
            ));
        }

        lines.join("\n")
    }
}

fn append_operation(buffer: &mut String, operation: &str) {
    if !operation.is_empty() {
        buffer.push_str(" (");
        buffer.push_str(operation);
        buffer.push(')');
    }
}
