//! Data sources
//!
//! Three access patterns are supported, each behind its own trait:
//!
//! - [`ListingSource`] - cursor-paginated marketplace listings
//! - [`EnumerableSource`] - ERC-721 style `totalSupply` / `tokenByIndex` / `ownerOf`
//! - [`ItemSource`] - per-token artifacts (image bytes, metadata JSON)
//!
//! Adapters report failures as [`FetcherError`], whose [`ErrorKind`] drives retry and
//! skip decisions in the engine.

use async_trait::async_trait;
use bytes::Bytes;

use crate::downloader::job::PageRequest;
use crate::TokenId;

pub mod erc721_rpc;
pub mod http;
pub mod item_download;
pub mod magic_eden;
pub mod pagination;
pub mod retry_formatter;
pub mod shared_resources;
pub mod strategy;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// HTTP 429 from the upstream
    #[error("rate limit exceeded")]
    RateLimited,

    /// Connection refused, reset or otherwise dropped
    #[error("network error: {0}")]
    Network(String),

    /// Request did not complete in time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// HTTP 5xx
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// HTTP 400: the request itself is malformed
    #[error("bad request: {0}")]
    BadRequest(String),

    /// HTTP 404: the resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Contract call reverted (non-existent or burned token)
    #[error("execution reverted: {0}")]
    Reverted(String),

    /// Any other non-success HTTP status
    #[error("HTTP error {status}: {message}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// JSON-RPC error object that is not a revert
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message
        message: String,
    },

    /// Response body could not be decoded
    #[error("parse error: {0}")]
    Parse(String),

    /// Response decoded but violates the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Failure taxonomy used by the retry policy and the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rate limit, connection reset, timeout, 5xx: retried with backoff
    RetryableTransient,
    /// Item legitimately missing: reported as skipped
    NotFoundOrAbsent,
    /// Bad identifier or parameters: never retried
    MalformedRequest,
    /// Anything else: never retried
    Fatal,
}

impl FetcherError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetcherError::RateLimited
            | FetcherError::Network(_)
            | FetcherError::Timeout(_)
            | FetcherError::Server { .. } => ErrorKind::RetryableTransient,
            FetcherError::NotFound(_) | FetcherError::Reverted(_) => ErrorKind::NotFoundOrAbsent,
            FetcherError::BadRequest(_) => ErrorKind::MalformedRequest,
            FetcherError::HttpStatus { .. }
            | FetcherError::Rpc { .. }
            | FetcherError::Parse(_)
            | FetcherError::InvalidResponse(_) => ErrorKind::Fatal,
        }
    }

    /// Whether the retry policy should try again
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::RetryableTransient
    }

    /// Whether this error means the item does not exist
    pub fn is_absent(&self) -> bool {
        self.kind() == ErrorKind::NotFoundOrAbsent
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// One page of a cursor-paginated listing
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage<T> {
    /// Records on this page
    pub items: Vec<T>,
    /// Token for the next page, absent on the last page
    pub continuation: Option<String>,
}

/// Cursor-paginated listing endpoint
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Record type produced by this source
    type Item: Send;

    /// Fetch one page
    ///
    /// Must issue exactly one upstream request; retries are the caller's concern.
    async fn fetch_page(&self, request: &PageRequest) -> FetcherResult<ListingPage<Self::Item>>;
}

/// Contract exposing enumerable token ownership
#[async_trait]
pub trait EnumerableSource: Send + Sync {
    /// Number of tokens currently in existence
    async fn total_supply(&self) -> FetcherResult<u64>;

    /// Token id at `index` (0-based); only meaningful for indexed contracts
    async fn token_by_index(&self, index: u64) -> FetcherResult<TokenId>;

    /// Owner address of `token_id`
    async fn owner_of(&self, token_id: &TokenId) -> FetcherResult<String>;
}

/// Per-token artifact endpoint
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Download the image for `id`
    async fn fetch_image(&self, id: u64) -> FetcherResult<Bytes>;

    /// Download the metadata document for `id`
    async fn fetch_metadata(&self, id: u64) -> FetcherResult<serde_json::Value>;
}
