//! Cursor-driven pagination over a [`ListingSource`]
//!
//! One [`PaginationCursor`] walks one listing from the first page to the last. Each
//! page request carries the previous page's continuation token and a fixed page size.
//! The walk ends when a page has no token or returns fewer items than requested.
//!
//! Includes safety mechanisms:
//! - Maximum page limit to prevent infinite loops
//! - Rate limiter acquisition before every attempt
//! - Retry integration for transient failures

use futures_util::stream::{self, Stream};
use tracing::debug;

use crate::downloader::job::PageRequest;
use crate::downloader::rate_limit::RateLimiter;
use crate::downloader::retry::{RetryError, RetryPolicy};
use crate::fetcher::{FetcherError, ListingPage, ListingSource};

/// Maximum number of pages fetched in one walk
pub const MAX_PAGES: u64 = 100_000;

/// Cursor lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// No page requested yet
    Start,
    /// A page request is in flight (including its retries)
    Fetching,
    /// The last page carried a token and was full
    HasMore(String),
    /// End of data reached
    Exhausted,
    /// A page failed; the walk is over
    FatalError,
}

impl CursorState {
    /// Whether no further pages will be produced
    pub fn is_terminal(&self) -> bool {
        matches!(self, CursorState::Exhausted | CursorState::FatalError)
    }
}

/// Single-use cursor over a listing
pub struct PaginationCursor<'a, S: ListingSource + ?Sized> {
    source: &'a S,
    limiter: &'a RateLimiter,
    retry: RetryPolicy,
    page_size: usize,
    state: CursorState,
    pages_fetched: u64,
}

impl<'a, S: ListingSource + ?Sized> PaginationCursor<'a, S> {
    /// Create a cursor at the start of the listing
    ///
    /// # Arguments
    /// * `source` - Listing endpoint
    /// * `limiter` - Limiter shared with every other caller of this upstream
    /// * `retry` - Policy applied to each page request
    /// * `page_size` - Items requested on every page (minimum 1)
    pub fn new(
        source: &'a S,
        limiter: &'a RateLimiter,
        retry: RetryPolicy,
        page_size: usize,
    ) -> Self {
        Self {
            source,
            limiter,
            retry,
            page_size: page_size.max(1),
            state: CursorState::Start,
            pages_fetched: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> &CursorState {
        &self.state
    }

    /// Pages requested so far, including a failed one
    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    /// Fetch the next page
    ///
    /// Returns `None` once the cursor is terminal. A failed page is returned once as
    /// `Some(Err(_))` and moves the cursor to [`CursorState::FatalError`].
    pub async fn next_page(
        &mut self,
    ) -> Option<Result<ListingPage<S::Item>, RetryError<FetcherError>>> {
        let request = match std::mem::replace(&mut self.state, CursorState::Fetching) {
            CursorState::Start => PageRequest::first(self.page_size),
            CursorState::HasMore(token) => PageRequest::after(token, self.page_size),
            terminal @ (CursorState::Exhausted | CursorState::FatalError) => {
                self.state = terminal;
                return None;
            }
            CursorState::Fetching => {
                self.state = CursorState::FatalError;
                return Some(Err(RetryError::Rejected {
                    attempts: 0,
                    error: FetcherError::InvalidResponse(
                        "cursor polled while a page was in flight".to_string(),
                    ),
                }));
            }
        };

        if self.pages_fetched >= MAX_PAGES {
            self.state = CursorState::FatalError;
            return Some(Err(RetryError::Rejected {
                attempts: 0,
                error: FetcherError::InvalidResponse(format!(
                    "max pages ({MAX_PAGES}) exceeded - possible continuation loop"
                )),
            }));
        }

        self.pages_fetched += 1;
        let page_number = self.pages_fetched;
        let label = format!("page {page_number}");

        match &request.cursor {
            Some(token) => debug!(
                page = page_number,
                continuation = %token.chars().take(20).collect::<String>(),
                limit = request.page_size,
                "Requesting listing page"
            ),
            None => debug!(page = page_number, limit = request.page_size, "Requesting first listing page"),
        }

        let source = self.source;
        let limiter = self.limiter;
        let request = &request;
        let result = self
            .retry
            .execute(
                &label,
                || async move {
                    limiter.acquire().await;
                    source.fetch_page(request).await
                },
                FetcherError::is_retryable,
            )
            .await;

        match result {
            Ok(page) => {
                let short = page.items.len() < self.page_size;
                self.state = match (&page.continuation, short) {
                    (Some(token), false) => CursorState::HasMore(token.clone()),
                    _ => CursorState::Exhausted,
                };
                debug!(
                    page = page_number,
                    items = page.items.len(),
                    has_token = page.continuation.is_some(),
                    exhausted = self.state.is_terminal(),
                    "Listing page received"
                );
                Some(Ok(page))
            }
            Err(err) => {
                self.state = CursorState::FatalError;
                Some(Err(err))
            }
        }
    }

    /// Consume the cursor as a stream of pages
    pub fn into_stream(
        self,
    ) -> impl Stream<Item = Result<ListingPage<S::Item>, RetryError<FetcherError>>> + 'a {
        stream::unfold(self, |mut cursor| async move {
            let page = cursor.next_page().await?;
            Some((page, cursor))
        })
    }
}
