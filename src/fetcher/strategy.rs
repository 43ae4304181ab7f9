//! Enumeration strategy detection
//!
//! Before a snapshot commits to an enumeration method, [`StrategyProbe::detect`] issues
//! at most two cheap trial calls. Probe calls go through the rate limiter but are never
//! retried and never count as item errors.

use tracing::{info, warn};

use crate::downloader::rate_limit::RateLimiter;
use crate::fetcher::EnumerableSource;
use crate::{EnumerationStrategy, TokenId};

/// Index used for the indexed trial call
pub const INDEXED_PROBE_INDEX: u64 = 0;

/// Token id used for the sequential trial call
pub const SEQUENTIAL_PROBE_ID: u64 = 1;

/// Capability probe for enumerable sources
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyProbe;

impl StrategyProbe {
    /// Decide how `source` should be enumerated
    ///
    /// 1. `tokenByIndex(0)` succeeds: [`EnumerationStrategy::Indexed`]
    /// 2. otherwise `ownerOf(1)` succeeds: [`EnumerationStrategy::Sequential`]
    /// 3. otherwise [`EnumerationStrategy::Unknown`]
    pub async fn detect<S>(source: &S, limiter: &RateLimiter) -> EnumerationStrategy
    where
        S: EnumerableSource + ?Sized,
    {
        info!(index = INDEXED_PROBE_INDEX, "Probing tokenByIndex");
        limiter.acquire().await;
        match source.token_by_index(INDEXED_PROBE_INDEX).await {
            Ok(token_id) => {
                info!(token_id = %token_id, "Enumeration supported (tokenByIndex works)");
                return EnumerationStrategy::Indexed;
            }
            Err(e) => warn!(error = %e, "tokenByIndex probe failed"),
        }

        info!(token_id = SEQUENTIAL_PROBE_ID, "Probing ownerOf");
        limiter.acquire().await;
        match source.owner_of(&TokenId::from(SEQUENTIAL_PROBE_ID)).await {
            Ok(owner) => {
                info!(owner = %owner, "Sequential ids likely (ownerOf(1) works)");
                EnumerationStrategy::Sequential
            }
            Err(e) => {
                warn!(error = %e, "ownerOf probe failed");
                EnumerationStrategy::Unknown
            }
        }
    }
}
