//! In-memory data sources shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use collection_downloader::downloader::{AcquisitionConfig, PageRequest};
use collection_downloader::fetcher::{
    EnumerableSource, FetcherError, FetcherResult, ItemSource, ListingPage, ListingSource,
};
use collection_downloader::output::{OutputResult, RecordSink};
use collection_downloader::TokenId;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Config with the default pacing, retry and batch settings
pub fn default_config() -> AcquisitionConfig {
    AcquisitionConfig::default()
}

/// Config that paces and backs off by a millisecond, for real-time tests
pub fn fast_config() -> AcquisitionConfig {
    AcquisitionConfig {
        rate_limit_per_minute: 60_000,
        safety_factor: 1.0,
        retry_base_delay: Duration::from_millis(1),
        batch_delay: Duration::ZERO,
        ..AcquisitionConfig::default()
    }
}

/// Listing that replays a fixed script of responses
pub struct ScriptedListing {
    responses: Mutex<VecDeque<FetcherResult<ListingPage<u32>>>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedListing {
    pub fn new(responses: Vec<FetcherResult<ListingPage<u32>>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Page of `count` sequential items starting at `first`
pub fn page(first: u32, count: u32, continuation: Option<&str>) -> FetcherResult<ListingPage<u32>> {
    Ok(ListingPage {
        items: (first..first + count).collect(),
        continuation: continuation.map(str::to_string),
    })
}

#[async_trait]
impl ListingSource for ScriptedListing {
    type Item = u32;

    async fn fetch_page(&self, request: &PageRequest) -> FetcherResult<ListingPage<u32>> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetcherError::InvalidResponse("script exhausted".into())))
    }
}

/// ERC-721 contract with configurable capabilities and failures
pub struct MockContract {
    pub total_supply: u64,
    pub supports_index: bool,
    pub supports_owner_probe: bool,
    /// Indices whose `tokenByIndex` fails with a transient error every time
    pub failing_index: HashSet<u64>,
    /// Token ids whose `ownerOf` fails with a non-retryable RPC error
    pub broken_owner: HashSet<u64>,
    /// Token ids that revert (burned)
    pub burned: HashSet<u64>,
    pub total_supply_calls: AtomicU32,
    pub token_by_index_calls: AtomicU32,
    pub owner_of_calls: AtomicU32,
}

impl MockContract {
    pub fn indexed(total_supply: u64) -> Self {
        Self {
            total_supply,
            supports_index: true,
            supports_owner_probe: true,
            failing_index: HashSet::new(),
            broken_owner: HashSet::new(),
            burned: HashSet::new(),
            total_supply_calls: AtomicU32::new(0),
            token_by_index_calls: AtomicU32::new(0),
            owner_of_calls: AtomicU32::new(0),
        }
    }

    pub fn sequential(total_supply: u64) -> Self {
        Self {
            supports_index: false,
            ..Self::indexed(total_supply)
        }
    }

    pub fn owner_of_calls(&self) -> u32 {
        self.owner_of_calls.load(Ordering::SeqCst)
    }

    pub fn token_by_index_calls(&self) -> u32 {
        self.token_by_index_calls.load(Ordering::SeqCst)
    }

    /// Token id stored at `index` for indexed contracts
    pub fn token_at(index: u64) -> u64 {
        1000 + index
    }

    pub fn owner_for(token_id: u64) -> String {
        format!("0x{:040X}", token_id)
    }
}

#[async_trait]
impl EnumerableSource for MockContract {
    async fn total_supply(&self) -> FetcherResult<u64> {
        self.total_supply_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.total_supply)
    }

    async fn token_by_index(&self, index: u64) -> FetcherResult<TokenId> {
        self.token_by_index_calls.fetch_add(1, Ordering::SeqCst);
        if !self.supports_index {
            return Err(FetcherError::Reverted("tokenByIndex not supported".into()));
        }
        if self.failing_index.contains(&index) {
            return Err(FetcherError::Server {
                status: 503,
                message: "unavailable".into(),
            });
        }
        Ok(TokenId::from(Self::token_at(index)))
    }

    async fn owner_of(&self, token_id: &TokenId) -> FetcherResult<String> {
        self.owner_of_calls.fetch_add(1, Ordering::SeqCst);
        let id = token_id.as_u64().unwrap_or(u64::MAX);
        if !self.supports_owner_probe {
            return Err(FetcherError::Rpc {
                code: -32000,
                message: "not an ERC-721 contract".into(),
            });
        }
        if self.burned.contains(&id) {
            return Err(FetcherError::Reverted("ERC721: invalid token ID".into()));
        }
        if self.broken_owner.contains(&id) {
            return Err(FetcherError::Rpc {
                code: -32603,
                message: "internal error".into(),
            });
        }
        Ok(Self::owner_for(id))
    }
}

/// Record sink that remembers every append
pub struct RecordingSink<T> {
    pub records: Vec<T>,
    pub appends: u32,
}

impl<T> Default for RecordingSink<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            appends: 0,
        }
    }
}

impl<T: Clone> RecordSink<T> for RecordingSink<T> {
    fn append(&mut self, records: &[T]) -> OutputResult<()> {
        self.appends += 1;
        self.records.extend_from_slice(records);
        Ok(())
    }

    fn location(&self) -> Option<PathBuf> {
        None
    }

    fn records_written(&self) -> u64 {
        self.records.len() as u64
    }
}

/// Item host serving images and metadata for a fixed set of ids
#[derive(Default)]
pub struct MockItems {
    pub present: HashSet<u64>,
    pub failing: HashSet<u64>,
    pub image_calls: AtomicU32,
    pub metadata_calls: AtomicU32,
    pub served: Mutex<HashMap<u64, u32>>,
}

impl MockItems {
    pub fn with_ids(ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            present: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.image_calls.load(Ordering::SeqCst) + self.metadata_calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, id: u64) -> FetcherResult<()> {
        if self.failing.contains(&id) {
            return Err(FetcherError::Timeout("30s".into()));
        }
        if !self.present.contains(&id) {
            return Err(FetcherError::NotFound(format!("{id} not found")));
        }
        *self.served.lock().unwrap().entry(id).or_default() += 1;
        Ok(())
    }
}

#[async_trait]
impl ItemSource for MockItems {
    async fn fetch_image(&self, id: u64) -> FetcherResult<Bytes> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.lookup(id)?;
        Ok(Bytes::from(format!("image-{id}")))
    }

    async fn fetch_metadata(&self, id: u64) -> FetcherResult<Value> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.lookup(id)?;
        Ok(json!({"name": format!("Token #{id}")}))
    }
}
