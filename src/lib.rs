//! # Collection Downloader Library
//!
//! A resilient bulk-acquisition library for NFT collection data. It pulls marketplace
//! listings through a cursor-paginated HTTP API, snapshots on-chain ownership by
//! enumerating an ERC-721 contract, and mirrors per-token artifacts (images and
//! metadata) to disk, all while respecting upstream rate limits and riding out
//! transient failures.
//!
//! ## Features
//!
//! - **Rate Limiting**: One shared limiter per upstream spaces every outbound call
//! - **Retry with Backoff**: Exponential backoff for retryable failures, immediate
//!   short-circuit for absent items and malformed requests
//! - **Batch Scheduling**: Bounded-concurrency batches with drained progress boundaries
//! - **Strategy Detection**: Probes a contract for indexed or sequential enumeration
//! - **Partial Results**: Whatever was acquired before a fatal error is still persisted
//!
//! ## Quick Start
//!
//! ```no_run
//! use collection_downloader::downloader::{AcquisitionConfig, AcquisitionEngine};
//! use collection_downloader::fetcher::erc721_rpc::Erc721RpcSource;
//! use collection_downloader::output::csv::CsvRecordSink;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Erc721RpcSource::new(
//!     "https://evm-rpc.sei-apis.com",
//!     "0x972170dcf963e1dc7bdd7bdf85a3abb35fb4f15d",
//! );
//! let mut sink = CsvRecordSink::new("./output/snapshot.csv");
//!
//! let engine = AcquisitionEngine::new(AcquisitionConfig::default());
//! let summary = engine.run_snapshot(&source, &mut sink).await?;
//! println!("{} owners captured", summary.item_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`identifier`] - Chain and collection address parsing
//! - [`fetcher`] - Data source traits and the concrete HTTP / JSON-RPC adapters
//! - [`downloader`] - Rate limiter, retry policy, batch scheduler and the engine
//! - [`output`] - Record and item sinks (CSV, filesystem)
//! - [`cli`] - Command line surface
//!
//! ## Data Types
//!
//! - [`AssetRecord`] - One marketplace listing row
//! - [`OwnershipRecord`] - One token/owner pair from a contract snapshot
//! - [`TokenId`] - A 256-bit token identifier
//! - [`EnumerationStrategy`] - How a contract's tokens are discovered

#![warn(missing_docs)]
#![warn(clippy::all)]

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;

/// CLI command implementations
pub mod cli;

/// Acquisition orchestration
pub mod downloader;

/// Data sources
pub mod fetcher;

/// Chain and collection identifiers
pub mod identifier;

/// Observability metrics
pub mod metrics;

/// Record and item sinks
pub mod output;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

pub use identifier::{Chain, CollectionIdentifier};

/// A 256-bit ERC-721 token identifier stored as a big-endian word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId([u8; 32]);

impl TokenId {
    /// Build a token id from its big-endian ABI word.
    pub fn from_be_bytes(word: [u8; 32]) -> Self {
        Self(word)
    }

    /// The big-endian ABI word for this id.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Narrow to `u64` when the id fits.
    pub fn as_u64(&self) -> Option<u64> {
        if self.0[..24].iter().any(|b| *b != 0) {
            return None;
        }
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.0[24..]);
        Some(u64::from_be_bytes(low))
    }
}

impl From<u64> for TokenId {
    fn from(value: u64) -> Self {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&value.to_be_bytes());
        Self(word)
    }
}

impl fmt::Display for TokenId {
    /// Decimal rendering, long division over the 32-byte word.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut word = self.0;
        let mut digits = Vec::with_capacity(78);

        while word.iter().any(|b| *b != 0) {
            let mut remainder: u32 = 0;
            for byte in word.iter_mut() {
                let acc = (remainder << 8) | u32::from(*byte);
                *byte = (acc / 10) as u8;
                remainder = acc % 10;
            }
            digits.push(b'0' + remainder as u8);
        }

        if digits.is_empty() {
            return f.write_str("0");
        }

        digits.reverse();
        let rendered = std::str::from_utf8(&digits).map_err(|_| fmt::Error)?;
        f.write_str(rendered)
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Enumeration strategy decided once per snapshot run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EnumerationStrategy {
    /// Contract exposes `tokenByIndex`; ids are discovered by index.
    Indexed,
    /// Ids are assumed contiguous from 1; `ownerOf(index + 1)` is queried directly.
    Sequential,
    /// Neither probe succeeded.
    Unknown,
}

impl fmt::Display for EnumerationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EnumerationStrategy::Indexed => "indexed",
            EnumerationStrategy::Sequential => "sequential",
            EnumerationStrategy::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// One row of a collection snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipRecord {
    /// Position in the enumeration (0-based)
    #[serde(rename = "Index")]
    pub index: u64,
    /// Token id
    #[serde(rename = "Token ID")]
    pub token_id: TokenId,
    /// Owner address (0x-prefixed, lowercase)
    #[serde(rename = "Owner Address")]
    pub owner: String,
}

/// One marketplace listing row, flattened for tabular output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetRecord {
    /// Token id as reported by the marketplace
    #[serde(rename = "Token ID")]
    pub token_id: String,
    /// Display name
    #[serde(rename = "Name")]
    pub name: String,
    /// Description text
    #[serde(rename = "Description")]
    pub description: String,
    /// Rarity rank from the first rarity provider
    #[serde(rename = "Rarity Rank")]
    pub rarity_rank: Option<u64>,
    /// Name of the first rarity provider
    #[serde(rename = "Rarity Provider")]
    pub rarity_provider: Option<String>,
    /// Trait attributes encoded as JSON
    #[serde(rename = "Attributes (JSON)")]
    pub attributes: String,
    /// Main media URI
    #[serde(rename = "Image URL")]
    pub image_url: String,
    /// Floor ask price in native units
    #[serde(rename = "Market Price", with = "rust_decimal::serde::str_option")]
    pub market_price: Option<Decimal>,
    /// Floor ask currency symbol
    #[serde(rename = "Currency")]
    pub currency: String,
    /// Last sale price in native units
    #[serde(rename = "Last Sale Price", with = "rust_decimal::serde::str_option")]
    pub last_sale_price: Option<Decimal>,
    /// Last sale currency symbol
    #[serde(rename = "Last Sale Currency")]
    pub last_sale_currency: String,
    /// Current owner
    #[serde(rename = "Owner")]
    pub owner: Option<String>,
    /// Collection address the listing was requested for
    #[serde(rename = "Collection Address")]
    pub collection_address: String,
    /// Contract address reported by the marketplace
    #[serde(rename = "Contract Address")]
    pub contract_address: Option<String>,
    /// Chain name
    #[serde(rename = "Chain")]
    pub chain: String,
    /// Token standard (ERC721, ERC1155, ...)
    #[serde(rename = "Standard")]
    pub standard: Option<String>,
    /// Remaining supply for multi-edition tokens
    #[serde(rename = "Remaining Supply")]
    pub remaining_supply: Option<String>,
}
