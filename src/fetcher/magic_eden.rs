//! Magic Eden collection-assets listing adapter
//!
//! Wraps `GET /evm-public/assets/collection-assets` and flattens each entry into an
//! [`AssetRecord`]. One call to [`ListingSource::fetch_page`] is one HTTP request.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::downloader::job::PageRequest;
use crate::fetcher::http::HttpClient;
use crate::fetcher::{FetcherResult, ListingPage, ListingSource};
use crate::identifier::CollectionIdentifier;
use crate::AssetRecord;

/// Production API base URL
pub const DEFAULT_BASE_URL: &str = "https://api-mainnet.magiceden.dev/v4";

/// Collection assets endpoint, relative to the base URL
pub const ASSETS_ENDPOINT: &str = "/evm-public/assets/collection-assets";

/// Default sort field
pub const DEFAULT_SORT_BY: &str = "price";

/// Default sort direction
pub const DEFAULT_SORT_DIR: &str = "asc";

/// Currency symbol used when the response names none
const FALLBACK_CURRENCY: &str = "ETH";

/// Raw page as returned by the API
#[derive(Debug, Deserialize)]
pub struct AssetsResponse {
    /// Entries on this page
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
    /// Token for the next page
    #[serde(default)]
    pub continuation: Option<String>,
}

/// One listing entry
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    /// Token details
    #[serde(default)]
    pub asset: Asset,
    /// Lowest active ask
    #[serde(default)]
    pub floor_ask: Option<PriceHolder>,
}

/// Token details
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Token id (string or number upstream)
    #[serde(default)]
    pub token_id: Option<Value>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Description
    #[serde(default)]
    pub description: Option<String>,
    /// Rarity rankings by provider
    #[serde(default)]
    pub rarity: Vec<Rarity>,
    /// Trait attributes, passed through as JSON
    #[serde(default)]
    pub attributes: Option<Value>,
    /// Media links
    #[serde(default)]
    pub media_v2: Option<Media>,
    /// Last sale
    #[serde(default)]
    pub last_sale_price: Option<Price>,
    /// Current owner
    #[serde(default)]
    pub owner: Option<String>,
    /// Contract address
    #[serde(default)]
    pub contract_address: Option<String>,
    /// Token standard
    #[serde(default)]
    pub standard: Option<String>,
    /// Remaining supply (string or number upstream)
    #[serde(default)]
    pub remaining_supply: Option<Value>,
}

/// Rarity ranking
#[derive(Debug, Deserialize)]
pub struct Rarity {
    /// Rank (1 = rarest)
    #[serde(default)]
    pub rank: Option<u64>,
    /// Ranking provider
    #[serde(default)]
    pub provider: Option<String>,
}

/// Media links
#[derive(Debug, Deserialize)]
pub struct Media {
    /// Primary media
    #[serde(default)]
    pub main: Option<MediaItem>,
}

/// Single media item
#[derive(Debug, Deserialize)]
pub struct MediaItem {
    /// URI
    #[serde(default)]
    pub uri: Option<String>,
}

/// Wrapper holding a price
#[derive(Debug, Deserialize)]
pub struct PriceHolder {
    /// Price
    #[serde(default)]
    pub price: Option<Price>,
}

/// Price with currency
#[derive(Debug, Deserialize)]
pub struct Price {
    /// Amount
    #[serde(default)]
    pub amount: Option<Amount>,
    /// Currency
    #[serde(default)]
    pub currency: Option<Currency>,
}

/// Amount in several denominations
#[derive(Debug, Deserialize)]
pub struct Amount {
    /// Amount in native units (string or number upstream)
    #[serde(default)]
    pub native: Option<Value>,
}

/// Currency descriptor
#[derive(Debug, Deserialize)]
pub struct Currency {
    /// Ticker symbol
    #[serde(default)]
    pub symbol: Option<String>,
}

impl Price {
    fn native(&self) -> Option<Decimal> {
        self.amount.as_ref()?.native.as_ref().and_then(decimal_from_value)
    }

    fn symbol(&self) -> Option<&str> {
        self.currency.as_ref()?.symbol.as_deref()
    }
}

/// Listing source backed by the Magic Eden API
#[derive(Debug)]
pub struct MagicEdenSource {
    http: HttpClient,
    base_url: String,
    collection: CollectionIdentifier,
    sort_by: String,
    sort_dir: String,
    position: AtomicU64,
}

impl MagicEdenSource {
    /// Source for `collection` against the production API
    pub fn new(collection: CollectionIdentifier) -> Self {
        Self {
            http: HttpClient::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            collection,
            sort_by: DEFAULT_SORT_BY.to_string(),
            sort_dir: DEFAULT_SORT_DIR.to_string(),
            position: AtomicU64::new(0),
        }
    }

    /// Override the base URL (trailing slashes are trimmed)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Authenticate with an API key
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.http = self.http.with_bearer_token(api_key);
        self
    }

    /// Sort order
    pub fn with_sort(mut self, sort_by: impl Into<String>, sort_dir: impl Into<String>) -> Self {
        self.sort_by = sort_by.into();
        self.sort_dir = sort_dir.into();
        self
    }

    /// Collection being listed
    pub fn collection(&self) -> &CollectionIdentifier {
        &self.collection
    }

    fn params(&self, request: &PageRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("chain", self.collection.chain().to_string()),
            ("collectionId", self.collection.address().to_string()),
            ("limit", request.page_size.to_string()),
            ("sortBy", self.sort_by.clone()),
            ("sortDir", self.sort_dir.clone()),
        ];
        if let Some(cursor) = &request.cursor {
            params.push(("continuation", cursor.clone()));
        }
        params
    }

    /// Flatten one entry; `position` is its 0-based position across the whole listing
    pub fn to_record(&self, entry: AssetEntry, position: u64) -> AssetRecord {
        let AssetEntry { asset, floor_ask } = entry;
        let floor_price = floor_ask.and_then(|holder| holder.price);

        let token_id = asset
            .token_id
            .as_ref()
            .and_then(value_to_string)
            .unwrap_or_else(|| (position + 1).to_string());

        let name = asset
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("Token #{token_id}"));

        let (rarity_rank, rarity_provider) = asset
            .rarity
            .first()
            .map(|r| (r.rank, r.provider.clone()))
            .unwrap_or((None, None));

        let attributes = asset
            .attributes
            .as_ref()
            .filter(|v| !v.is_null())
            .map(Value::to_string)
            .unwrap_or_else(|| "[]".to_string());

        let image_url = asset
            .media_v2
            .as_ref()
            .and_then(|m| m.main.as_ref())
            .and_then(|m| m.uri.clone())
            .unwrap_or_default();

        let market_price = floor_price.as_ref().and_then(Price::native);
        let currency = floor_price
            .as_ref()
            .and_then(Price::symbol)
            .or_else(|| asset.last_sale_price.as_ref().and_then(Price::symbol))
            .unwrap_or(FALLBACK_CURRENCY)
            .to_string();

        let last_sale_price = asset.last_sale_price.as_ref().and_then(Price::native);
        let last_sale_currency = asset
            .last_sale_price
            .as_ref()
            .and_then(Price::symbol)
            .unwrap_or(FALLBACK_CURRENCY)
            .to_string();

        AssetRecord {
            token_id,
            name,
            description: asset.description.unwrap_or_default(),
            rarity_rank,
            rarity_provider,
            attributes,
            image_url,
            market_price,
            currency,
            last_sale_price,
            last_sale_currency,
            owner: asset.owner,
            collection_address: self.collection.address().to_string(),
            contract_address: asset.contract_address,
            chain: self.collection.chain().to_string(),
            standard: asset.standard,
            remaining_supply: asset.remaining_supply.as_ref().and_then(value_to_string),
        }
    }
}

#[async_trait]
impl ListingSource for MagicEdenSource {
    type Item = AssetRecord;

    async fn fetch_page(&self, request: &PageRequest) -> FetcherResult<ListingPage<AssetRecord>> {
        let url = format!("{}{}", self.base_url, ASSETS_ENDPOINT);
        let response: AssetsResponse = self.http.get_json(&url, &self.params(request)).await?;

        let first = self
            .position
            .fetch_add(response.assets.len() as u64, Ordering::SeqCst);
        let items = response
            .assets
            .into_iter()
            .zip(first..)
            .map(|(entry, position)| self.to_record(entry, position))
            .collect();

        Ok(ListingPage {
            items,
            continuation: response.continuation.filter(|c| !c.is_empty()),
        })
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    let text = value_to_string(value)?;
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
