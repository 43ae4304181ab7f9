//! Per-token artifact downloads
//!
//! Images are fetched from `<image base><id>.jpg` and metadata from
//! `<json base><id><extension>`, where the extension defaults to `.json` and may be
//! empty for hosts that serve bare ids.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::fetcher::http::HttpClient;
use crate::fetcher::{FetcherError, FetcherResult, ItemSource};

/// Image file extension, both remote and local
pub const IMAGE_EXTENSION: &str = ".jpg";

/// Default remote metadata extension
pub const DEFAULT_JSON_URL_EXTENSION: &str = ".json";

/// Item source over plain HTTP
#[derive(Debug, Clone)]
pub struct HttpItemSource {
    http: HttpClient,
    image_base_url: Option<String>,
    json_base_url: Option<String>,
    json_extension: String,
}

impl Default for HttpItemSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpItemSource {
    /// Source with no endpoints configured
    pub fn new() -> Self {
        Self {
            http: HttpClient::default(),
            image_base_url: None,
            json_base_url: None,
            json_extension: DEFAULT_JSON_URL_EXTENSION.to_string(),
        }
    }

    /// Base URL images are served from; the id and `.jpg` are appended verbatim
    pub fn with_image_base_url(mut self, base: impl Into<String>) -> Self {
        self.image_base_url = Some(base.into());
        self
    }

    /// Base URL metadata is served from
    pub fn with_json_base_url(mut self, base: impl Into<String>) -> Self {
        self.json_base_url = Some(base.into());
        self
    }

    /// Remote metadata extension (may be empty)
    pub fn with_json_extension(mut self, extension: impl Into<String>) -> Self {
        self.json_extension = extension.into();
        self
    }

    /// URL of the image for `id`
    pub fn image_url(&self, id: u64) -> FetcherResult<String> {
        let base = self
            .image_base_url
            .as_deref()
            .ok_or_else(|| FetcherError::BadRequest("image base URL not configured".to_string()))?;
        Ok(format!("{base}{id}{IMAGE_EXTENSION}"))
    }

    /// URL of the metadata document for `id`
    pub fn metadata_url(&self, id: u64) -> FetcherResult<String> {
        let base = self.json_base_url.as_deref().ok_or_else(|| {
            FetcherError::BadRequest("metadata base URL not configured".to_string())
        })?;
        Ok(format!("{base}{id}{}", self.json_extension))
    }
}

#[async_trait]
impl ItemSource for HttpItemSource {
    async fn fetch_image(&self, id: u64) -> FetcherResult<Bytes> {
        let url = self.image_url(id)?;
        self.http.get_bytes(&url).await
    }

    async fn fetch_metadata(&self, id: u64) -> FetcherResult<Value> {
        let url = self.metadata_url(id)?;
        self.http.get_json(&url, &[]).await
    }
}
