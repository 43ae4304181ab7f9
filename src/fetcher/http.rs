//! Single-attempt HTTP helper shared by the adapters
//!
//! Every call issues exactly one request and maps the outcome onto [`FetcherError`]:
//!
//! - 200: success
//! - 429: [`FetcherError::RateLimited`]
//! - 400: [`FetcherError::BadRequest`]
//! - 404: [`FetcherError::NotFound`]
//! - 5xx: [`FetcherError::Server`]
//! - anything else: [`FetcherError::HttpStatus`]
//!
//! Retrying and pacing belong to the engine, not to this client.

use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::fetcher::shared_resources::global_http_client;
use crate::fetcher::{FetcherError, FetcherResult};
use crate::metrics::HttpRequestMetrics;

/// Longest response body excerpt kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Thin wrapper over a shared [`reqwest::Client`]
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    bearer_token: Option<String>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(global_http_client())
    }
}

impl HttpClient {
    /// Wrap an existing client
    pub fn new(client: Arc<Client>) -> Self {
        Self {
            client,
            bearer_token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// GET and decode a JSON body
    pub async fn get_json<T>(&self, url: &str, params: &[(&str, String)]) -> FetcherResult<T>
    where
        T: DeserializeOwned,
    {
        let request = self.client.get(url).query(params).header("Accept", "*/*");
        let response = self.send(url, request).await?;
        decode_json(response).await
    }

    /// GET a raw body
    pub async fn get_bytes(&self, url: &str) -> FetcherResult<Bytes> {
        let response = self.send(url, self.client.get(url)).await?;
        response.bytes().await.map_err(map_reqwest_error)
    }

    /// POST a JSON body and decode a JSON response
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> FetcherResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(url, self.client.post(url).json(body)).await?;
        decode_json(response).await
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> FetcherResult<Response> {
        let request = match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let metrics = HttpRequestMetrics::start(endpoint_label(url));

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics.record_network_error();
                return Err(map_reqwest_error(e));
            }
        };

        let status = response.status();
        metrics.record_complete(status.as_u16());

        if status == StatusCode::OK {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(
            correlation_id = %metrics.correlation_id(),
            status = status.as_u16(),
            "Non-success response"
        );
        Err(classify_status(status, &body))
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> FetcherResult<T> {
    let body = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&body)
        .map_err(|e| FetcherError::Parse(format!("failed to deserialize response: {e}")))
}

/// Map a non-200 status onto the error taxonomy
pub fn classify_status(status: StatusCode, body: &str) -> FetcherError {
    let message = excerpt(body, status);
    match status.as_u16() {
        429 => FetcherError::RateLimited,
        400 => FetcherError::BadRequest(message),
        404 => FetcherError::NotFound(message),
        code if status.is_server_error() => FetcherError::Server {
            status: code,
            message,
        },
        code => FetcherError::HttpStatus {
            status: code,
            message,
        },
    }
}

/// Map a transport failure onto the error taxonomy
pub fn map_reqwest_error(err: reqwest::Error) -> FetcherError {
    if err.is_timeout() {
        FetcherError::Timeout(err.to_string())
    } else if err.is_decode() {
        FetcherError::Parse(err.to_string())
    } else {
        FetcherError::Network(err.to_string())
    }
}

fn excerpt(body: &str, status: StatusCode) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

fn endpoint_label(url: &str) -> String {
    reqwest::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}
