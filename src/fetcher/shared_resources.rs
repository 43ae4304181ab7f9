//! Shared resources for all data sources
//!
//! A single pooled HTTP client is shared by the listing, JSON-RPC and download
//! adapters so connections are reused across every request of a run.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Time allowed to establish a connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Time allowed for a whole request, body included
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Idle connections kept per host; one batch rarely needs more
const MAX_IDLE_PER_HOST: usize = 16;

/// User agent sent with every request
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Pooled client used by every adapter unless one is injected
///
/// A request that exceeds [`REQUEST_TIMEOUT`] surfaces as a retryable timeout.
pub static GLOBAL_HTTP_CLIENT: Lazy<Arc<Client>> = Lazy::new(|| {
    Arc::new(
        Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                panic!("FATAL: Failed to build HTTP client: {e}. Check system TLS configuration.");
            }),
    )
});

/// Handle to the shared client
pub fn global_http_client() -> Arc<Client> {
    GLOBAL_HTTP_CLIENT.clone()
}
