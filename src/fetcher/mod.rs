//! Page fetching behind the raw-page cache
//!
//! [`Fetcher::fetch`] consults the raw cache under the same key the
//! processed cache uses, and only reaches the network on a miss. Network
//! access goes through the [`Transport`] trait; [`HttpTransport`] is the
//! reqwest implementation.

pub mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheStore, Flights};
use crate::config::HttpConfig;
use crate::handlers::{FetchOptions, HeadersMap};
use crate::observability::RunStats;
use crate::proto::RawPage;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Too many redirects")]
    TooManyRedirects,

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Response body exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Fully resolved options for a single request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOptions {
    /// Transparent gzip/brotli/deflate decoding
    pub decompress: bool,
    pub socket_timeout: Duration,
    /// Decode text bodies through the Content-Type charset
    pub decode_charset: bool,
    pub user_agent: String,
    pub max_body_bytes: u64,
    pub headers: HeadersMap,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

impl From<&HttpConfig> for HttpOptions {
    fn from(config: &HttpConfig) -> Self {
        Self {
            decompress: config.decompress,
            socket_timeout: Duration::from_millis(config.socket_timeout_ms),
            decode_charset: config.decode_charset,
            user_agent: config.user_agent.clone(),
            max_body_bytes: config.max_body_bytes.as_u64(),
            headers: config.headers.clone(),
        }
    }
}

impl HttpOptions {
    /// Applies a handler's overrides on top of these options
    pub fn with_overrides(&self, overrides: &FetchOptions) -> Self {
        let mut headers = self.headers.clone();
        headers.extend(overrides.headers.clone());

        Self {
            decompress: overrides.decompress.unwrap_or(self.decompress),
            socket_timeout: overrides.socket_timeout.unwrap_or(self.socket_timeout),
            decode_charset: overrides.decode_charset.unwrap_or(self.decode_charset),
            user_agent: overrides
                .user_agent
                .clone()
                .unwrap_or_else(|| self.user_agent.clone()),
            max_body_bytes: overrides.max_body_bytes.unwrap_or(self.max_body_bytes),
            headers,
        }
    }
}

/// Network capability: fetch the bytes behind a URL
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, options: &HttpOptions) -> Result<RawPage>;
}

/// Raw-cache-first page fetcher
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    cache: CacheStore,
    flights: Flights<Result<Arc<RawPage>>>,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, cache: CacheStore) -> Self {
        Self {
            transport,
            cache,
            flights: Flights::new(),
        }
    }

    /// Fetch the page for `key`, at most one network call per key in flight.
    ///
    /// Not retried here; retry policy belongs to the engine.
    pub async fn fetch(
        &self,
        key: &str,
        url: &str,
        options: &HttpOptions,
        stats: &RunStats,
    ) -> Result<Arc<RawPage>> {
        self.flights
            .run(key, || self.fetch_uncoordinated(key, url, options, stats))
            .await
    }

    async fn fetch_uncoordinated(
        &self,
        key: &str,
        url: &str,
        options: &HttpOptions,
        stats: &RunStats,
    ) -> Result<Arc<RawPage>> {
        match self.cache.get_raw(key).await {
            Ok(Some(page)) => {
                debug!(key, url, "Raw cache hit");
                stats.raw_hit();
                return Ok(Arc::new(page));
            }
            Ok(None) => debug!(key, url, "Raw cache miss"),
            Err(e) => warn!(key, error = %e, "Raw cache read failed, treating as miss"),
        }

        stats.network_fetch();
        let page = self.transport.get(url, options).await?;

        if let Err(e) = self.cache.put_raw(key, &page).await {
            stats.cache_write_failed();
            warn!(key, error = %e, "Failed to store raw page");
        }

        Ok(Arc::new(page))
    }
}
