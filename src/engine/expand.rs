//! Expansion of a single context: processed cache, fetch, handler

use std::sync::Arc;
use tracing::{debug, warn};

use super::ScrapeError;
use crate::cache::{CacheStore, Flights};
use crate::config::RetryPolicy;
use crate::context::Context;
use crate::fetcher::{Fetcher, HttpOptions};
use crate::handlers::{Document, Handler, HandlerRegistry};
use crate::observability::RunStats;
use crate::proto::RawPage;

pub(crate) type Children = Arc<Vec<Context>>;

/// Shared by every task of every run started from one scraper
pub(crate) struct Expander {
    pub(crate) registry: Arc<HandlerRegistry>,
    pub(crate) cache: CacheStore,
    fetcher: Fetcher,
    http: HttpOptions,
    retry: RetryPolicy,
    flights: Flights<Result<Children, ScrapeError>>,
}

impl Expander {
    pub(crate) fn new(
        registry: Arc<HandlerRegistry>,
        cache: CacheStore,
        fetcher: Fetcher,
        http: HttpOptions,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            cache,
            fetcher,
            http,
            retry,
            flights: Flights::new(),
        }
    }

    /// Child contexts for `ctx`, computed at most once per key in flight
    pub(crate) async fn expand(
        self: Arc<Self>,
        handler: Arc<Handler>,
        key: String,
        ctx: Context,
        stats: Arc<RunStats>,
    ) -> Result<Children, ScrapeError> {
        self.flights
            .run(&key, || self.compute(&handler, &key, &ctx, &stats))
            .await
    }

    async fn compute(
        &self,
        handler: &Handler,
        key: &str,
        ctx: &Context,
        stats: &RunStats,
    ) -> Result<Children, ScrapeError> {
        stats.expansion_started();

        match self.cache.get_processed(key).await {
            Ok(Some(children)) => {
                debug!(key, processor = handler.id(), "Processed cache hit");
                stats.processed_hit();
                return Ok(Arc::new(children));
            }
            Ok(None) => debug!(key, processor = handler.id(), "Processed cache miss"),
            Err(e) => warn!(key, error = %e, "Processed cache read failed, treating as miss"),
        }

        let url = ctx.url().ok_or_else(|| ScrapeError::MissingUrl {
            processor: handler.id().to_string(),
        })?;

        let options = self.http.with_overrides(handler.options());
        let page = self.fetch_with_retry(key, url, &options, stats).await?;

        stats.handler_called();
        let children = process_page(handler, &page, ctx)?;

        if let Err(e) = self.cache.put_processed(key, &children).await {
            stats.cache_write_failed();
            warn!(key, error = %e, "Failed to store processed result, key stays uncached");
        }

        Ok(Arc::new(children))
    }

    async fn fetch_with_retry(
        &self,
        key: &str,
        url: &str,
        options: &HttpOptions,
        stats: &RunStats,
    ) -> Result<Arc<RawPage>, ScrapeError> {
        let mut attempt = 0;
        loop {
            match self.fetcher.fetch(key, url, options, stats).await {
                Ok(page) => return Ok(page),
                Err(e) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    let backoff = self.retry.backoff(attempt);
                    warn!(url, attempt, error = %e, ?backoff, "Fetch failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(source) => {
                    return Err(ScrapeError::Fetch {
                        url: url.to_string(),
                        source,
                    });
                }
            }
        }
    }
}

/// Parses the page and runs the handler; the document never crosses an await
fn process_page(handler: &Handler, page: &RawPage, ctx: &Context) -> Result<Vec<Context>, ScrapeError> {
    let doc = Document::from_page(page);
    handler
        .process(&doc, ctx)
        .map_err(|source| ScrapeError::Handler {
            processor: handler.id().to_string(),
            source,
        })
}
