//! Traversal engine
//!
//! A [`Scraper`] turns seed contexts into a [`Run`]: a lazy, depth-first
//! walk that expands every non-terminal context through its handler and
//! yields the terminal contexts it reaches. Each child is merged over its
//! parent (child fields win, navigation fields are never inherited), so a
//! leaf carries everything gathered along its path.
//!
//! Expansion of a context with cache key `k`:
//!
//! 1. processed cache hit for `k` - children come straight from the cache
//! 2. otherwise fetch the page (raw cache first), run the handler and store
//!    the children under `k`
//!
//! Both steps are single-flighted per key, so concurrent expansions of the
//! same key fetch and process at most once. A failure abandons the subtree
//! of the failing context only; the rest of the traversal carries on and
//! the failure is reported through [`Run::failures`].

mod expand;
mod run;
pub mod seed;

pub use run::{ExpansionFailure, Run};

use std::sync::Arc;
use thiserror::Error;

use crate::cache::{CacheError, CacheStore};
use crate::config::{Config, EngineConfig};
use crate::context::Context;
use crate::fetcher::{FetchError, Fetcher, HttpOptions, HttpTransport, Transport};
use crate::handlers::{HandlerError, HandlerRegistry};
use crate::template::TemplateError;
use expand::Expander;

#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    #[error("cache key rendering failed: {0}")]
    Template(#[from] TemplateError),

    #[error("no handler registered for processor '{0}'")]
    HandlerNotFound(String),

    #[error("fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("handler '{processor}' failed: {source}")]
    Handler {
        processor: String,
        #[source]
        source: HandlerError,
    },

    #[error("context for processor '{processor}' has no url")]
    MissingUrl { processor: String },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("invalid seed: {0}")]
    Seed(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("expansion task aborted: {0}")]
    Aborted(String),
}

/// Entry point for traversals sharing one registry, cache and transport
///
/// Cheap to share: runs started from the same scraper also share its
/// single-flight tables, so overlapping runs never expand a key twice at
/// the same time.
pub struct Scraper {
    expander: Arc<Expander>,
    engine: EngineConfig,
}

impl Scraper {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        cache: CacheStore,
        transport: Arc<dyn Transport>,
        http: HttpOptions,
        engine: EngineConfig,
    ) -> Self {
        let fetcher = Fetcher::new(transport, cache.clone());
        let expander = Expander::new(registry, cache, fetcher, http, engine.retry);
        Self {
            expander: Arc::new(expander),
            engine,
        }
    }

    /// Builds a scraper over the configured cache backend and reqwest
    pub fn from_config(config: &Config, registry: HandlerRegistry) -> Result<Self, ScrapeError> {
        config
            .validate()
            .map_err(|e| ScrapeError::Config(e.to_string()))?;

        let cache = CacheStore::from_config(&config.cache)?;
        let transport = HttpTransport::new().map_err(|e| ScrapeError::Config(e.to_string()))?;

        Ok(Self::new(
            Arc::new(registry),
            cache,
            Arc::new(transport),
            HttpOptions::from(&config.http),
            config.engine.clone(),
        ))
    }

    /// Starts a traversal; nothing happens until the run is polled
    pub fn scrape<I>(&self, seed: I) -> Run
    where
        I: IntoIterator<Item = Context>,
    {
        Run::new(
            self.expander.clone(),
            self.engine.terminal_rule,
            self.engine.workers,
            seed.into_iter().collect(),
        )
    }

    pub fn cache(&self) -> &CacheStore {
        &self.expander.cache
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.expander.registry
    }
}

/// One-shot traversal with configuration-driven wiring
pub fn scrape<I>(seed: I, registry: HandlerRegistry, config: &Config) -> Result<Run, ScrapeError>
where
    I: IntoIterator<Item = Context>,
{
    Ok(Scraper::from_config(config, registry)?.scrape(seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TerminalRule;
    use crate::fetcher;
    use crate::handlers::{Document, HandlerError};
    use crate::proto::RawPage;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves fixed bodies per URL and counts every request
    #[derive(Default)]
    struct StaticTransport {
        pages: HashMap<String, String>,
        calls: AtomicUsize,
        delay: Option<Duration>,
        failing: Mutex<HashMap<String, usize>>,
    }

    impl StaticTransport {
        fn with_page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        /// Fails the first `times` requests for `url`
        fn failing(self, url: &str, times: usize) -> Self {
            self.failing.lock().unwrap().insert(url.to_string(), times);
            self
        }
    }

    #[async_trait]
    impl Transport for StaticTransport {
        async fn get(&self, url: &str, _options: &HttpOptions) -> fetcher::Result<RawPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            {
                let mut failing = self.failing.lock().unwrap();
                if let Some(left) = failing.get_mut(url) {
                    if *left > 0 {
                        *left -= 1;
                        return Err(FetchError::Timeout);
                    }
                }
            }
            let body = self.pages.get(url).ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })?;
            Ok(RawPage {
                url: url.to_string(),
                status: 200,
                content_type: "text/html".to_string(),
                body: body.as_bytes().to_vec(),
                fetched_at_ms: 0,
            })
        }
    }

    fn ctx(value: serde_json::Value) -> Context {
        Context::try_from(value).unwrap()
    }

    /// Each `<li data-n>` becomes a leaf child
    fn list_items(doc: &Document, _ctx: &Context) -> Result<Vec<Context>, HandlerError> {
        Ok(doc
            .select_attr("li", "data-n")?
            .into_iter()
            .map(|n| Context::new().with("n", n))
            .collect())
    }

    fn scraper(registry: HandlerRegistry, transport: Arc<StaticTransport>, engine: EngineConfig) -> Scraper {
        Scraper::new(
            Arc::new(registry),
            CacheStore::in_memory(),
            transport,
            HttpOptions::default(),
            engine,
        )
    }

    #[tokio::test]
    async fn test_run_is_lazy() {
        let transport = Arc::new(StaticTransport::default().with_page("https://a/", "<li data-n=1>"));
        let mut registry = HandlerRegistry::new();
        registry.register_fn("list", "list", list_items).unwrap();

        let scraper = scraper(registry, transport.clone(), EngineConfig::default());
        let run = scraper.scrape([ctx(json!({"url": "https://a/", "processor": "list"}))]);

        tokio::task::yield_now().await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        drop(run);
    }

    #[tokio::test]
    async fn test_terminal_seed_passes_through() {
        let transport = Arc::new(StaticTransport::default());
        let scraper = scraper(HandlerRegistry::new(), transport.clone(), EngineConfig::default());

        let mut run = scraper.scrape([ctx(json!({"a": 1}))]);
        assert_eq!(run.collect_all().await, vec![ctx(json!({"a": 1}))]);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_terminal_rule_missing_url() {
        let transport = Arc::new(StaticTransport::default());
        let mut registry = HandlerRegistry::new();
        registry.register_fn("list", "k", list_items).unwrap();

        let engine = EngineConfig {
            terminal_rule: TerminalRule::MissingProcessorOrUrl,
            ..EngineConfig::default()
        };
        let scraper = scraper(registry, transport, engine);

        let seed = ctx(json!({"processor": "list"}));
        let mut run = scraper.scrape([seed.clone()]);
        assert_eq!(run.collect_all().await, vec![seed]);
        assert!(run.failures().is_empty());
    }

    #[tokio::test]
    async fn test_missing_url_fails_subtree() {
        let transport = Arc::new(StaticTransport::default());
        let mut registry = HandlerRegistry::new();
        registry.register_fn("list", "k", list_items).unwrap();
        let scraper = scraper(registry, transport, EngineConfig::default());

        let mut run = scraper.scrape([ctx(json!({"processor": "list"})), ctx(json!({"x": 1}))]);
        assert_eq!(run.collect_all().await, vec![ctx(json!({"x": 1}))]);
        assert!(matches!(
            run.failures()[0].error,
            ScrapeError::MissingUrl { .. }
        ));
    }

    #[tokio::test]
    async fn test_retry_recovers_transient_failure() {
        let transport = Arc::new(
            StaticTransport::default()
                .with_page("https://a/", "<li data-n=1>")
                .failing("https://a/", 2),
        );
        let mut registry = HandlerRegistry::new();
        registry.register_fn("list", "list", list_items).unwrap();

        let mut engine = EngineConfig::default();
        engine.retry.max_retries = 2;
        engine.retry.backoff_ms = 1;
        let scraper = scraper(registry, transport.clone(), engine);

        let mut run = scraper.scrape([ctx(json!({"url": "https://a/", "processor": "list"}))]);
        assert_eq!(run.collect_all().await, vec![ctx(json!({"n": "1"}))]);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let transport = Arc::new(
            StaticTransport::default()
                .with_page("https://a/", "<li data-n=1>")
                .failing("https://a/", 5),
        );
        let mut registry = HandlerRegistry::new();
        registry.register_fn("list", "list", list_items).unwrap();

        let mut engine = EngineConfig::default();
        engine.retry.max_retries = 1;
        engine.retry.backoff_ms = 1;
        let scraper = scraper(registry, transport.clone(), engine);

        let mut run = scraper.scrape([ctx(json!({"url": "https://a/", "processor": "list"}))]);
        assert!(run.collect_all().await.is_empty());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
        assert!(matches!(
            run.failures()[0].error,
            ScrapeError::Fetch {
                source: FetchError::Timeout,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_output_order_independent_of_workers() {
        let transport = Arc::new(
            StaticTransport {
                delay: Some(Duration::from_millis(5)),
                ..StaticTransport::default()
            }
            .with_page("https://a/", "<li data-n=1><li data-n=2>")
            .with_page("https://b/", "<li data-n=3>")
            .with_page("https://c/", "<li data-n=4><li data-n=5>"),
        );

        let mut orders = Vec::new();
        for workers in [1, 2, 8] {
            let mut registry = HandlerRegistry::new();
            registry.register_fn("list", "list/:page", list_items).unwrap();
            let engine = EngineConfig {
                workers,
                ..EngineConfig::default()
            };
            let scraper = scraper(registry, transport.clone(), engine);

            let seed = ["a", "b", "c"].map(|page| {
                ctx(json!({"url": format!("https://{page}/"), "processor": "list", "page": page}))
            });
            let leaves = scraper.scrape(seed).collect_all().await;
            orders.push(
                leaves
                    .iter()
                    .map(|leaf| leaf.get("n").cloned().unwrap())
                    .collect::<Vec<_>>(),
            );
        }

        assert_eq!(orders[0], vec![json!("1"), json!("2"), json!("3"), json!("4"), json!("5")]);
        assert_eq!(orders[0], orders[1]);
        assert_eq!(orders[0], orders[2]);
    }
}
