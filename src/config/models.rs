use crate::context::TerminalRule;
use crate::handlers::HeadersMap;
use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Cache backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Filesystem tree under `root`
    #[default]
    Fs,
    /// Fjall keyspace under `root`
    Fjall,
    /// Process memory, lost on exit
    Memory,
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendKind,
    #[serde(default = "default_cache_root")]
    pub root: PathBuf,
    #[serde(default = "default_true")]
    pub processed_enabled: bool,
    #[serde(default = "default_true")]
    pub raw_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            root: default_cache_root(),
            processed_enabled: true,
            raw_enabled: true,
        }
    }
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("data/cache")
}

fn default_true() -> bool {
    true
}

/// HTTP options applied to every fetch unless a handler overrides them
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_true")]
    pub decompress: bool,
    #[serde(default = "default_socket_timeout_ms")]
    pub socket_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub decode_charset: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: ByteSize,
    #[serde(default)]
    pub headers: HeadersMap,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            decompress: true,
            socket_timeout_ms: default_socket_timeout_ms(),
            decode_charset: true,
            user_agent: default_user_agent(),
            max_body_bytes: default_max_body_bytes(),
            headers: HeadersMap::new(),
        }
    }
}

fn default_socket_timeout_ms() -> u64 {
    5000
}

fn default_user_agent() -> String {
    format!("scrapetree/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_body_bytes() -> ByteSize {
    ByteSize(10 * 1024 * 1024) // 10 MB
}

/// Traversal engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Expansions allowed to run concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub terminal_rule: TerminalRule,
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            terminal_rule: TerminalRule::default(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_workers() -> usize {
    4
}

/// Retry policy for failed fetches; no retries by default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryPolicy {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): backoff, 2x, 4x, ...
    pub fn backoff(&self, attempt: u32) -> std::time::Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        std::time::Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

fn default_backoff_ms() -> u64 {
    500
}
