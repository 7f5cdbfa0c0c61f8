//! Two-tier result cache
//!
//! Every unit of work is memoized under its rendered cache key in one of two
//! namespaces:
//!
//! - [`Namespace::Raw`] - fetched page bytes ([`crate::proto::RawPage`])
//! - [`Namespace::Processed`] - the child contexts a handler produced
//!
//! ## Key Components
//!
//! - [`CacheBackend`] - async get/put/remove contract for a storage engine
//! - [`ObjectBackend`] - `object_store` backend (local filesystem or in-memory)
//! - [`FjallBackend`] - embedded LSM backend, one partition per namespace
//! - [`CacheStore`] - typed access with per-namespace enable switches
//! - [`Flights`] - per-key single-flight coordination
//!
//! ## Filesystem layout
//!
//! ```text
//! <root>/raw/<key>
//! <root>/processed/<key>
//! ```
//!
//! A `/` inside a key produces nested directories.

mod backend;
mod flight;
mod lsm;
mod store;

pub use backend::{CacheBackend, ObjectBackend};
pub use flight::Flights;
pub use lsm::FjallBackend;
pub use store::CacheStore;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache read failed for {namespace}/{key}: {reason}")]
    Read {
        namespace: Namespace,
        key: String,
        reason: String,
    },

    #[error("cache write failed for {namespace}/{key}: {reason}")]
    Write {
        namespace: Namespace,
        key: String,
        reason: String,
    },

    #[error("corrupt cache entry {namespace}/{key}: {reason}")]
    Decode {
        namespace: Namespace,
        key: String,
        reason: String,
    },

    #[error("invalid cache key: '{0}'")]
    InvalidKey(String),

    #[error("failed to open cache backend: {0}")]
    Open(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Raw,
    Processed,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Raw => "raw",
            Namespace::Processed => "processed",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Namespace::Raw),
            "processed" => Ok(Namespace::Processed),
            other => Err(format!("unknown cache namespace: {other}")),
        }
    }
}

/// Rejects keys that cannot address an entry
///
/// Every `/`-separated segment must be non-empty. Object paths collapse
/// empty segments, so `a//b`, `a/b/` and `a/b` would otherwise share one
/// file on disk.
pub(crate) fn check_key(key: &str) -> Result<()> {
    if key.split('/').any(str::is_empty) {
        return Err(CacheError::InvalidKey(key.to_string()));
    }
    Ok(())
}
