use bytes::Bytes;
use prost::Message;
use std::sync::Arc;
use tracing::debug;

use super::{CacheBackend, CacheError, FjallBackend, Namespace, ObjectBackend, Result};
use crate::config::{CacheBackendKind, CacheConfig};
use crate::context::Context;
use crate::proto::RawPage;

/// Typed access to both cache namespaces
///
/// Each namespace can be switched off on its own. A disabled namespace
/// reports every key as absent and drops writes without touching the
/// backend.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    raw_enabled: bool,
    processed_enabled: bool,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, raw_enabled: bool, processed_enabled: bool) -> Self {
        Self {
            backend,
            raw_enabled,
            processed_enabled,
        }
    }

    /// Opens the backend named by `config`
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let backend: Arc<dyn CacheBackend> = match config.backend {
            CacheBackendKind::Fs => Arc::new(ObjectBackend::local(&config.root)?),
            CacheBackendKind::Fjall => Arc::new(FjallBackend::open(&config.root)?),
            CacheBackendKind::Memory => Arc::new(ObjectBackend::in_memory()),
        };
        Ok(Self::new(backend, config.raw_enabled, config.processed_enabled))
    }

    /// Both namespaces enabled, kept in memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(ObjectBackend::in_memory()), true, true)
    }

    pub fn is_enabled(&self, namespace: Namespace) -> bool {
        match namespace {
            Namespace::Raw => self.raw_enabled,
            Namespace::Processed => self.processed_enabled,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn get_raw(&self, key: &str) -> Result<Option<RawPage>> {
        let Some(bytes) = self.read(Namespace::Raw, key).await? else {
            return Ok(None);
        };

        RawPage::decode(bytes)
            .map(Some)
            .map_err(|e| CacheError::Decode {
                namespace: Namespace::Raw,
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    pub async fn put_raw(&self, key: &str, page: &RawPage) -> Result<()> {
        self.write(Namespace::Raw, key, Bytes::from(page.encode_to_vec()))
            .await
    }

    pub async fn get_processed(&self, key: &str) -> Result<Option<Vec<Context>>> {
        let Some(bytes) = self.read(Namespace::Processed, key).await? else {
            return Ok(None);
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::Decode {
                namespace: Namespace::Processed,
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    pub async fn put_processed(&self, key: &str, children: &[Context]) -> Result<()> {
        let value = serde_json::to_vec(children).map_err(|e| CacheError::Write {
            namespace: Namespace::Processed,
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.write(Namespace::Processed, key, Bytes::from(value)).await
    }

    /// Manual invalidation; ignores the enable switches
    pub async fn invalidate(&self, namespace: Namespace, key: &str) -> Result<bool> {
        self.backend.remove(namespace, key).await
    }

    /// Raw bytes of an entry; ignores the enable switches
    pub async fn inspect(&self, namespace: Namespace, key: &str) -> Result<Option<Bytes>> {
        self.backend.get(namespace, key).await
    }

    async fn read(&self, namespace: Namespace, key: &str) -> Result<Option<Bytes>> {
        if !self.is_enabled(namespace) {
            debug!(%namespace, key, "Cache namespace disabled, skipping read");
            return Ok(None);
        }
        self.backend.get(namespace, key).await
    }

    async fn write(&self, namespace: Namespace, key: &str, value: Bytes) -> Result<()> {
        if !self.is_enabled(namespace) {
            return Ok(());
        }
        self.backend.put(namespace, key, value).await
    }
}
