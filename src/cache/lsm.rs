use async_trait::async_trait;
use bytes::Bytes;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use std::path::Path;
use tracing::{debug, info};

use super::{CacheBackend, CacheError, Namespace, Result, check_key};

/// Fjall-backed cache: one keyspace, one partition per namespace
///
/// Keys are stored verbatim, so `/` carries no structure here. Each insert
/// is a single atomic write.
#[derive(Clone)]
pub struct FjallBackend {
    keyspace: Keyspace,
    raw: PartitionHandle,
    processed: PartitionHandle,
}

impl FjallBackend {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening Fjall cache at: {}", path.display());

        let open_err = |e: fjall::Error| CacheError::Open(e.to_string());

        let keyspace = Config::new(path).open().map_err(open_err)?;
        let raw = keyspace
            .open_partition("raw", PartitionCreateOptions::default())
            .map_err(open_err)?;
        let processed = keyspace
            .open_partition("processed", PartitionCreateOptions::default())
            .map_err(open_err)?;

        Ok(Self {
            keyspace,
            raw,
            processed,
        })
    }

    fn partition(&self, namespace: Namespace) -> &PartitionHandle {
        match namespace {
            Namespace::Raw => &self.raw,
            Namespace::Processed => &self.processed,
        }
    }

    /// Flush all writes to disk
    pub fn flush(&self) -> Result<()> {
        self.keyspace
            .persist(fjall::PersistMode::SyncAll)
            .map_err(|e| CacheError::Write {
                namespace: Namespace::Processed,
                key: String::new(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl CacheBackend for FjallBackend {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Bytes>> {
        check_key(key)?;
        let value = self
            .partition(namespace)
            .get(key.as_bytes())
            .map_err(|e| CacheError::Read {
                namespace,
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        Ok(value.map(|slice| Bytes::copy_from_slice(&slice)))
    }

    async fn put(&self, namespace: Namespace, key: &str, value: Bytes) -> Result<()> {
        check_key(key)?;
        self.partition(namespace)
            .insert(key.as_bytes(), &value[..])
            .map_err(|e| CacheError::Write {
                namespace,
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        debug!(%namespace, key, size = value.len(), "Cache entry written");
        Ok(())
    }

    async fn remove(&self, namespace: Namespace, key: &str) -> Result<bool> {
        check_key(key)?;
        let partition = self.partition(namespace);
        let write_err = |e: fjall::Error| CacheError::Write {
            namespace,
            key: key.to_string(),
            reason: e.to_string(),
        };

        let existed = partition.contains_key(key.as_bytes()).map_err(write_err)?;
        if existed {
            partition.remove(key.as_bytes()).map_err(write_err)?;
        }
        Ok(existed)
    }

    fn name(&self) -> &'static str {
        "fjall"
    }
}
