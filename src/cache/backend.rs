use async_trait::async_trait;
use bytes::Bytes;
use object_store::{ObjectStore, local::LocalFileSystem, memory::InMemory, path::Path as StoragePath};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{CacheError, Namespace, Result, check_key};

/// Storage engine behind the cache store
///
/// Implementations must make `put` atomic per key: a reader either sees the
/// previous value or the complete new one.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Bytes>>;

    async fn put(&self, namespace: Namespace, key: &str, value: Bytes) -> Result<()>;

    /// Returns whether an entry existed
    async fn remove(&self, namespace: Namespace, key: &str) -> Result<bool>;

    fn name(&self) -> &'static str;
}

/// Cache backend wrapping any `object_store` implementation
#[derive(Clone)]
pub struct ObjectBackend {
    store: Arc<dyn ObjectStore>,
    name: &'static str,
}

impl ObjectBackend {
    pub fn new(store: Arc<dyn ObjectStore>, name: &'static str) -> Self {
        Self { store, name }
    }

    /// Filesystem backend rooted at `root`, created if missing
    pub fn local<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)
            .map_err(|e| CacheError::Open(format!("{}: {}", root.display(), e)))?;

        let store = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| CacheError::Open(e.to_string()))?;

        info!(root = %root.display(), "Opened filesystem cache");
        Ok(Self::new(Arc::new(store), "fs"))
    }

    /// In-memory backend for tests and throwaway runs
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "memory")
    }

    fn path(namespace: Namespace, key: &str) -> StoragePath {
        StoragePath::from(format!("{}/{}", namespace.as_str(), key))
    }
}

#[async_trait]
impl CacheBackend for ObjectBackend {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Bytes>> {
        check_key(key)?;
        let path = Self::path(namespace, key);

        let read_err = |e: object_store::Error| CacheError::Read {
            namespace,
            key: key.to_string(),
            reason: e.to_string(),
        };

        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(read_err(e)),
        };

        let bytes = result.bytes().await.map_err(read_err)?;
        debug!(%namespace, key, size = bytes.len(), "Cache entry read");
        Ok(Some(bytes))
    }

    async fn put(&self, namespace: Namespace, key: &str, value: Bytes) -> Result<()> {
        check_key(key)?;
        let path = Self::path(namespace, key);
        let size = value.len();

        self.store
            .put(&path, value.into())
            .await
            .map_err(|e| CacheError::Write {
                namespace,
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        debug!(%namespace, key, size, "Cache entry written");
        Ok(())
    }

    async fn remove(&self, namespace: Namespace, key: &str) -> Result<bool> {
        check_key(key)?;
        let path = Self::path(namespace, key);

        let write_err = |e: object_store::Error| CacheError::Write {
            namespace,
            key: key.to_string(),
            reason: e.to_string(),
        };

        match self.store.head(&path).await {
            Ok(_) => {}
            Err(object_store::Error::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(write_err(e)),
        }

        self.store.delete(&path).await.map_err(write_err)?;
        Ok(true)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let backend = ObjectBackend::in_memory();

        assert!(backend.get(Namespace::Raw, "a/b").await.unwrap().is_none());
        backend
            .put(Namespace::Raw, "a/b", Bytes::from_static(b"page"))
            .await
            .unwrap();

        let value = backend.get(Namespace::Raw, "a/b").await.unwrap().unwrap();
        assert_eq!(&value[..], b"page");
    }

    #[tokio::test]
    async fn test_namespaces_are_independent() {
        let backend = ObjectBackend::in_memory();
        backend
            .put(Namespace::Raw, "k", Bytes::from_static(b"raw"))
            .await
            .unwrap();

        assert!(backend.get(Namespace::Processed, "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_local_layout_is_hierarchical() {
        let temp_dir = TempDir::new().unwrap();
        let backend = ObjectBackend::local(temp_dir.path()).unwrap();

        backend
            .put(Namespace::Processed, "mysite/Doe/John", Bytes::from_static(b"[]"))
            .await
            .unwrap();

        let on_disk = temp_dir.path().join("processed").join("mysite").join("Doe").join("John");
        assert!(on_disk.is_file());
        assert_eq!(std::fs::read(on_disk).unwrap(), b"[]");
    }

    #[tokio::test]
    async fn test_local_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let backend = ObjectBackend::local(temp_dir.path()).unwrap();
            backend
                .put(Namespace::Raw, "k1", Bytes::from_static(b"v1"))
                .await
                .unwrap();
        }

        let backend = ObjectBackend::local(temp_dir.path()).unwrap();
        let value = backend.get(Namespace::Raw, "k1").await.unwrap().unwrap();
        assert_eq!(&value[..], b"v1");
    }

    #[tokio::test]
    async fn test_remove() {
        let backend = ObjectBackend::in_memory();
        backend
            .put(Namespace::Raw, "k", Bytes::from_static(b"v"))
            .await
            .unwrap();

        assert!(backend.remove(Namespace::Raw, "k").await.unwrap());
        assert!(!backend.remove(Namespace::Raw, "k").await.unwrap());
        assert!(backend.get(Namespace::Raw, "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let backend = ObjectBackend::in_memory();
        let err = backend.get(Namespace::Raw, "").await.unwrap_err();
        assert!(matches!(err, CacheError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_empty_segments_do_not_alias() {
        let backend = ObjectBackend::in_memory();
        backend
            .put(Namespace::Processed, "list/c", Bytes::from_static(b"plain"))
            .await
            .unwrap();

        for key in ["list/c/", "list//c", "/list/c"] {
            let err = backend
                .put(Namespace::Processed, key, Bytes::from_static(b"other"))
                .await
                .unwrap_err();
            assert!(matches!(err, CacheError::InvalidKey(_)));
            assert!(backend.get(Namespace::Processed, key).await.is_err());
        }

        let value = backend.get(Namespace::Processed, "list/c").await.unwrap().unwrap();
        assert_eq!(&value[..], b"plain");
    }
}
