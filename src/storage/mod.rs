//! Storage tiers the rollup store reads through: a fast cache in front of a
//! durable object store.

mod file_cache;
mod http;
mod local;
mod memory;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::info;

use crate::config::{CacheBackend, CacheConfig, StorageBackend, StorageConfig};
use crate::error::{Result, TestLensError};

pub use file_cache::FileCache;
pub use http::HttpObjectStore;
pub use local::LocalObjectStore;
pub use memory::MemoryCache;
#[cfg(test)]
pub use memory::MemoryObjectStore;

/// Object body plus the user metadata stored next to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub metadata: HashMap<String, String>,
}

/// Key/value cache with optional per-entry expiry.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Returns `None` for missing or expired entries.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Read access to durable object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads an object and its metadata.
    ///
    /// Returns `TestLensError::NotFound` if the object does not exist.
    async fn read_file(&self, bucket: &str, path: &str) -> Result<StoredObject>;
}

/// Creates the cache tier selected by `config`.
///
/// # Errors
///
/// Returns an error if the file cache directory cannot be created.
pub fn build_cache(config: &CacheConfig) -> Result<Arc<dyn CacheTier>> {
    if !config.enabled {
        info!("Rollup cache disabled");
        return Ok(Arc::new(FileCache::disabled()));
    }

    match config.backend {
        CacheBackend::File => {
            let cache = match &config.dir {
                Some(dir) => FileCache::new(dir.clone())?,
                None => FileCache::in_cache_dir()?,
            };
            Ok(Arc::new(cache))
        }
        CacheBackend::Memory => Ok(Arc::new(MemoryCache::new())),
    }
}

/// Creates the object store selected by `config`.
///
/// # Errors
///
/// Returns `TestLensError::Config` if the HTTP backend has no usable base URL.
pub fn build_object_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalObjectStore::new(config.root.clone()))),
        StorageBackend::Http => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                TestLensError::Config("storage.base-url is required for the http backend".into())
            })?;
            let store = HttpObjectStore::new(base_url)?.with_retries(
                config.max_retries,
                Duration::from_millis(config.retry_delay_ms),
            );
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn disabled_cache_never_hits() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let cache = build_cache(&config).unwrap();

        cache.set("key", b"value", None).await.unwrap();
        assert_eq!(cache.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_backend_round_trips() {
        let config = CacheConfig {
            backend: CacheBackend::Memory,
            ..CacheConfig::default()
        };
        let cache = build_cache(&config).unwrap();

        cache.set("key", b"value", None).await.unwrap();
        assert_eq!(cache.get("key").await.unwrap(), Some(b"value".to_vec()));
    }

    #[tokio::test]
    async fn file_backend_uses_configured_dir() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            backend: CacheBackend::File,
            dir: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        };
        let cache = build_cache(&config).unwrap();

        cache.set("test_results:1:main:7", b"{}", None).await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn http_backend_requires_base_url() {
        let config = StorageConfig {
            backend: StorageBackend::Http,
            base_url: None,
            ..StorageConfig::default()
        };

        let error = build_object_store(&config).err().unwrap();
        assert!(matches!(error, TestLensError::Config(_)));
    }
}
