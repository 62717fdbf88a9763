use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::Result;

use super::CacheTier;
#[cfg(test)]
use super::{ObjectStore, StoredObject};

/// Process-local cache tier.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (Vec<u8>, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheTier for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).and_then(|(value, deadline)| {
            match deadline {
                Some(deadline) if *deadline <= Instant::now() => None,
                _ => Some(value.clone()),
            }
        }))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let deadline = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_vec(), deadline));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Object store over a map of `bucket/path` to objects, counting reads.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: std::sync::Mutex<HashMap<String, StoredObject>>,
    reads: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MemoryObjectStore {
    pub fn insert(&self, bucket: &str, path: &str, object: StoredObject) {
        self.objects
            .lock()
            .unwrap()
            .insert(format!("{bucket}/{path}"), object);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn read_file(&self, bucket: &str, path: &str) -> Result<StoredObject> {
        self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{bucket}/{path}"))
            .cloned()
            .ok_or_else(|| crate::error::TestLensError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let cache = MemoryCache::new();

        cache.set("key", b"value", None).await.unwrap();
        assert_eq!(cache.get("key").await.unwrap(), Some(b"value".to_vec()));

        cache.delete("key").await.unwrap();
        assert_eq!(cache.get("key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = MemoryCache::new();
        cache
            .set("fresh", b"value", Some(Duration::from_secs(3600)))
            .await
            .unwrap();
        cache.set("stale", b"value", Some(Duration::ZERO)).await.unwrap();

        assert!(cache.get("fresh").await.unwrap().is_some());
        assert!(cache.get("stale").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn object_store_reports_missing_objects() {
        let store = MemoryObjectStore::default();
        store.insert("archive", "present", StoredObject::default());

        assert!(store.read_file("archive", "present").await.is_ok());
        assert!(store.read_file("archive", "absent").await.unwrap_err().is_not_found());
        assert_eq!(store.reads(), 2);
    }
}
