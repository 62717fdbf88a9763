use std::sync::Arc;

use log::debug;

use crate::analytics::{RollupTable, SchemaVersion};
use crate::error::Result;
use crate::storage::{CacheTier, ObjectStore, StoredObject};

use super::{keys, RepopulationQueue, RollupInterval};

/// Metadata key carrying the schema version of a versioned rollup blob.
const VERSION_METADATA_KEY: &str = "version";

/// Read path for rollup tables: cache first, object storage on a miss.
///
/// Missing data is `Ok(None)`. Every other cache or storage failure is
/// returned to the caller.
pub struct RollupStore {
    cache: Arc<dyn CacheTier>,
    storage: Arc<dyn ObjectStore>,
    queue: Arc<dyn RepopulationQueue>,
    bucket: String,
}

impl RollupStore {
    pub fn new(
        cache: Arc<dyn CacheTier>,
        storage: Arc<dyn ObjectStore>,
        queue: Arc<dyn RepopulationQueue>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            storage,
            queue,
            bucket: bucket.into(),
        }
    }

    /// Rollup of `branch` over `interval`.
    ///
    /// A storage hit after a cache miss schedules repopulation of the cache
    /// without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns cache and storage failures other than a missing object, and a
    /// decoding error for tables that do not parse or whose columns disagree.
    pub async fn get_results(
        &self,
        repo_id: u64,
        branch: &str,
        interval: RollupInterval,
    ) -> Result<Option<RollupTable>> {
        let key = keys::cache_key(repo_id, branch, interval);
        if let Some(bytes) = self.cache.get(&key).await? {
            debug!("Cache hit for {key}");
            return RollupTable::from_slice(&bytes).map(Some);
        }
        debug!("Cache miss for {key}");

        let path = keys::rollup_path(repo_id, branch, interval);
        let Some(object) = self.read_optional(&path).await? else {
            return Ok(None);
        };

        let table = RollupTable::from_slice(&object.data)?;
        self.queue.cache_test_results(repo_id, branch);
        Ok(Some(table))
    }

    /// Time-binned rollup of a branch, or of the whole repository when
    /// `branch` is `None`, tagged with the schema version from its metadata.
    ///
    /// # Errors
    ///
    /// Same as [`RollupStore::get_results`].
    pub async fn get_versioned_results(
        &self,
        repo_id: u64,
        branch: Option<&str>,
    ) -> Result<Option<RollupTable>> {
        let path = keys::versioned_rollup_path(repo_id, branch);
        let Some(object) = self.read_optional(&path).await? else {
            return Ok(None);
        };

        let mut table = RollupTable::from_slice(&object.data)?;
        table.version = SchemaVersion::from_tag(
            object
                .metadata
                .get(VERSION_METADATA_KEY)
                .map(String::as_str),
        );
        debug!("Loaded {path} ({} rows, {:?})", table.len(), table.version);
        Ok(Some(table))
    }

    async fn read_optional(&self, path: &str) -> Result<Option<StoredObject>> {
        match self.storage.read_file(&self.bucket, path).await {
            Ok(object) => Ok(Some(object)),
            Err(e) if e.is_not_found() => {
                debug!("No rollup at {}/{path}", self.bucket);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Mutex;

    use super::RepopulationQueue;

    /// Queue that records every trigger instead of running it.
    #[derive(Default)]
    pub struct RecordingQueue {
        pub calls: Mutex<Vec<(u64, String)>>,
    }

    impl RecordingQueue {
        pub fn calls(&self) -> Vec<(u64, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl RepopulationQueue for RecordingQueue {
        fn cache_test_results(&self, repo_id: u64, branch: &str) {
            self.calls
                .lock()
                .unwrap()
                .push((repo_id, branch.to_string()));
        }
    }
}
