use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::storage::{CacheTier, ObjectStore};

use super::{keys, RollupInterval};

/// Fire-and-forget trigger for copying a branch's rollups into the cache.
pub trait RepopulationQueue: Send + Sync {
    /// Enqueues the work without waiting for it. Failing to enqueue is logged
    /// and otherwise ignored.
    fn cache_test_results(&self, repo_id: u64, branch: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepopulationTask {
    pub repo_id: u64,
    pub branch: String,
}

/// Sending half of the repopulation channel.
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<RepopulationTask>,
}

impl TaskQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RepopulationTask>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl RepopulationQueue for TaskQueue {
    fn cache_test_results(&self, repo_id: u64, branch: &str) {
        let task = RepopulationTask {
            repo_id,
            branch: branch.to_string(),
        };
        if self.sender.send(task).is_err() {
            warn!("Cache warmer stopped, dropping repopulation of {repo_id}/{branch}");
        }
    }
}

/// Worker that copies rollups from storage into the cache.
///
/// Runs until every [`TaskQueue`] feeding it is dropped.
pub struct CacheWarmer {
    handle: JoinHandle<()>,
}

struct Warmer {
    cache: Arc<dyn CacheTier>,
    storage: Arc<dyn ObjectStore>,
    bucket: String,
    intervals: Vec<RollupInterval>,
    ttl: Option<Duration>,
}

impl CacheWarmer {
    pub fn spawn(
        receiver: mpsc::UnboundedReceiver<RepopulationTask>,
        cache: Arc<dyn CacheTier>,
        storage: Arc<dyn ObjectStore>,
        bucket: String,
        intervals: Vec<RollupInterval>,
        ttl: Option<Duration>,
    ) -> Self {
        let warmer = Warmer {
            cache,
            storage,
            bucket,
            intervals,
            ttl,
        };
        Self {
            handle: tokio::spawn(warmer.run(receiver)),
        }
    }

    /// Waits for the queued work to drain.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!("Cache warmer terminated abnormally: {e}");
        }
    }
}

impl Warmer {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<RepopulationTask>) {
        while let Some(task) = receiver.recv().await {
            match self.warm(&task).await {
                Ok(cached) => info!(
                    "Cached {cached} rollup(s) for {}/{}",
                    task.repo_id, task.branch
                ),
                Err(e) => warn!(
                    "Failed to repopulate cache for {}/{}: {e}",
                    task.repo_id, task.branch
                ),
            }
        }
        debug!("Cache warmer drained");
    }

    async fn warm(&self, task: &RepopulationTask) -> Result<usize> {
        let mut cached = 0;
        for &interval in &self.intervals {
            let path = keys::rollup_path(task.repo_id, &task.branch, interval);
            let object = match self.storage.read_file(&self.bucket, &path).await {
                Ok(object) => object,
                Err(e) if e.is_not_found() => {
                    debug!("No rollup at {path}, skipping");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let key = keys::cache_key(task.repo_id, &task.branch, interval);
            self.cache.set(&key, &object.data, self.ttl).await?;
            cached += 1;
        }
        Ok(cached)
    }
}
