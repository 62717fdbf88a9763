//! Retrieval of precomputed test result rollups.
//!
//! An external job writes rollup tables to object storage. This module reads
//! them through the cache, falls back to storage on a miss and asks a worker to
//! warm the cache afterwards.

pub mod keys;
mod repopulate;
pub(crate) mod store;

use serde::{Deserialize, Serialize};

pub use repopulate::{CacheWarmer, RepopulationQueue, TaskQueue};
pub use store::RollupStore;

/// Window of whole days counted back from now: `[now - start, now - end]`.
///
/// Without `end` the window reaches up to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RollupInterval {
    pub start: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u32>,
}

impl RollupInterval {
    /// The last `start` days.
    pub fn days(start: u32) -> Self {
        Self { start, end: None }
    }

    pub fn between(start: u32, end: u32) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// The window of equal length immediately before `days(interval)`.
    pub fn previous(interval: u32) -> Self {
        Self::between(interval.saturating_mul(2), interval)
    }
}
