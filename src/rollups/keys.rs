//! Cache keys and storage paths of rollup tables.

use super::RollupInterval;

pub fn cache_key(repo_id: u64, branch: &str, interval: RollupInterval) -> String {
    match interval.end {
        Some(end) => format!("test_results:{repo_id}:{branch}:{}:{end}", interval.start),
        None => format!("test_results:{repo_id}:{branch}:{}", interval.start),
    }
}

pub fn rollup_path(repo_id: u64, branch: &str, interval: RollupInterval) -> String {
    match interval.end {
        Some(end) => format!(
            "test_results/rollups/{repo_id}/{branch}/{}_{end}",
            interval.start
        ),
        None => format!("test_results/rollups/{repo_id}/{branch}/{}", interval.start),
    }
}

/// Time-binned rollup of one branch, or of the whole repository when
/// `branch` is `None`.
pub fn versioned_rollup_path(repo_id: u64, branch: Option<&str>) -> String {
    match branch {
        Some(branch) => format!("test_analytics/branch_rollups/{repo_id}/{branch}.arrow"),
        None => format!("test_analytics/repo_rollups/{repo_id}.arrow"),
    }
}
