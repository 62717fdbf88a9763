use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::config::Config;
use crate::error::{Result, TestLensError};
use crate::insights::{AggregateSummary, FlakeSummary};
use crate::pagination::{paginate, Connection, KeysetSource, PageArgs};
use crate::rollups::{CacheWarmer, RollupInterval, RollupStore, TaskQueue};
use crate::storage::{build_cache, build_object_store};

use super::aggregates::{aggregate, compare_aggregates, compare_flakes, flake_aggregates};
use super::merge::dedup;
use super::row::{compare_rows, OrderingDirection, OrderingField, TestResultRow};
use super::table::RollupTable;
use super::versioned::{aggregate_table, filter_window};

/// Arguments of a test result listing.
#[derive(Debug, Clone)]
pub struct ListTestResults {
    pub repo_id: u64,
    pub ordering: OrderingField,
    pub ordering_direction: OrderingDirection,
    pub interval_days: u32,
    pub page: PageArgs,
    /// Defaults to the configured default branch
    pub branch: Option<String>,
    /// Case-sensitive substring of the test name
    pub term: Option<String>,
    pub testsuites: Option<Vec<String>>,
    pub flags: Option<Vec<String>>,
}

impl ListTestResults {
    fn matches(&self, row: &TestResultRow) -> bool {
        let intersects = |wanted: &Option<Vec<String>>, have: &[String]| match wanted {
            Some(wanted) if !wanted.is_empty() => have.iter().any(|item| wanted.contains(item)),
            _ => true,
        };

        self.term
            .as_deref()
            .map_or(true, |term| row.name.contains(term))
            && intersects(&self.testsuites, &row.testsuite)
            && intersects(&self.flags, &row.flags)
    }
}

/// Entry point for test analytics queries.
///
/// Owns the rollup store and, when built from configuration, the cache
/// warmer behind it. Call [`TestAnalytics::shutdown`] to let queued cache
/// repopulation finish.
pub struct TestAnalytics {
    store: RollupStore,
    default_branch: String,
    page_size: usize,
    warmer: Option<CacheWarmer>,
}

impl TestAnalytics {
    pub fn new(store: RollupStore, default_branch: impl Into<String>, page_size: usize) -> Self {
        Self {
            store,
            default_branch: default_branch.into(),
            page_size,
            warmer: None,
        }
    }

    /// Builds the storage tiers described by `config` and starts the cache
    /// warmer. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage tier cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache = build_cache(&config.cache)?;
        let storage = build_object_store(&config.storage)?;

        let (queue, receiver) = TaskQueue::channel();
        let warmer = CacheWarmer::spawn(
            receiver,
            Arc::clone(&cache),
            Arc::clone(&storage),
            config.storage.bucket.clone(),
            config.analytics.repopulate_intervals.clone(),
            config.cache.ttl(),
        );
        let store = RollupStore::new(cache, storage, Arc::new(queue), &config.storage.bucket);

        info!(
            "Test analytics ready (bucket '{}', default branch '{}')",
            config.storage.bucket, config.analytics.default_branch
        );

        Ok(Self {
            warmer: Some(warmer),
            ..Self::new(
                store,
                &config.analytics.default_branch,
                config.analytics.page_size,
            )
        })
    }

    /// Closes the repopulation queue and waits for pending work.
    pub async fn shutdown(self) {
        let Self { store, warmer, .. } = self;
        drop(store);
        if let Some(warmer) = warmer {
            warmer.join().await;
        }
    }

    /// Lists deduplicated test results, filtered, ordered and paginated.
    ///
    /// Missing rollups yield an empty connection.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad pagination arguments, checked
    /// before any I/O, and propagates storage failures.
    pub async fn list_test_results(
        &self,
        args: &ListTestResults,
    ) -> Result<Connection<TestResultRow>> {
        args.page.validate()?;
        validate_interval(args.interval_days)?;

        let branch = args.branch.as_deref().unwrap_or(&self.default_branch);
        info!(
            "Listing test results for {}/{branch} over {} day(s)",
            args.repo_id, args.interval_days
        );

        let Some(table) = self
            .store
            .get_results(args.repo_id, branch, RollupInterval::days(args.interval_days))
            .await?
        else {
            return Ok(Connection::empty());
        };

        let mut rows: Vec<TestResultRow> = dedup(&table.rows())
            .into_iter()
            .filter(|row| args.matches(row))
            .collect();

        let descending = args.ordering_direction.is_descending();
        rows.sort_by(|a, b| compare_rows(a, b, args.ordering, descending));
        debug!("{} rows after dedup and filters", rows.len());

        let source = KeysetSource::new(&rows, args.ordering, descending, self.page_size);
        paginate(&source, &args.page)
    }

    /// Summary statistics over the last `interval_days`, compared with the
    /// window of equal length before it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a zero interval and propagates storage
    /// failures.
    pub async fn test_results_aggregates(
        &self,
        repo_id: u64,
        interval_days: u32,
        branch: Option<&str>,
    ) -> Result<Option<AggregateSummary>> {
        self.test_results_aggregates_at(repo_id, interval_days, branch, Utc::now())
            .await
    }

    /// Flake statistics over the last `interval_days`, compared with the
    /// window of equal length before it.
    ///
    /// # Errors
    ///
    /// Same as [`TestAnalytics::test_results_aggregates`].
    pub async fn flake_aggregates(
        &self,
        repo_id: u64,
        interval_days: u32,
        branch: Option<&str>,
    ) -> Result<Option<FlakeSummary>> {
        self.flake_aggregates_at(repo_id, interval_days, branch, Utc::now())
            .await
    }

    pub(crate) async fn test_results_aggregates_at(
        &self,
        repo_id: u64,
        interval_days: u32,
        branch: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<AggregateSummary>> {
        let Some((current, previous)) = self
            .windows(repo_id, interval_days, branch, now)
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(compare_aggregates(
            aggregate(&current),
            &aggregate(&previous),
        )))
    }

    pub(crate) async fn flake_aggregates_at(
        &self,
        repo_id: u64,
        interval_days: u32,
        branch: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<FlakeSummary>> {
        let Some((current, previous)) = self
            .windows(repo_id, interval_days, branch, now)
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(compare_flakes(
            flake_aggregates(&current),
            &flake_aggregates(&previous),
        )))
    }

    /// Aggregated rows of the current window and of the one before it.
    async fn windows(
        &self,
        repo_id: u64,
        interval_days: u32,
        branch: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<(Vec<TestResultRow>, Vec<TestResultRow>)>> {
        validate_interval(interval_days)?;

        let Some(table) = self.store.get_versioned_results(repo_id, branch).await? else {
            return Ok(None);
        };

        let window = |interval: RollupInterval| -> Vec<TestResultRow> {
            let filtered: RollupTable = filter_window(&table, now, interval);
            aggregate_table(&filtered)
        };

        Ok(Some((
            window(RollupInterval::days(interval_days)),
            window(RollupInterval::previous(interval_days)),
        )))
    }
}

fn validate_interval(interval_days: u32) -> Result<()> {
    if interval_days == 0 {
        return Err(TestLensError::Validation(
            "interval must be at least one day".to_string(),
        ));
    }
    Ok(())
}
