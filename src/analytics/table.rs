use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TestLensError};

use super::row::TestResultRow;

/// Which aggregation formula applies to a rollup blob.
///
/// Blobs written before the rollup job started tagging its output carry no
/// version and are read with the oldest formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVersion {
    #[default]
    NoVersion,
    V1,
}

impl SchemaVersion {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            Some("1" | "v1") => Self::V1,
            _ => Self::NoVersion,
        }
    }
}

/// Column-oriented rollup table for one repository/branch scope.
///
/// Every required column has one entry per row. `computed_name` and
/// `timestamp` are optional: they are either empty or row-aligned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollupTable {
    #[serde(default)]
    pub version: SchemaVersion,
    pub test_id: Vec<String>,
    pub name: Vec<String>,
    #[serde(default)]
    pub computed_name: Vec<Option<String>>,
    pub testsuite: Vec<Vec<String>>,
    pub flags: Vec<Vec<String>>,
    pub failure_rate: Vec<f64>,
    pub flake_rate: Vec<f64>,
    pub avg_duration: Vec<f64>,
    pub last_duration: Vec<f64>,
    pub total_pass_count: Vec<u64>,
    pub total_fail_count: Vec<u64>,
    pub total_flaky_fail_count: Vec<u64>,
    pub total_skip_count: Vec<u64>,
    pub commits_where_fail: Vec<u64>,
    pub updated_at: Vec<DateTime<Utc>>,
    /// Time bin each row was rolled up into (versioned blobs only)
    #[serde(default)]
    pub timestamp: Vec<Option<DateTime<Utc>>>,
}

impl RollupTable {
    /// Decodes a serialized table and checks that its columns line up.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a valid table.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let table: Self = serde_json::from_slice(bytes)?;
        table.validate()?;
        Ok(table)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_rows(version: SchemaVersion, rows: &[TestResultRow]) -> Self {
        let mut table = Self {
            version,
            ..Self::default()
        };
        for row in rows {
            table.push(row.clone(), None, None);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    fn validate(&self) -> Result<()> {
        let len = self.len();
        let required = [
            ("test_id", self.test_id.len()),
            ("testsuite", self.testsuite.len()),
            ("flags", self.flags.len()),
            ("failure_rate", self.failure_rate.len()),
            ("flake_rate", self.flake_rate.len()),
            ("avg_duration", self.avg_duration.len()),
            ("last_duration", self.last_duration.len()),
            ("total_pass_count", self.total_pass_count.len()),
            ("total_fail_count", self.total_fail_count.len()),
            ("total_flaky_fail_count", self.total_flaky_fail_count.len()),
            ("total_skip_count", self.total_skip_count.len()),
            ("commits_where_fail", self.commits_where_fail.len()),
            ("updated_at", self.updated_at.len()),
        ];
        let optional = [
            ("computed_name", self.computed_name.len()),
            ("timestamp", self.timestamp.len()),
        ];

        let mismatch = required
            .iter()
            .find(|(_, column_len)| *column_len != len)
            .or_else(|| {
                optional
                    .iter()
                    .find(|(_, column_len)| *column_len != 0 && *column_len != len)
            });

        match mismatch {
            Some((column, column_len)) => Err(TestLensError::Storage(format!(
                "malformed rollup table: column '{column}' has {column_len} entries, expected {len}"
            ))),
            None => Ok(()),
        }
    }

    pub fn row(&self, index: usize) -> TestResultRow {
        TestResultRow {
            test_id: self.test_id[index].clone(),
            name: self.name[index].clone(),
            testsuite: self.testsuite[index].clone(),
            flags: self.flags[index].clone(),
            failure_rate: self.failure_rate[index],
            flake_rate: self.flake_rate[index],
            avg_duration: self.avg_duration[index],
            last_duration: self.last_duration[index],
            total_pass_count: self.total_pass_count[index],
            total_fail_count: self.total_fail_count[index],
            total_flaky_fail_count: self.total_flaky_fail_count[index],
            total_skip_count: self.total_skip_count[index],
            commits_where_fail: self.commits_where_fail[index],
            updated_at: self.updated_at[index],
        }
    }

    pub fn rows(&self) -> Vec<TestResultRow> {
        (0..self.len()).map(|index| self.row(index)).collect()
    }

    pub fn computed_name(&self, index: usize) -> Option<&str> {
        self.computed_name.get(index).and_then(Option::as_deref)
    }

    /// Time bin of a row, falling back to its last execution when the table
    /// has no bin column.
    pub fn timestamp(&self, index: usize) -> DateTime<Utc> {
        self.timestamp
            .get(index)
            .copied()
            .flatten()
            .unwrap_or(self.updated_at[index])
    }

    /// Copies the rows matching `keep` into a new table with the same version.
    pub fn filter(&self, mut keep: impl FnMut(usize) -> bool) -> Self {
        let mut table = Self {
            version: self.version,
            ..Self::default()
        };
        for index in (0..self.len()).filter(|&index| keep(index)) {
            table.push(
                self.row(index),
                self.computed_name.get(index).cloned(),
                self.timestamp.get(index).copied(),
            );
        }
        table
    }

    fn push(
        &mut self,
        row: TestResultRow,
        computed_name: Option<Option<String>>,
        timestamp: Option<Option<DateTime<Utc>>>,
    ) {
        self.test_id.push(row.test_id);
        self.name.push(row.name);
        self.testsuite.push(row.testsuite);
        self.flags.push(row.flags);
        self.failure_rate.push(row.failure_rate);
        self.flake_rate.push(row.flake_rate);
        self.avg_duration.push(row.avg_duration);
        self.last_duration.push(row.last_duration);
        self.total_pass_count.push(row.total_pass_count);
        self.total_fail_count.push(row.total_fail_count);
        self.total_flaky_fail_count.push(row.total_flaky_fail_count);
        self.total_skip_count.push(row.total_skip_count);
        self.commits_where_fail.push(row.commits_where_fail);
        self.updated_at.push(row.updated_at);
        if let Some(computed_name) = computed_name {
            self.computed_name.push(computed_name);
        }
        if let Some(timestamp) = timestamp {
            self.timestamp.push(timestamp);
        }
    }
}
