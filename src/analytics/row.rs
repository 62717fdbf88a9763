use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TestLensError};

/// Statistics for one test within a rollup window.
///
/// Rates and durations are only meaningful together with the sampled volume
/// (`total_pass_count + total_fail_count`); see [`TestResultRow::weight`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResultRow {
    pub test_id: String,
    /// Display name, also the pagination tie-break and the dedup key
    pub name: String,
    /// Sorted, duplicate-free suite names
    pub testsuite: Vec<String>,
    /// Sorted, duplicate-free flag names
    pub flags: Vec<String>,
    pub failure_rate: f64,
    pub flake_rate: f64,
    pub avg_duration: f64,
    pub last_duration: f64,
    pub total_pass_count: u64,
    pub total_fail_count: u64,
    pub total_flaky_fail_count: u64,
    pub total_skip_count: u64,
    /// Distinct commits that saw at least one failure
    pub commits_where_fail: u64,
    /// Most recent execution in the window
    pub updated_at: DateTime<Utc>,
}

impl TestResultRow {
    /// Sampled volume used to weight rates and durations when rows are combined.
    pub fn weight(&self) -> u64 {
        self.total_pass_count + self.total_fail_count
    }
}

/// Columns a test result listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OrderingField {
    AvgDuration,
    FailureRate,
    FlakeRate,
    CommitsWhereFail,
    UpdatedAt,
    LastDuration,
    TotalFailCount,
    TotalFlakyFailCount,
    TotalPassCount,
    TotalSkipCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OrderingDirection {
    Asc,
    #[default]
    Desc,
}

impl OrderingDirection {
    pub fn is_descending(self) -> bool {
        self == Self::Desc
    }
}

/// Typed value of an ordering column, comparable across rows and cursors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortKey {
    Float(f64),
    Count(u64),
    Timestamp(DateTime<Utc>),
}

impl SortKey {
    /// Canonical string form: decimal numbers, RFC 3339 timestamps with
    /// nanoseconds so that parsing the string back yields the same key.
    pub fn render(&self) -> String {
        match self {
            Self::Float(value) => value.to_string(),
            Self::Count(value) => value.to_string(),
            Self::Timestamp(value) => value.to_rfc3339_opts(SecondsFormat::Nanos, true),
        }
    }

    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Count(a), Self::Count(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            // Keys of one listing always share a variant
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Float(_) => 0,
            Self::Count(_) => 1,
            Self::Timestamp(_) => 2,
        }
    }
}

impl OrderingField {
    pub fn key(self, row: &TestResultRow) -> SortKey {
        match self {
            Self::AvgDuration => SortKey::Float(row.avg_duration),
            Self::FailureRate => SortKey::Float(row.failure_rate),
            Self::FlakeRate => SortKey::Float(row.flake_rate),
            Self::LastDuration => SortKey::Float(row.last_duration),
            Self::CommitsWhereFail => SortKey::Count(row.commits_where_fail),
            Self::TotalFailCount => SortKey::Count(row.total_fail_count),
            Self::TotalFlakyFailCount => SortKey::Count(row.total_flaky_fail_count),
            Self::TotalPassCount => SortKey::Count(row.total_pass_count),
            Self::TotalSkipCount => SortKey::Count(row.total_skip_count),
            Self::UpdatedAt => SortKey::Timestamp(row.updated_at),
        }
    }

    /// Parses a value previously produced by [`SortKey::render`] for this field.
    ///
    /// # Errors
    ///
    /// Returns `TestLensError::Validation` if the value does not parse as this
    /// field's type.
    pub fn parse_key(self, value: &str) -> Result<SortKey> {
        let invalid = |reason: String| {
            TestLensError::Validation(format!("invalid cursor value for {self}: {reason}"))
        };

        match self {
            Self::AvgDuration | Self::FailureRate | Self::FlakeRate | Self::LastDuration => value
                .parse::<f64>()
                .map(SortKey::Float)
                .map_err(|e| invalid(e.to_string())),
            Self::CommitsWhereFail
            | Self::TotalFailCount
            | Self::TotalFlakyFailCount
            | Self::TotalPassCount
            | Self::TotalSkipCount => value
                .parse::<u64>()
                .map(SortKey::Count)
                .map_err(|e| invalid(e.to_string())),
            Self::UpdatedAt => DateTime::parse_from_rfc3339(value)
                .map(|ts| SortKey::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|e| invalid(e.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AvgDuration => "avg_duration",
            Self::FailureRate => "failure_rate",
            Self::FlakeRate => "flake_rate",
            Self::CommitsWhereFail => "commits_where_fail",
            Self::UpdatedAt => "updated_at",
            Self::LastDuration => "last_duration",
            Self::TotalFailCount => "total_fail_count",
            Self::TotalFlakyFailCount => "total_flaky_fail_count",
            Self::TotalPassCount => "total_pass_count",
            Self::TotalSkipCount => "total_skip_count",
        }
    }
}

impl fmt::Display for OrderingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orders a `(key, name)` pair against another, reversing the whole tuple
/// when `descending`.
pub fn compare_keys(
    (key_a, name_a): (&SortKey, &str),
    (key_b, name_b): (&SortKey, &str),
    descending: bool,
) -> Ordering {
    let ordering = key_a.total_cmp(key_b).then_with(|| name_a.cmp(name_b));
    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}

/// Listing order: the ordering field first, `name` as tie-break.
pub fn compare_rows(
    a: &TestResultRow,
    b: &TestResultRow,
    field: OrderingField,
    descending: bool,
) -> Ordering {
    compare_keys(
        (&field.key(a), a.name.as_str()),
        (&field.key(b), b.name.as_str()),
        descending,
    )
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};

    use super::TestResultRow;

    pub fn timestamp(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    pub fn create_row(name: &str) -> TestResultRow {
        TestResultRow {
            test_id: format!("id-{name}"),
            name: name.to_string(),
            testsuite: vec!["suite".to_string()],
            flags: vec![],
            failure_rate: 0.0,
            flake_rate: 0.0,
            avg_duration: 1.0,
            last_duration: 1.0,
            total_pass_count: 1,
            total_fail_count: 0,
            total_flaky_fail_count: 0,
            total_skip_count: 0,
            commits_where_fail: 0,
            updated_at: timestamp(1, 0),
        }
    }
}
