use serde::{Deserialize, Serialize};

/// Summary statistics over every test in a rollup window.
///
/// The `*_percent_change` fields compare against the window of the same length
/// immediately before it, and are `None` when there is nothing to compare with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub total_duration: f64,
    pub slowest_tests_duration: f64,
    pub total_fails: u64,
    pub total_skips: u64,
    pub total_slow_tests: usize,
    pub total_duration_percent_change: Option<f64>,
    pub slowest_tests_duration_percent_change: Option<f64>,
    pub total_fails_percent_change: Option<f64>,
    pub total_skips_percent_change: Option<f64>,
    pub total_slow_tests_percent_change: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlakeSummary {
    pub flake_rate: f64,
    pub flake_count: u64,
    pub flake_rate_percent_change: Option<f64>,
    pub flake_count_percent_change: Option<f64>,
}

/// Both summaries of one scope, as reported by the `summary` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub aggregates: Option<AggregateSummary>,
    pub flakes: Option<FlakeSummary>,
}
