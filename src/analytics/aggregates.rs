use std::cmp::Ordering;

use crate::insights::{AggregateSummary, FlakeSummary};

use super::row::TestResultRow;

const SLOW_TEST_FRACTION_DIVISOR: usize = 20;
const MAX_SLOW_TESTS: usize = 100;

/// Number of slowest tests counted as "slow": 5% of the suite, at least one
/// and at most 100.
pub fn slow_test_threshold(total_tests: usize) -> usize {
    (total_tests / SLOW_TEST_FRACTION_DIVISOR).clamp(1, MAX_SLOW_TESTS)
}

/// Relative change from `previous` to `current`, in percent.
pub fn percent_change(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some((current - previous) / previous * 100.0)
    }
}

fn slowest_first(a: &&TestResultRow, b: &&TestResultRow) -> Ordering {
    b.avg_duration
        .total_cmp(&a.avg_duration)
        .then_with(|| a.name.cmp(&b.name))
}

/// Computes totals and the slow-test figures for a set of rows.
///
/// Ties on duration are broken by `name` ascending so the chosen slow tests do
/// not depend on row order.
pub fn aggregate(rows: &[TestResultRow]) -> AggregateSummary {
    let total_slow_tests = slow_test_threshold(rows.len());

    let mut by_duration: Vec<&TestResultRow> = rows.iter().collect();
    by_duration.sort_by(slowest_first);

    AggregateSummary {
        total_duration: rows.iter().map(|r| r.avg_duration).sum(),
        slowest_tests_duration: by_duration
            .iter()
            .take(total_slow_tests)
            .map(|r| r.avg_duration)
            .sum(),
        total_fails: rows.iter().map(|r| r.total_fail_count).sum(),
        total_skips: rows.iter().map(|r| r.total_skip_count).sum(),
        total_slow_tests,
        ..AggregateSummary::default()
    }
}

/// Fills the `*_percent_change` fields of `current` from the previous window.
#[allow(clippy::cast_precision_loss)]
pub fn compare_aggregates(
    mut current: AggregateSummary,
    previous: &AggregateSummary,
) -> AggregateSummary {
    current.total_duration_percent_change =
        percent_change(current.total_duration, previous.total_duration);
    current.slowest_tests_duration_percent_change = percent_change(
        current.slowest_tests_duration,
        previous.slowest_tests_duration,
    );
    current.total_fails_percent_change =
        percent_change(current.total_fails as f64, previous.total_fails as f64);
    current.total_skips_percent_change =
        percent_change(current.total_skips as f64, previous.total_skips as f64);
    current.total_slow_tests_percent_change = percent_change(
        current.total_slow_tests as f64,
        previous.total_slow_tests as f64,
    );
    current
}

/// Flaky failure count and volume-weighted flake rate.
#[allow(clippy::cast_precision_loss)]
pub fn flake_aggregates(rows: &[TestResultRow]) -> FlakeSummary {
    let (weighted_sum, total_weight) = rows.iter().fold((0.0, 0u64), |(sum, weight), row| {
        (
            sum + row.flake_rate * row.weight() as f64,
            weight + row.weight(),
        )
    });

    let flake_rate = if total_weight > 0 {
        weighted_sum / total_weight as f64
    } else {
        0.0
    };

    FlakeSummary {
        flake_rate,
        flake_count: rows.iter().map(|r| r.total_flaky_fail_count).sum(),
        ..FlakeSummary::default()
    }
}

#[allow(clippy::cast_precision_loss)]
pub fn compare_flakes(mut current: FlakeSummary, previous: &FlakeSummary) -> FlakeSummary {
    current.flake_rate_percent_change = percent_change(current.flake_rate, previous.flake_rate);
    current.flake_count_percent_change =
        percent_change(current.flake_count as f64, previous.flake_count as f64);
    current
}
