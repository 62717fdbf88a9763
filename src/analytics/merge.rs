use std::collections::BTreeSet;

use indexmap::IndexMap;

use super::row::TestResultRow;

/// How a merged row obtains its failure and flake rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateFormula {
    /// Volume-weighted average of the members' stored rates.
    WeightedRates,
    /// Recomputed from the summed counts of the members.
    FromCounts,
}

#[allow(clippy::cast_precision_loss)]
fn weighted_average<'a>(
    members: impl IntoIterator<Item = &'a TestResultRow>,
    value: impl Fn(&TestResultRow) -> f64,
) -> f64 {
    let (weighted_sum, total_weight) =
        members
            .into_iter()
            .fold((0.0, 0u64), |(sum, weight), member| {
                let member_weight = member.weight();
                (
                    sum + value(member) * member_weight as f64,
                    weight + member_weight,
                )
            });

    if total_weight > 0 {
        weighted_sum / total_weight as f64
    } else {
        0.0
    }
}

#[allow(clippy::cast_precision_loss)]
fn calculate_rate(count: u64, total: u64) -> f64 {
    if total > 0 {
        count as f64 / total as f64
    } else {
        0.0
    }
}

fn sorted_union<'a>(sets: impl Iterator<Item = &'a Vec<String>>) -> Vec<String> {
    sets.flatten()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Combines rows describing the same test into one statistically merged row.
///
/// `name` and `test_id` come from the first member. Callers must pass at least
/// one member.
pub(crate) fn merge_group(members: &[&TestResultRow], formula: RateFormula) -> TestResultRow {
    let first = members[0];
    let sum = |count: fn(&TestResultRow) -> u64| members.iter().map(|m| count(m)).sum::<u64>();

    let total_pass_count = sum(|m| m.total_pass_count);
    let total_fail_count = sum(|m| m.total_fail_count);
    let total_flaky_fail_count = sum(|m| m.total_flaky_fail_count);

    let (failure_rate, flake_rate) = match formula {
        RateFormula::WeightedRates => (
            weighted_average(members.iter().copied(), |m| m.failure_rate),
            weighted_average(members.iter().copied(), |m| m.flake_rate),
        ),
        RateFormula::FromCounts => {
            let volume = total_pass_count + total_fail_count;
            (
                calculate_rate(total_fail_count, volume),
                calculate_rate(total_flaky_fail_count, volume),
            )
        }
    };

    TestResultRow {
        test_id: first.test_id.clone(),
        name: first.name.clone(),
        testsuite: sorted_union(members.iter().map(|m| &m.testsuite)),
        flags: sorted_union(members.iter().map(|m| &m.flags)),
        failure_rate,
        flake_rate,
        avg_duration: weighted_average(members.iter().copied(), |m| m.avg_duration),
        last_duration: members
            .iter()
            .map(|m| m.last_duration)
            .fold(f64::NEG_INFINITY, f64::max),
        total_pass_count,
        total_fail_count,
        total_flaky_fail_count,
        total_skip_count: sum(|m| m.total_skip_count),
        commits_where_fail: sum(|m| m.commits_where_fail),
        updated_at: members
            .iter()
            .map(|m| m.updated_at)
            .max()
            .unwrap_or(first.updated_at),
    }
}

/// A group of one keeps its stored values. Only rates that the formula derives
/// from counts are recomputed.
pub(crate) fn pass_through(row: &TestResultRow, formula: RateFormula) -> TestResultRow {
    let mut row = row.clone();
    if formula == RateFormula::FromCounts {
        let volume = row.total_pass_count + row.total_fail_count;
        row.failure_rate = calculate_rate(row.total_fail_count, volume);
        row.flake_rate = calculate_rate(row.total_flaky_fail_count, volume);
    }
    row
}

/// Groups rows by `key`, keeping first-seen group order.
pub(crate) fn group_by<'a, K>(
    rows: &'a [TestResultRow],
    key: impl Fn(usize, &'a TestResultRow) -> K,
) -> IndexMap<K, Vec<&'a TestResultRow>>
where
    K: std::hash::Hash + Eq,
{
    rows.iter()
        .enumerate()
        .fold(IndexMap::new(), |mut grouped, (index, row)| {
            grouped.entry(key(index, row)).or_default().push(row);
            grouped
        })
}

/// Merges rows that share a display name.
///
/// Two rows with the same `name` but different `test_id` are shown as one test.
/// Single-member groups pass through unchanged; larger groups are merged with
/// volume-weighted rates and durations. Output follows first-seen name order.
pub fn dedup(rows: &[TestResultRow]) -> Vec<TestResultRow> {
    group_by(rows, |_, row| row.name.as_str())
        .into_values()
        .map(|members| match members.as_slice() {
            [single] => pass_through(single, RateFormula::WeightedRates),
            _ => merge_group(&members, RateFormula::WeightedRates),
        })
        .collect()
}
