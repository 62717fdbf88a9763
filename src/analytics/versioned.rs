use chrono::{DateTime, Duration, Utc};

use crate::rollups::RollupInterval;

use super::merge::{group_by, merge_group, pass_through, RateFormula};
use super::row::TestResultRow;
use super::table::{RollupTable, SchemaVersion};

/// Keeps the rows whose time bin lies inside `interval`, measured in days
/// back from `now`.
pub fn filter_window(
    table: &RollupTable,
    now: DateTime<Utc>,
    interval: RollupInterval,
) -> RollupTable {
    let oldest = now - Duration::days(i64::from(interval.start));
    let newest = interval
        .end
        .map(|end| now - Duration::days(i64::from(end)));

    table.filter(|index| {
        let timestamp = table.timestamp(index);
        timestamp >= oldest && newest.map_or(true, |newest| timestamp <= newest)
    })
}

/// Collapses the time-binned rows of a versioned table into one row per test,
/// using the aggregation formula of the table's schema version.
pub fn aggregate_table(table: &RollupTable) -> Vec<TestResultRow> {
    match table.version {
        SchemaVersion::NoVersion => merge_by_name(&table.rows(), RateFormula::WeightedRates),
        SchemaVersion::V1 => {
            // V1 bins identify tests by computed name and store no rates
            let rows: Vec<TestResultRow> = (0..table.len())
                .map(|index| {
                    let mut row = table.row(index);
                    if let Some(computed_name) = table.computed_name(index) {
                        row.name = computed_name.to_string();
                    }
                    row
                })
                .collect();
            merge_by_name(&rows, RateFormula::FromCounts)
        }
    }
}

fn merge_by_name(rows: &[TestResultRow], formula: RateFormula) -> Vec<TestResultRow> {
    group_by(rows, |_, row| row.name.as_str())
        .into_values()
        .map(|members| match members.as_slice() {
            [single] => pass_through(single, formula),
            _ => merge_group(&members, formula),
        })
        .collect()
}
