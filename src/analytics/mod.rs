//! Test result statistics: row model, dedup and summary aggregates, and the
//! service that answers listing and aggregate queries.

mod aggregates;
mod merge;
pub(crate) mod row;
mod service;
mod table;
mod versioned;

pub use row::{compare_keys, compare_rows, OrderingDirection, OrderingField, TestResultRow};
pub use service::{ListTestResults, TestAnalytics};
pub use table::{RollupTable, SchemaVersion};
