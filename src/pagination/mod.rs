//! Cursor pagination over ordered sources.
//!
//! [`paginate`] is written once against [`PageSource`]. A source translates
//! `after`/`before` cursors into a [`Window`] of positions and hands out the
//! edges of the final page; the engine owns the `first`/`last` arithmetic,
//! page info and total count.

pub mod cursor;
pub mod keyset;
mod source;

use std::ops::Range;

use serde::Serialize;

use crate::error::{Result, TestLensError};

pub use source::{ArraySource, KeysetSource};

/// Page size for lazily queried sources when neither `first` nor `last` is given.
pub const DEFAULT_PAGE_SIZE: usize = 25;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageArgs {
    pub first: Option<usize>,
    pub after: Option<String>,
    pub last: Option<usize>,
    pub before: Option<String>,
}

impl PageArgs {
    /// # Errors
    ///
    /// Returns `TestLensError::Validation` if both `first` and `last` are set.
    pub fn validate(&self) -> Result<()> {
        if self.first.is_some() && self.last.is_some() {
            return Err(TestLensError::Validation(
                "cannot provide both 'first' and 'last'".to_string(),
            ));
        }
        Ok(())
    }
}

/// Side of the window `last` counts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Trailing rows of the window.
    End,
    /// Rows adjacent to a `before` boundary at the window start.
    Start,
}

/// Positions `[start, end)` left after applying the cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
    pub backward_anchor: Anchor,
}

/// Capability the pagination engine needs from an ordered collection.
pub trait PageSource {
    type Node;

    /// Size of the unsliced source.
    fn count(&self) -> usize;

    /// Bound applied when the caller gives neither `first` nor `last`.
    fn default_page_size(&self) -> Option<usize>;

    /// Resolves the cursors into positions.
    fn window(&self, after: Option<&str>, before: Option<&str>) -> Result<Window>;

    /// Materializes the edges for `range`, which is always within `0..count()`.
    fn fetch(&self, range: Range<usize>) -> Result<Vec<Edge<Self::Node>>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge<T> {
    pub cursor: String,
    pub node: T,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub total_count: usize,
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            total_count: 0,
            page_info: PageInfo::default(),
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|edge| &edge.node)
    }
}

/// Slices `source` according to `args`.
///
/// # Errors
///
/// Returns `TestLensError::Validation` for `first` combined with `last` or a
/// cursor the source cannot resolve.
pub fn paginate<S: PageSource>(source: &S, args: &PageArgs) -> Result<Connection<S::Node>> {
    args.validate()?;

    let total_count = source.count();
    let window = source.window(args.after.as_deref(), args.before.as_deref())?;

    let mut start = window.start.min(total_count);
    let mut end = window.end.clamp(start, total_count);

    let first = match (args.first, args.last) {
        (Some(first), _) => Some(first),
        (None, None) => source.default_page_size(),
        (None, Some(_)) => None,
    };

    if let Some(first) = first {
        end = end.min(start.saturating_add(first));
    }

    if let Some(last) = args.last {
        if end - start > last {
            match window.backward_anchor {
                Anchor::End => start = end - last,
                Anchor::Start => end = start + last,
            }
        }
    }

    let edges = if start < end {
        source.fetch(start..end)?
    } else {
        Vec::new()
    };

    let page_info = PageInfo {
        has_next_page: end < total_count,
        has_previous_page: start > 0,
        start_cursor: edges.first().map(|edge| edge.cursor.clone()),
        end_cursor: edges.last().map(|edge| edge.cursor.clone()),
    };

    Ok(Connection {
        edges,
        total_count,
        page_info,
    })
}

#[cfg(test)]
mod tests {
    use super::cursor::{encode, encode_offset};
    use super::*;
    use crate::analytics::row::fixtures::{create_row, timestamp};
    use crate::analytics::{compare_rows, OrderingField, TestResultRow};

    /// Five rows r0..r4 ordered by `updated_at` descending.
    fn five_rows() -> Vec<TestResultRow> {
        let mut rows: Vec<_> = (0..5)
            .map(|i| {
                let mut row = create_row(&format!("r{i}"));
                row.updated_at = timestamp(10 - i, 0);
                row
            })
            .collect();
        rows.sort_by(|a, b| compare_rows(a, b, OrderingField::UpdatedAt, true));
        rows
    }

    fn names(connection: &Connection<TestResultRow>) -> Vec<String> {
        connection.nodes().map(|node| node.name.clone()).collect()
    }

    fn args(first: Option<usize>, last: Option<usize>) -> PageArgs {
        PageArgs {
            first,
            last,
            ..PageArgs::default()
        }
    }

    #[cfg(test)]
    mod keyset_source {
        use super::*;

        fn source(rows: &[TestResultRow]) -> KeysetSource<'_> {
            KeysetSource::new(rows, OrderingField::UpdatedAt, true, DEFAULT_PAGE_SIZE)
        }

        #[test]
        fn first_page() {
            let rows = five_rows();
            let connection = paginate(&source(&rows), &args(Some(1), None)).unwrap();

            assert_eq!(names(&connection), vec!["r0"]);
            assert!(connection.page_info.has_next_page);
            assert!(!connection.page_info.has_previous_page);
            assert_eq!(connection.total_count, 5);
        }

        #[test]
        fn first_after_cursor() {
            let rows = five_rows();
            let page = PageArgs {
                first: Some(1),
                after: Some(encode(&rows[0], OrderingField::UpdatedAt)),
                ..PageArgs::default()
            };

            let connection = paginate(&source(&rows), &page).unwrap();

            assert_eq!(names(&connection), vec!["r1"]);
            assert!(connection.page_info.has_previous_page);
            assert!(connection.page_info.has_next_page);
        }

        #[test]
        fn last_page() {
            let rows = five_rows();
            let connection = paginate(&source(&rows), &args(None, Some(1))).unwrap();

            assert_eq!(names(&connection), vec!["r4"]);
            assert!(connection.page_info.has_previous_page);
            assert!(!connection.page_info.has_next_page);
        }

        #[test]
        fn last_before_cursor() {
            let rows = five_rows();
            let page = PageArgs {
                last: Some(1),
                before: Some(encode(&rows[0], OrderingField::UpdatedAt)),
                ..PageArgs::default()
            };

            let connection = paginate(&source(&rows), &page).unwrap();

            assert_eq!(names(&connection), vec!["r1"]);
        }

        #[test]
        fn walks_every_row_forward() {
            let rows = five_rows();
            let source = source(&rows);
            let mut seen = Vec::new();
            let mut after = None;

            loop {
                let page = PageArgs {
                    first: Some(2),
                    after: after.clone(),
                    ..PageArgs::default()
                };
                let connection = paginate(&source, &page).unwrap();
                seen.extend(names(&connection));
                if !connection.page_info.has_next_page {
                    break;
                }
                after = connection.page_info.end_cursor;
            }

            assert_eq!(seen, vec!["r0", "r1", "r2", "r3", "r4"]);
        }

        #[test]
        fn pages_past_names_holding_the_separator() {
            let mut rows = five_rows();
            rows[1].name = "r1\u{1f}param".to_string();
            let page = PageArgs {
                first: Some(1),
                after: Some(encode(&rows[1], OrderingField::UpdatedAt)),
                ..PageArgs::default()
            };

            let connection = paginate(&source(&rows), &page).unwrap();

            assert_eq!(names(&connection), vec!["r2"]);
        }

        #[test]
        fn cursor_of_removed_row_still_resumes() {
            let rows = five_rows();
            let cursor = encode(&rows[1], OrderingField::UpdatedAt);
            let remaining: Vec<_> = rows.iter().filter(|r| r.name != "r1").cloned().collect();

            let page = PageArgs {
                first: Some(2),
                after: Some(cursor),
                ..PageArgs::default()
            };
            let connection = paginate(&source(&remaining), &page).unwrap();

            assert_eq!(names(&connection), vec!["r2", "r3"]);
        }

        #[test]
        fn default_page_size_applies() {
            let rows: Vec<_> = (0..30).map(|i| create_row(&format!("t{i:02}"))).collect();
            let source = KeysetSource::new(&rows, OrderingField::AvgDuration, false, 25);

            let connection = paginate(&source, &PageArgs::default()).unwrap();

            assert_eq!(connection.edges.len(), 25);
            assert!(connection.page_info.has_next_page);
            assert_eq!(connection.total_count, 30);
        }

        #[test]
        fn malformed_cursor_is_rejected() {
            let rows = five_rows();
            let page = PageArgs {
                first: Some(1),
                after: Some("%%%".to_string()),
                ..PageArgs::default()
            };

            let error = paginate(&source(&rows), &page).unwrap_err();
            assert!(error.is_validation());
        }

        #[test]
        fn cursors_match_edges() {
            let rows = five_rows();
            let connection = paginate(&source(&rows), &args(Some(2), None)).unwrap();

            assert_eq!(
                connection.page_info.start_cursor.as_deref(),
                Some(encode(&rows[0], OrderingField::UpdatedAt).as_str())
            );
            assert_eq!(
                connection.page_info.end_cursor,
                Some(connection.edges[1].cursor.clone())
            );
        }
    }

    #[cfg(test)]
    mod array_source {
        use super::*;

        #[test]
        fn both_first_and_last_is_rejected() {
            let rows = five_rows();
            let error = paginate(&ArraySource::new(&rows), &args(Some(2), Some(3))).unwrap_err();

            assert!(matches!(error, TestLensError::Validation(_)));
            assert!(error.to_string().contains("both 'first' and 'last'"));
        }

        #[test]
        fn invalid_after_cursor_is_rejected() {
            let rows = five_rows();
            let page = PageArgs {
                first: Some(3),
                after: Some("invalid".to_string()),
                ..PageArgs::default()
            };

            let error = paginate(&ArraySource::new(&rows), &page).unwrap_err();
            assert!(matches!(error, TestLensError::Validation(_)));
        }

        #[test]
        fn empty_source() {
            let rows: Vec<TestResultRow> = Vec::new();
            let connection = paginate(&ArraySource::new(&rows), &args(Some(2), None)).unwrap();

            assert!(connection.edges.is_empty());
            assert_eq!(connection.total_count, 0);
            assert_eq!(connection.page_info, PageInfo::default());
        }

        #[test]
        fn first_larger_than_source() {
            let rows = five_rows();
            let connection = paginate(&ArraySource::new(&rows), &args(Some(10), None)).unwrap();

            assert_eq!(connection.edges.len(), 5);
            assert!(!connection.page_info.has_next_page);
        }

        #[test]
        fn unbounded_returns_remaining_range() {
            let rows = five_rows();
            let page = PageArgs {
                after: Some(encode_offset(1)),
                ..PageArgs::default()
            };

            let connection = paginate(&ArraySource::new(&rows), &page).unwrap();

            assert_eq!(names(&connection), vec!["r2", "r3", "r4"]);
            assert!(connection.page_info.has_previous_page);
        }

        #[test]
        fn last_before_offset_takes_trailing_rows() {
            let rows = five_rows();
            let page = PageArgs {
                last: Some(2),
                before: Some(encode_offset(4)),
                ..PageArgs::default()
            };

            let connection = paginate(&ArraySource::new(&rows), &page).unwrap();

            assert_eq!(names(&connection), vec!["r2", "r3"]);
            assert!(connection.page_info.has_next_page);
            assert!(connection.page_info.has_previous_page);
        }

        #[test]
        fn offsets_beyond_length_are_clamped() {
            let rows = five_rows();
            let page = PageArgs {
                first: Some(2),
                after: Some(encode_offset(99)),
                ..PageArgs::default()
            };

            let connection = paginate(&ArraySource::new(&rows), &page).unwrap();

            assert!(connection.edges.is_empty());
            assert_eq!(connection.page_info.start_cursor, None);
            assert_eq!(connection.page_info.end_cursor, None);
            assert_eq!(connection.total_count, 5);
        }

        #[test]
        fn edge_cursors_are_offsets() {
            let rows = five_rows();
            let connection = paginate(&ArraySource::new(&rows), &args(Some(2), None)).unwrap();

            assert_eq!(connection.edges[0].cursor, encode_offset(0));
            assert_eq!(connection.edges[1].cursor, encode_offset(1));
        }
    }
}
