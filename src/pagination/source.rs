use std::ops::Range;

use crate::analytics::{OrderingField, TestResultRow};
use crate::error::Result;

use super::cursor::{self, decode_offset, encode_offset};
use super::keyset::find_resume_position;
use super::{Anchor, Edge, PageSource, Window};

/// In-memory sequence paginated by offset cursors.
pub struct ArraySource<'a, T> {
    items: &'a [T],
}

impl<'a, T> ArraySource<'a, T> {
    pub fn new(items: &'a [T]) -> Self {
        Self { items }
    }
}

impl<T: Clone> PageSource for ArraySource<'_, T> {
    type Node = T;

    fn count(&self) -> usize {
        self.items.len()
    }

    fn default_page_size(&self) -> Option<usize> {
        None
    }

    fn window(&self, after: Option<&str>, before: Option<&str>) -> Result<Window> {
        let len = self.items.len();

        let start = match after {
            Some(cursor) => decode_offset(cursor)?.saturating_add(1).min(len),
            None => 0,
        };
        let end = match before {
            Some(cursor) => decode_offset(cursor)?.min(len),
            None => len,
        };

        Ok(Window {
            start,
            end,
            backward_anchor: Anchor::End,
        })
    }

    fn fetch(&self, range: Range<usize>) -> Result<Vec<Edge<T>>> {
        let offset = range.start;
        Ok(self.items[range]
            .iter()
            .enumerate()
            .map(|(i, item)| Edge {
                cursor: encode_offset(offset + i),
                node: item.clone(),
            })
            .collect())
    }
}

/// Test result rows already ordered by `(field, name)`, paginated by keyset
/// cursors.
///
/// Cursors are resolved by binary search and only the requested page is
/// cloned out of the source.
pub struct KeysetSource<'a> {
    rows: &'a [TestResultRow],
    field: OrderingField,
    descending: bool,
    page_size: usize,
}

impl<'a> KeysetSource<'a> {
    pub fn new(
        rows: &'a [TestResultRow],
        field: OrderingField,
        descending: bool,
        page_size: usize,
    ) -> Self {
        Self {
            rows,
            field,
            descending,
            page_size,
        }
    }

    fn resume_position(&self, cursor: &str) -> Result<usize> {
        let value = cursor::decode(cursor)?;
        find_resume_position(self.rows, self.field, Some(&value), self.descending)
    }
}

impl PageSource for KeysetSource<'_> {
    type Node = TestResultRow;

    fn count(&self) -> usize {
        self.rows.len()
    }

    fn default_page_size(&self) -> Option<usize> {
        Some(self.page_size)
    }

    fn window(&self, after: Option<&str>, before: Option<&str>) -> Result<Window> {
        let mut start = match after {
            Some(cursor) => self.resume_position(cursor)?,
            None => 0,
        };

        // A `before` cursor is a boundary: `last` counts the rows next to it
        let backward_anchor = match before {
            Some(cursor) => {
                start = start.max(self.resume_position(cursor)?);
                Anchor::Start
            }
            None => Anchor::End,
        };

        Ok(Window {
            start,
            end: self.rows.len(),
            backward_anchor,
        })
    }

    fn fetch(&self, range: Range<usize>) -> Result<Vec<Edge<TestResultRow>>> {
        Ok(self.rows[range]
            .iter()
            .map(|row| Edge {
                cursor: cursor::encode(row, self.field),
                node: row.clone(),
            })
            .collect())
    }
}
