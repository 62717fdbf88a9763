use std::cmp::Ordering;

use crate::analytics::{compare_keys, OrderingField, TestResultRow};
use crate::error::Result;

use super::cursor::CursorValue;

/// Index at which a listing resumes after `cursor`.
///
/// `rows` must be sorted by `(field, name)`, reversed when `descending`. The
/// cursor row itself is excluded. When the cursor row no longer exists the
/// search lands on the first row that sorts strictly after the cursor's
/// `(value, name)` pair, so pagination tolerates rows disappearing between
/// requests. Without a cursor the listing starts at index 0.
///
/// # Errors
///
/// Returns `TestLensError::Validation` if the cursor value does not parse as
/// `field`'s type.
pub fn find_resume_position(
    rows: &[TestResultRow],
    field: OrderingField,
    cursor: Option<&CursorValue>,
    descending: bool,
) -> Result<usize> {
    let Some(cursor) = cursor else {
        return Ok(0);
    };

    let cursor_key = field.parse_key(&cursor.ordered_value)?;

    Ok(rows.partition_point(|row| {
        compare_keys(
            (&field.key(row), row.name.as_str()),
            (&cursor_key, cursor.name.as_str()),
            descending,
        ) != Ordering::Greater
    }))
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::analytics::compare_rows;
    use crate::analytics::row::fixtures::create_row;

    fn rows_with_durations(entries: &[(&str, f64)], descending: bool) -> Vec<TestResultRow> {
        let mut rows: Vec<_> = entries
            .iter()
            .map(|(name, duration)| {
                let mut row = create_row(name);
                row.avg_duration = *duration;
                row
            })
            .collect();
        rows.sort_by(|a, b| compare_rows(a, b, OrderingField::AvgDuration, descending));
        rows
    }

    fn cursor(value: &str, name: &str) -> CursorValue {
        CursorValue {
            ordered_value: value.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn no_cursor_starts_at_beginning() {
        let rows = rows_with_durations(&[("a", 1.0), ("b", 2.0)], false);
        let position =
            find_resume_position(&rows, OrderingField::AvgDuration, None, false).unwrap();
        assert_eq!(position, 0);
    }

    #[test]
    fn exact_match_resumes_after_cursor_row() {
        let rows = rows_with_durations(&[("a", 1.0), ("b", 2.0), ("c", 3.0)], false);

        let position = find_resume_position(
            &rows,
            OrderingField::AvgDuration,
            Some(&cursor("2", "b")),
            false,
        )
        .unwrap();

        assert_eq!(position, 2);
    }

    #[test]
    fn exact_match_descending() {
        let rows = rows_with_durations(&[("a", 1.0), ("b", 2.0), ("c", 3.0)], true);
        assert_eq!(rows[0].name, "c");

        let position = find_resume_position(
            &rows,
            OrderingField::AvgDuration,
            Some(&cursor("3", "c")),
            true,
        )
        .unwrap();

        assert_eq!(position, 1);
    }

    #[test]
    fn missing_value_between_rows() {
        let rows = rows_with_durations(&[("a", 1.0), ("b", 2.0), ("c", 4.0)], false);

        let ascending = find_resume_position(
            &rows,
            OrderingField::AvgDuration,
            Some(&cursor("3", "gone")),
            false,
        )
        .unwrap();
        assert_eq!(rows[ascending].name, "c");

        let rows = rows_with_durations(&[("a", 1.0), ("b", 2.0), ("c", 4.0)], true);
        let descending = find_resume_position(
            &rows,
            OrderingField::AvgDuration,
            Some(&cursor("3", "gone")),
            true,
        )
        .unwrap();
        assert_eq!(rows[descending].name, "b");
    }

    #[test]
    fn equal_values_tie_break_on_name() {
        let rows = rows_with_durations(&[("a", 5.0), ("c", 5.0), ("e", 5.0)], false);

        // "b" was deleted: resume at the next name after it
        let position = find_resume_position(
            &rows,
            OrderingField::AvgDuration,
            Some(&cursor("5", "b")),
            false,
        )
        .unwrap();
        assert_eq!(rows[position].name, "c");

        let rows = rows_with_durations(&[("a", 5.0), ("c", 5.0), ("e", 5.0)], true);
        let position = find_resume_position(
            &rows,
            OrderingField::AvgDuration,
            Some(&cursor("5", "d")),
            true,
        )
        .unwrap();
        assert_eq!(rows[position].name, "c");
    }

    #[test]
    fn cursor_past_the_end() {
        let rows = rows_with_durations(&[("a", 1.0), ("b", 2.0)], false);
        let position = find_resume_position(
            &rows,
            OrderingField::AvgDuration,
            Some(&cursor("9", "z")),
            false,
        )
        .unwrap();
        assert_eq!(position, rows.len());
    }

    #[test]
    fn unparsable_value_is_rejected() {
        let rows = rows_with_durations(&[("a", 1.0)], false);
        let error = find_resume_position(
            &rows,
            OrderingField::AvgDuration,
            Some(&cursor("fast", "a")),
            false,
        )
        .unwrap_err();
        assert!(error.is_validation());
    }
}
