use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::analytics::{OrderingField, TestResultRow};
use crate::error::{Result, TestLensError};

/// Joins the ordered value and the name inside a cursor. Rendered sort values
/// never contain it and names are escaped.
const SEPARATOR: char = '\u{1f}';

const ESCAPE: char = '%';

const OFFSET_PREFIX: &str = "offset:";

/// Decoded keyset cursor: the row's rendered ordering value and its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorValue {
    pub ordered_value: String,
    pub name: String,
}

/// Opaque cursor pointing at `row` within a listing ordered by `field`.
pub fn encode(row: &TestResultRow, field: OrderingField) -> String {
    let value = field.key(row).render();
    STANDARD.encode(format!("{value}{SEPARATOR}{}", escape_name(&row.name)))
}

/// Reverses [`encode`].
///
/// # Errors
///
/// Returns `TestLensError::MalformedCursor` if the cursor is not valid base64,
/// not UTF-8, or does not contain exactly one separator.
pub fn decode(cursor: &str) -> Result<CursorValue> {
    let text = decode_text(cursor)?;

    let mut parts = text.split(SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(ordered_value), Some(name), None) => Ok(CursorValue {
            ordered_value: ordered_value.to_string(),
            name: unescape_name(name).ok_or_else(|| {
                TestLensError::MalformedCursor(format!("cursor '{cursor}' holds a bad escape"))
            })?,
        }),
        _ => Err(TestLensError::MalformedCursor(format!(
            "cursor '{cursor}' does not hold a value/name pair"
        ))),
    }
}

fn escape_name(name: &str) -> String {
    name.replace(ESCAPE, "%25").replace(SEPARATOR, "%1F")
}

fn unescape_name(escaped: &str) -> Option<String> {
    let mut name = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != ESCAPE {
            name.push(c);
            continue;
        }
        match (chars.next(), chars.next()) {
            (Some('2'), Some('5')) => name.push(ESCAPE),
            (Some('1'), Some('F')) => name.push(SEPARATOR),
            _ => return None,
        }
    }
    Some(name)
}

/// Cursor for a position in an in-memory sequence.
pub fn encode_offset(offset: usize) -> String {
    STANDARD.encode(format!("{OFFSET_PREFIX}{offset}"))
}

/// Reverses [`encode_offset`].
///
/// # Errors
///
/// Returns `TestLensError::Validation` unless the cursor decodes to a numeric
/// offset.
pub fn decode_offset(cursor: &str) -> Result<usize> {
    let invalid = || TestLensError::Validation(format!("invalid cursor '{cursor}'"));

    let text = decode_text(cursor).map_err(|_| invalid())?;
    text.strip_prefix(OFFSET_PREFIX)
        .and_then(|offset| offset.parse::<usize>().ok())
        .ok_or_else(invalid)
}

fn decode_text(cursor: &str) -> Result<String> {
    let bytes = STANDARD
        .decode(cursor)
        .map_err(|e| TestLensError::MalformedCursor(format!("cursor '{cursor}': {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| TestLensError::MalformedCursor(format!("cursor '{cursor}': {e}")))
}
