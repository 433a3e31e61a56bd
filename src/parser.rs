//! Line parser for the chat log format.
//!
//! Every data line looks like `YYYY.MM.DD HH:MM:SS<sep>author<TAB>message`.
//! Anything else is rejected with a [`LineRejection`] the caller counts and
//! skips; parsing never panics on arbitrary input.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::models::ParsedLine;

/// First character of every valid log entry
pub const ENTRY_MARKER: char = '2';
/// Width of the leading timestamp field, in characters
pub const TIMESTAMP_WIDTH: usize = 19;
/// Format of the leading timestamp field
pub const TIMESTAMP_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

/// Why a line was not accepted
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRejection {
    /// The line does not start with the entry marker
    #[error("line does not start with a timestamp")]
    MissingMarker,
    /// The first 19 characters are not a valid timestamp
    #[error("malformed timestamp")]
    BadTimestamp,
    /// The remainder did not split into exactly author and message
    #[error("expected 2 tab-separated fields, found {0}")]
    FieldCount(usize),
}

/// Parse one raw log line.
pub fn parse_line(line: &str) -> Result<ParsedLine, LineRejection> {
    if !line.starts_with(ENTRY_MARKER) {
        return Err(LineRejection::MissingMarker);
    }

    // Byte offset just past the timestamp, and just past the separator after it
    let mut boundaries = line
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(line.len()))
        .skip(TIMESTAMP_WIDTH);
    let Some(timestamp_end) = boundaries.next() else {
        return Err(LineRejection::BadTimestamp);
    };
    let fields_start = boundaries.next().unwrap_or(line.len());

    let timestamp = NaiveDateTime::parse_from_str(&line[..timestamp_end], TIMESTAMP_FORMAT)
        .map_err(|_| LineRejection::BadTimestamp)?;

    let fields: Vec<&str> = line[fields_start..].trim().split('\t').collect();
    match fields.as_slice() {
        [author, message] => Ok(ParsedLine {
            timestamp,
            author: (*author).to_string(),
            message: (*message).to_string(),
        }),
        other => Err(LineRejection::FieldCount(other.len())),
    }
}
