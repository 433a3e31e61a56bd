//! Per-author posting interval tracking.

use std::collections::HashMap;

use chrono::NaiveDateTime;

/// Interval reported for an author's first message
pub const FIRST_MESSAGE_INTERVAL: i64 = -1;

/// Remembers when each author last posted.
///
/// Intervals are whatever the stream says they are: an out-of-order line yields
/// a negative interval rather than an error.
#[derive(Debug, Default)]
pub struct IntervalTracker {
    last_seen: HashMap<String, NaiveDateTime>,
}

impl IntervalTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message and return seconds since the author's previous one,
    /// or [`FIRST_MESSAGE_INTERVAL`] if this is their first.
    pub fn record_and_get_interval(&mut self, author: &str, timestamp: NaiveDateTime) -> i64 {
        match self.last_seen.get_mut(author) {
            Some(previous) => {
                let elapsed = (timestamp - *previous).num_seconds();
                *previous = timestamp;
                elapsed
            }
            None => {
                self.last_seen.insert(author.to_string(), timestamp);
                FIRST_MESSAGE_INTERVAL
            }
        }
    }

    /// Number of distinct authors seen so far
    #[must_use]
    pub fn author_count(&self) -> usize {
        self.last_seen.len()
    }
}
