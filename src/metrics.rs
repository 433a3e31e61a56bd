use std::time::Duration;

use anyhow::Result;
use metrics::{counter, histogram};

/// Metric names emitted through the `metrics` facade
pub mod names {
    /// Raw lines read from the log
    pub const LINES_READ: &str = "chatlog_style_lines_read_total";
    /// Lines rejected by the parser
    pub const BAD_LINES: &str = "chatlog_style_bad_lines_total";
    /// Message records handed to storage
    pub const RECORDS_WRITTEN: &str = "chatlog_style_records_written_total";
    /// Seconds spent writing one batch
    pub const BATCH_WRITE_DURATION: &str = "chatlog_style_batch_write_duration_seconds";
    /// Authors with a summary row
    pub const AUTHORS_SUMMARIZED: &str = "chatlog_style_authors_summarized_total";
    /// Authors excluded from the summary
    pub const AUTHORS_SKIPPED: &str = "chatlog_style_authors_skipped_total";
    /// Seconds spent in a whole pipeline stage
    pub const STAGE_DURATION: &str = "chatlog_style_stage_duration_seconds";
}

/// Local tallies for one pipeline run, mirrored into the `metrics` facade.
///
/// Without an installed recorder the facade calls are no-ops, so the tallies
/// are what tests and run reports read.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineMetrics {
    /// Raw lines read
    pub lines_read: u64,
    /// Lines rejected by the parser
    pub bad_lines: u64,
    /// Records handed to storage
    pub records_written: u64,
    /// Authors with a summary row
    pub authors_summarized: u64,
    /// Authors excluded from the summary
    pub authors_skipped: u64,
}

impl PipelineMetrics {
    /// Install the no-op recorder; fails if a recorder is already installed
    pub fn init() -> Result<()> {
        metrics::set_global_recorder(metrics::NoopRecorder)
            .map_err(|e| anyhow::anyhow!("Failed to initialize metrics recorder: {e}"))
    }

    /// Record one raw line and whether the parser accepted it
    pub fn record_line(&mut self, accepted: bool) {
        self.lines_read += 1;
        counter!(names::LINES_READ).increment(1);
        if !accepted {
            self.bad_lines += 1;
            counter!(names::BAD_LINES).increment(1);
        }
    }

    /// Record a batch handed to storage
    pub fn record_batch_written(&mut self, count: usize, duration: Duration) {
        self.records_written += count as u64;
        counter!(names::RECORDS_WRITTEN).increment(count as u64);
        histogram!(names::BATCH_WRITE_DURATION).record(duration.as_secs_f64());
    }

    /// Record whether an author made it into the summary table
    pub fn record_author(&mut self, summarized: bool) {
        if summarized {
            self.authors_summarized += 1;
            counter!(names::AUTHORS_SUMMARIZED).increment(1);
        } else {
            self.authors_skipped += 1;
            counter!(names::AUTHORS_SKIPPED).increment(1);
        }
    }

    /// Record the wall time of a whole stage
    pub fn record_stage(stage: &'static str, duration: Duration) {
        histogram!(names::STAGE_DURATION, "stage" => stage).record(duration.as_secs_f64());
    }
}
