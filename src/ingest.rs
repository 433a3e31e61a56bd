//! Single-pass log ingestion.
//!
//! [`LogIngestor::ingest`] reads any `BufRead` line by line, parses each line,
//! extracts features, cleans the message text, tracks posting intervals and
//! hands finished [`MessageRecord`]s to a [`RecordSink`] in batches. Malformed
//! lines are counted and skipped; only I/O and storage errors end the run.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

use crate::config::{IngestConfig, InputConfig};
use crate::db::Database;
use crate::decode::Utf16Reader;
use crate::error::Result;
use crate::features::TextFeatures;
use crate::interval::IntervalTracker;
use crate::logging::OperationTimer;
use crate::metrics::PipelineMetrics;
use crate::models::MessageRecord;
use crate::nlp::NlpProcessor;
use crate::parser::{parse_line, LineRejection};

/// Destination for accepted message records
#[cfg_attr(test, mockall::automock)]
pub trait RecordSink {
    /// Store a batch of records, in stream order
    fn write_batch(&mut self, records: &[MessageRecord]) -> Result<()>;

    /// Make everything written so far durable
    fn finish(&mut self) -> Result<()>;
}

impl RecordSink for Vec<MessageRecord> {
    fn write_batch(&mut self, records: &[MessageRecord]) -> Result<()> {
        self.extend_from_slice(records);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Rejected lines broken down by reason
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCounts {
    /// Lines that do not start with a timestamp
    pub missing_marker: usize,
    /// Lines whose timestamp does not parse
    pub bad_timestamp: usize,
    /// Lines that do not split into author and message
    pub field_count: usize,
}

impl RejectionCounts {
    fn record(&mut self, rejection: LineRejection) {
        match rejection {
            LineRejection::MissingMarker => self.missing_marker += 1,
            LineRejection::BadTimestamp => self.bad_timestamp += 1,
            LineRejection::FieldCount(_) => self.field_count += 1,
        }
    }
}

/// Outcome of one ingestion run
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Data lines read, header excluded
    pub lines_read: usize,
    /// Records handed to the sink
    pub records_written: usize,
    /// Lines rejected by the parser
    pub bad_lines: usize,
    /// Distinct authors among accepted lines
    pub authors: usize,
    /// Rejected lines by reason
    pub rejections: RejectionCounts,
}

/// Log ingestion pipeline
#[derive(Debug)]
pub struct LogIngestor {
    processor: NlpProcessor,
    batch_size: usize,
    skip_header: bool,
    metrics: PipelineMetrics,
}

impl LogIngestor {
    /// Create an ingestor; `skip_header` discards the first line of the stream
    pub fn new(config: &IngestConfig, skip_header: bool) -> Result<Self> {
        Ok(Self {
            processor: NlpProcessor::new()?,
            batch_size: config.batch_size.max(1),
            skip_header,
            metrics: PipelineMetrics::default(),
        })
    }

    /// Tallies accumulated across every `ingest` call on this ingestor
    #[must_use]
    pub const fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Turn one raw line into a record, updating the interval tracker on success
    pub fn process_line(
        &self,
        line: &str,
        tracker: &mut IntervalTracker,
    ) -> std::result::Result<MessageRecord, LineRejection> {
        let parsed = parse_line(line)?;

        let author_features = TextFeatures::extract(&parsed.author);
        let message_features = TextFeatures::extract(&parsed.message);
        let clean_message = self.processor.clean_message(&parsed.message);
        let interval = tracker.record_and_get_interval(&parsed.author, parsed.timestamp);

        Ok(MessageRecord {
            timestamp: parsed.timestamp,
            author: parsed.author,
            message: parsed.message,
            clean_message,
            author_features,
            message_features,
            interval,
        })
    }

    /// Run the pipeline over `reader`, writing accepted records to `sink`.
    ///
    /// The sink is finished only after the whole stream has been read, so a
    /// transactional sink commits all records or none.
    pub fn ingest<R, S>(&mut self, reader: R, sink: &mut S) -> Result<IngestReport>
    where
        R: BufRead,
        S: RecordSink + ?Sized,
    {
        let mut tracker = IntervalTracker::new();
        let mut report = IngestReport::default();
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut lines = reader.lines();

        if self.skip_header {
            if let Some(header) = lines.next() {
                let header = header?;
                trace!(%header, "Discarded header line");
            }
        }

        for line in lines {
            let line = line.map_err(|e| {
                warn!(lines_read = report.lines_read, "Log stream failed mid-read");
                e
            })?;
            report.lines_read += 1;

            match self.process_line(&line, &mut tracker) {
                Ok(record) => {
                    self.metrics.record_line(true);
                    batch.push(record);
                    if batch.len() >= self.batch_size {
                        self.flush(&mut batch, sink, &mut report)?;
                    }
                }
                Err(rejection) => {
                    self.metrics.record_line(false);
                    report.bad_lines += 1;
                    report.rejections.record(rejection);
                    trace!(line_number = report.lines_read, %rejection, "Skipped malformed line");
                }
            }
        }

        self.flush(&mut batch, sink, &mut report)?;
        sink.finish()?;

        report.authors = tracker.author_count();
        if report.lines_read > 0 && report.records_written == 0 {
            warn!(bad_lines = report.bad_lines, "No line of the log could be parsed");
        }
        info!(
            lines_read = report.lines_read,
            records = report.records_written,
            bad_lines = report.bad_lines,
            authors = report.authors,
            "Ingestion complete"
        );

        Ok(report)
    }

    fn flush<S: RecordSink + ?Sized>(
        &mut self,
        batch: &mut Vec<MessageRecord>,
        sink: &mut S,
        report: &mut IngestReport,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let started = Instant::now();
        sink.write_batch(batch)?;
        self.metrics.record_batch_written(batch.len(), started.elapsed());
        report.records_written += batch.len();
        batch.clear();
        Ok(())
    }
}

/// Open a UTF-16 log file as a UTF-8 line reader.
///
/// The byte order comes from the BOM when present, little-endian otherwise.
/// Malformed UTF-16 fails the read with [`std::io::ErrorKind::InvalidData`].
pub fn open_log(path: &Path) -> Result<BufReader<Utf16Reader<File>>> {
    let file = File::open(path)?;
    Ok(BufReader::new(Utf16Reader::new(file)))
}

/// Ingest the log at `input.log_path` into a fresh chat log table
pub fn ingest_log_file(
    db: &mut Database,
    input: &InputConfig,
    config: &IngestConfig,
) -> Result<IngestReport> {
    let timer = OperationTimer::new("ingest");
    info!(path = %input.log_path.display(), "Ingesting chat log");

    let reader = open_log(&input.log_path)?;
    let mut ingestor = LogIngestor::new(config, input.has_header)?;
    let mut writer = db.chat_log_writer()?;
    let report = ingestor.ingest(reader, &mut writer)?;

    timer.finish();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatStyleError;
    use std::io::{self, Cursor, Read};

    /// Serves `data` for `ok_bytes` bytes, then fails every read
    struct FailingReader {
        data: Cursor<Vec<u8>>,
        ok_bytes: u64,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let remaining = self.ok_bytes.saturating_sub(self.data.position());
            if remaining == 0 {
                return Err(io::Error::other("device unplugged"));
            }
            let len = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            self.data.read(&mut buf[..len])
        }
    }

    fn ingestor(batch_size: usize, skip_header: bool) -> LogIngestor {
        LogIngestor::new(&IngestConfig { batch_size }, skip_header).expect("ingestor")
    }

    #[test]
    fn test_header_and_two_messages() {
        let log = "Channel ID: jita\n\
                   2014.07.01 10:00:00\tTrader Joe\tWTS [Rifter] cheap!\n\
                   2014.07.01 10:01:00\tTrader Joe\tstill selling\n";
        let mut records = Vec::new();
        let report = ingestor(10, true)
            .ingest(Cursor::new(log), &mut records)
            .expect("ingest");

        assert_eq!(report.bad_lines, 0);
        assert_eq!(report.lines_read, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].interval, -1);
        assert_eq!(records[1].interval, 60);
        assert_eq!(records[0].clean_message, "wts contractlink cheap");
        assert_eq!(records[0].message_features.capitals, 4);
    }

    #[test]
    fn test_header_read_error_is_fatal() {
        let log = "Channel ID: jita\n2014.07.01 10:00:00\tA\thello\n";
        let reader = io::BufReader::new(FailingReader {
            data: Cursor::new(log.as_bytes().to_vec()),
            ok_bytes: 0,
        });
        let mut sink = MockRecordSink::new();
        sink.expect_write_batch().times(0);
        sink.expect_finish().times(0);

        let result = ingestor(10, true).ingest(reader, &mut sink);
        assert!(matches!(result, Err(ChatStyleError::Io(_))));
    }

    #[test]
    fn test_all_malformed() {
        let log = "garbage\n\nalso garbage\n2014.07.01 10:00:00\tno-tab-message\n";
        let mut records = Vec::new();
        let report = ingestor(10, false)
            .ingest(Cursor::new(log), &mut records)
            .expect("ingest");

        assert!(records.is_empty());
        assert_eq!(report.bad_lines, 4);
        assert_eq!(report.rejections.missing_marker, 3);
        assert_eq!(report.rejections.field_count, 1);
    }

    #[test]
    fn test_empty_stream() {
        let mut records = Vec::new();
        let report = ingestor(10, true)
            .ingest(Cursor::new(""), &mut records)
            .expect("ingest");
        assert_eq!(report, IngestReport::default());
    }

    #[test]
    fn test_batches_are_flushed_in_order() {
        let log: String = (0..7)
            .map(|i| format!("2014.07.01 10:00:0{i}\tA\tmessage {i}\n"))
            .collect();

        let mut sink = MockRecordSink::new();
        let mut seq = mockall::Sequence::new();
        sink.expect_write_batch()
            .withf(|batch| batch.len() == 3)
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        sink.expect_write_batch()
            .withf(|batch| batch.len() == 1 && batch[0].message == "message 6")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        sink.expect_finish().times(1).in_sequence(&mut seq).returning(|| Ok(()));

        let mut ingestor = ingestor(3, false);
        let report = ingestor.ingest(Cursor::new(log), &mut sink).expect("ingest");
        assert_eq!(report.records_written, 7);
        assert_eq!(ingestor.metrics().records_written, 7);
    }

    #[test]
    fn test_sink_failure_aborts_without_finish() {
        let log = "2014.07.01 10:00:00\tA\thello\n";
        let mut sink = MockRecordSink::new();
        sink.expect_write_batch()
            .returning(|_| Err(ChatStyleError::Other("disk full".to_string())));
        sink.expect_finish().times(0);

        let result = ingestor(10, false).ingest(Cursor::new(log), &mut sink);
        assert!(matches!(result, Err(ChatStyleError::Other(_))));
    }
}
