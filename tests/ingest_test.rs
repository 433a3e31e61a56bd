//! Ingestion from UTF-16 log files into SQLite

mod common;

use std::io::{self, BufReader, Cursor, Read};

use chatlog_style::config::{IngestConfig, InputConfig};
use chatlog_style::db::Database;
use chatlog_style::ingest::{ingest_log_file, open_log, LogIngestor};
use chatlog_style::models::MessageRecord;
use chatlog_style::ChatStyleError;
use common::{log_line, log_text, utf16be, utf16le, write_file};

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

fn input(path: std::path::PathBuf) -> InputConfig {
    InputConfig {
        log_path: path,
        has_header: true,
    }
}

#[test]
fn test_two_messages_sixty_seconds_apart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let text = log_text(&[
        log_line(0, "Trader Joe", "WTS [Rifter] cheap"),
        log_line(60, "Trader Joe", "still selling, see http://example.com"),
    ]);
    let log = write_file(dir.path(), "chat.log", &utf16le(&text, true));
    let mut db = Database::open(&dir.path().join("chat.sqlite")).expect("db");

    let report = ingest_log_file(&mut db, &input(log), &IngestConfig::default()).expect("ingest");

    assert_eq!(report.lines_read, 2);
    assert_eq!(report.bad_lines, 0);
    assert_eq!(report.records_written, 2);
    assert_eq!(report.authors, 1);

    let records = db.load_chat_log().expect("load");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].interval, -1);
    assert_eq!(records[1].interval, 60);
    assert_eq!(records[0].author, "Trader Joe");
    assert_eq!(records[0].author_features.capitals, 2);
    assert_eq!(records[0].clean_message, "wts contractlink cheap");
    assert_eq!(records[1].clean_message, "still sell see urllink");
}

#[test]
fn test_in_memory_sink_matches_sqlite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let text = log_text(&[
        log_line(0, "A", "first"),
        log_line(5, "B", "hello there"),
        log_line(65, "A", "second"),
    ]);
    let log = write_file(dir.path(), "chat.log", &utf16le(&text, true));

    let mut memory: Vec<MessageRecord> = Vec::new();
    LogIngestor::new(&IngestConfig::default(), true)
        .expect("ingestor")
        .ingest(Cursor::new(text), &mut memory)
        .expect("ingest");

    let mut db = Database::open_in_memory().expect("db");
    ingest_log_file(&mut db, &input(log), &IngestConfig { batch_size: 2 }).expect("ingest");

    assert_eq!(db.load_chat_log().expect("load"), memory);
    let intervals: Vec<i64> = memory.iter().map(|r| r.interval).collect();
    assert_eq!(intervals, vec![-1, -1, 65]);
}

#[test]
fn test_big_endian_and_bomless_logs_decode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let text = log_text(&[log_line(0, "Ålesund Pilot", "o7 fly safe")]);

    for (name, bytes) in [
        ("be.log", utf16be(&text)),
        ("nobom.log", utf16le(&text, false)),
    ] {
        let path = write_file(dir.path(), name, &bytes);
        let mut records: Vec<MessageRecord> = Vec::new();
        let report = LogIngestor::new(&IngestConfig::default(), true)
            .expect("ingestor")
            .ingest(open_log(&path).expect("open"), &mut records)
            .expect("ingest");
        assert_eq!(report.bad_lines, 0, "{name}");
        assert_eq!(records[0].author, "Ålesund Pilot", "{name}");
        assert_eq!(records[0].author_features.non_alnum, 1, "{name}");
    }
}

#[test]
fn test_malformed_lines_are_counted_and_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let text = log_text(&[
        log_line(0, "A", "fine"),
        "  continuation of a wrapped message".to_string(),
        "2014.13.45 99:99:99\tA\tbad clock".to_string(),
        log_line(10, "A", "has\textra tab"),
        log_line(20, "A", "fine again"),
    ]);
    let log = write_file(dir.path(), "chat.log", &utf16le(&text, true));
    let mut db = Database::open_in_memory().expect("db");

    let report = ingest_log_file(&mut db, &input(log), &IngestConfig::default()).expect("ingest");

    assert_eq!(report.lines_read, 5);
    assert_eq!(report.bad_lines, 3);
    assert_eq!(report.rejections.missing_marker, 1);
    assert_eq!(report.rejections.bad_timestamp, 1);
    assert_eq!(report.rejections.field_count, 1);
    let intervals: Vec<i64> = db
        .load_messages()
        .expect("load")
        .iter()
        .map(|m| m.interval)
        .collect();
    assert_eq!(intervals, vec![-1, 20]);
}

#[test]
fn test_reingest_replaces_previous_contents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut db = Database::open(&dir.path().join("chat.sqlite")).expect("db");

    let first = write_file(
        dir.path(),
        "first.log",
        &utf16le(&log_text(&[log_line(0, "A", "one"), log_line(1, "A", "two")]), true),
    );
    ingest_log_file(&mut db, &input(first), &IngestConfig::default()).expect("ingest");
    assert_eq!(db.count_chat_log().expect("count"), 2);

    let second = write_file(
        dir.path(),
        "second.log",
        &utf16le(&log_text(&[log_line(0, "B", "three")]), true),
    );
    ingest_log_file(&mut db, &input(second), &IngestConfig::default()).expect("ingest");
    let messages = db.load_messages().expect("load");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].author, "B");
}

#[test]
fn test_missing_log_file_is_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut db = Database::open_in_memory().expect("db");
    let result = ingest_log_file(
        &mut db,
        &input(dir.path().join("absent.log")),
        &IngestConfig::default(),
    );
    assert!(matches!(result, Err(ChatStyleError::Io(_))));
}

#[test]
fn test_read_failure_mid_stream_rolls_back() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut db = Database::open(&dir.path().join("chat.sqlite")).expect("db");
    let first = write_file(
        dir.path(),
        "first.log",
        &utf16le(&log_text(&[log_line(0, "A", "one"), log_line(1, "A", "two")]), true),
    );
    ingest_log_file(&mut db, &input(first), &IngestConfig::default()).expect("ingest");

    let text = log_text(&[
        log_line(0, "B", "three"),
        log_line(5, "B", "four"),
        log_line(9, "B", "five"),
    ]);
    // Header and the first two data lines arrive, then the device fails
    let ok_bytes: usize = text.split_inclusive('\n').take(3).map(str::len).sum();
    let reader = BufReader::with_capacity(
        16,
        FailingReader {
            data: Cursor::new(text.into_bytes()),
            ok_bytes: ok_bytes as u64,
        },
    );

    let result = {
        let mut writer = db.chat_log_writer().expect("writer");
        LogIngestor::new(&IngestConfig { batch_size: 1 }, true)
            .expect("ingestor")
            .ingest(reader, &mut writer)
    };

    assert!(matches!(result, Err(ChatStyleError::Io(_))));
    assert_eq!(db.count_chat_log().expect("count"), 2);
    let messages = db.load_messages().expect("load");
    assert!(messages.iter().all(|m| m.author == "A"));
}

#[test]
fn test_invalid_utf16_fails_ingest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut db = Database::open(&dir.path().join("chat.sqlite")).expect("db");
    let good = write_file(
        dir.path(),
        "good.log",
        &utf16le(&log_text(&[log_line(0, "A", "fine")]), true),
    );
    ingest_log_file(&mut db, &input(good), &IngestConfig::default()).expect("ingest");

    // A lone high surrogate spliced into the message "one"
    let mut bytes = utf16le(&log_text(&[log_line(0, "A", "o")]), true);
    bytes.truncate(bytes.len() - 4);
    bytes.extend_from_slice(&0xD800_u16.to_le_bytes());
    bytes.extend_from_slice(&utf16le("ne\r\n", false));
    let bad = write_file(dir.path(), "bad.log", &bytes);

    let result = ingest_log_file(&mut db, &input(bad), &IngestConfig::default());
    match result {
        Err(ChatStyleError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::InvalidData),
        other => panic!("expected an invalid data error, got {other:?}"),
    }
    assert_eq!(db.count_chat_log().expect("count"), 1);
}
