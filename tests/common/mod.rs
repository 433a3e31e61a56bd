//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Midnight of the fixture day
pub fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2014, 7, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .expect("valid fixture date")
}

/// One data line, `offset` seconds after [`base_time`]
pub fn log_line(offset: i64, author: &str, message: &str) -> String {
    let at = base_time() + Duration::seconds(offset);
    format!("{}\t{author}\t{message}", at.format("%Y.%m.%d %H:%M:%S"))
}

/// Encode `text` as UTF-16 little-endian, optionally with a byte order mark
pub fn utf16le(text: &str, bom: bool) -> Vec<u8> {
    let mut bytes = if bom { vec![0xFF, 0xFE] } else { Vec::new() };
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

/// Encode `text` as UTF-16 big-endian with a byte order mark
pub fn utf16be(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}

/// Write `bytes` to `name` inside `dir`
pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fixture file");
    path
}

/// A header line plus the given data lines, CRLF-terminated
pub fn log_text(lines: &[String]) -> String {
    let mut text = String::from("  Channel ID:      jita\r\n");
    for line in lines {
        text.push_str(line);
        text.push_str("\r\n");
    }
    text
}
