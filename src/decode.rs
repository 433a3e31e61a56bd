//! Strict UTF-16 decoding of chat log files.
//!
//! [`Utf16Reader`] adapts a byte stream into UTF-8 for `BufRead::lines`.
//! Malformed input (lone surrogates, a dangling odd byte) is an
//! [`io::ErrorKind::InvalidData`] error instead of a replacement character.

use std::io::{self, Read};

use encoding_rs::{Decoder, DecoderResult, UTF_16LE};

const CHUNK_SIZE: usize = 8 * 1024;

/// UTF-16 to UTF-8 reader.
///
/// The byte order comes from the BOM when present, little-endian otherwise.
/// The BOM itself is not passed through.
pub struct Utf16Reader<R> {
    inner: R,
    decoder: Decoder,
    input: Vec<u8>,
    decoded: Vec<u8>,
    position: usize,
    bytes_read: u64,
    finished: bool,
}

impl<R: Read> Utf16Reader<R> {
    /// Wrap a UTF-16 byte stream
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            decoder: UTF_16LE.new_decoder(),
            input: vec![0; CHUNK_SIZE],
            decoded: Vec::new(),
            position: 0,
            bytes_read: 0,
            finished: false,
        }
    }

    /// Decode the next chunk of input into `self.decoded`
    fn fill(&mut self) -> io::Result<()> {
        let read = self.inner.read(&mut self.input)?;
        let last = read == 0;

        let capacity = self
            .decoder
            .max_utf8_buffer_length_without_replacement(read)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "log chunk too large to decode"))?;
        let mut text = String::with_capacity(capacity);
        let (result, _) = self
            .decoder
            .decode_to_string_without_replacement(&self.input[..read], &mut text, last);

        match result {
            DecoderResult::InputEmpty => {}
            DecoderResult::Malformed(_, _) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid UTF-16 near byte {}", self.bytes_read + read as u64),
                ));
            }
            DecoderResult::OutputFull => {
                return Err(io::Error::other("UTF-16 decode buffer overflow"));
            }
        }

        self.bytes_read += read as u64;
        self.decoded = text.into_bytes();
        self.position = 0;
        self.finished = last;
        Ok(())
    }
}

impl<R: Read> Read for Utf16Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.position == self.decoded.len() {
            if self.finished {
                return Ok(0);
            }
            self.fill()?;
        }

        let available = &self.decoded[self.position..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n;
        Ok(n)
    }
}

impl<R> std::fmt::Debug for Utf16Reader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Utf16Reader")
            .field("bytes_read", &self.bytes_read)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
