//! Chunk reassembly for the debate event stream.
//!
//! The transport hands over arbitrarily sized byte chunks with no frame
//! alignment. [`FrameDecoder`] buffers them, cuts complete records at each
//! blank line and keeps the trailing partial record for the next chunk.

use tracing::{debug, warn};

use crate::error::FrameError;
use crate::protocol::Frame;

/// Record separator on the wire.
pub const DELIMITER: &str = "\n\n";

const DATA_PREFIX: &str = "data: ";

/// Incremental decoder from raw stream bytes to [`Frame`]s.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes of a UTF-8 sequence split across chunks.
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a delimiter.
    buffer: String,
    decoded: u64,
    skipped: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every frame it completes, in wire order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        // The buffered text holds no delimiter, so only its tail can start one.
        let mut from = self.buffer.len().saturating_sub(DELIMITER.len() - 1);
        while !self.buffer.is_char_boundary(from) {
            from -= 1;
        }
        self.append_utf8(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer[from..].find(DELIMITER) {
            let end = from + pos;
            let record: String = self.buffer.drain(..end + DELIMITER.len()).collect();
            if let Some(frame) = self.decode(&record[..end]) {
                frames.push(frame);
            }
            from = 0;
        }
        frames
    }

    /// End of stream: decode whatever is left as a final, unterminated record.
    pub fn finish(&mut self) -> Option<Frame> {
        if !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.buffer.push_str(&tail);
            self.pending.clear();
        }
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            return None;
        }
        self.decode(&rest)
    }

    /// Frames successfully decoded so far.
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// `data:` records dropped because their payload did not parse.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Bytes held back waiting for the rest of a record.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() + self.pending.len()
    }

    fn decode(&mut self, record: &str) -> Option<Frame> {
        match parse_record(record) {
            Ok(Some(frame)) => {
                self.decoded += 1;
                debug!(kind = frame.kind(), n = self.decoded, "frame decoded");
                Some(frame)
            }
            Ok(None) => None,
            Err(e) => {
                self.skipped += 1;
                warn!(error = %e, "skipping malformed record");
                None
            }
        }
    }

    fn append_utf8(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[..valid]) {
                        self.buffer.push_str(text);
                    }
                    match e.error_len() {
                        // Truncated sequence at the end: wait for the next chunk.
                        None => {
                            self.pending.drain(..valid);
                            return;
                        }
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                    }
                }
            }
        }
    }
}

/// Parse one delimiter-free record.
///
/// Returns `Ok(None)` for records without a `data: ` line (comments,
/// keep-alives, blank padding); those are discarded silently.
pub fn parse_record(record: &str) -> Result<Option<Frame>, FrameError> {
    let Some(payload) = record
        .lines()
        .find_map(|line| line.strip_prefix(DATA_PREFIX))
        .filter(|p| !p.is_empty())
    else {
        return Ok(None);
    };

    serde_json::from_str::<Frame>(payload)
        .map(Some)
        .map_err(|e| FrameError {
            payload: payload.to_string(),
            detail: e.to_string(),
        })
}
