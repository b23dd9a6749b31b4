//! Server-sent event line framing.
//!
//! Bytes are buffered until a newline arrives, so frames and multi-byte
//! UTF-8 sequences split across network reads decode the same as when they
//! arrive whole. Only `data:` fields matter to the adapters; comments and
//! other fields are dropped.
//!
//! A line longer than [`MAX_PENDING_BYTES`] is discarded up to its newline
//! instead of being buffered.

use tracing::warn;

/// Most bytes held while waiting for a newline
pub const MAX_PENDING_BYTES: usize = 1 << 20;

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Payload of a `data:` line
    Data(String),
    /// The `[DONE]` terminator
    Done,
}

/// Incremental line decoder
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
    discarding: bool,
}

impl SseLineDecoder {
    /// Create an empty decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every frame completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        let mut bytes = bytes;
        if self.discarding {
            let Some(newline) = bytes.iter().position(|&b| b == b'\n') else {
                return Vec::new();
            };
            self.discarding = false;
            bytes = &bytes[newline + 1..];
        }
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|&b| b == b'\n') {
            let end = start + offset;
            if let Some(frame) = parse_line(&self.buffer[start..end]) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);

        if self.buffer.len() > MAX_PENDING_BYTES {
            warn!(pending = self.buffer.len(), "Discarding oversized event stream line");
            self.buffer = Vec::new();
            self.discarding = true;
        }
        frames
    }

    /// Parse whatever remains after the body ended without a final newline.
    ///
    /// A bare JSON object is accepted as data.
    pub fn finish(&mut self) -> Option<SseFrame> {
        self.discarding = false;
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }

    /// Bytes waiting for a newline
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn parse_line(raw: &[u8]) -> Option<SseFrame> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    let payload = if let Some(data) = line.strip_prefix("data:") {
        data.trim_start()
    } else if line.starts_with('{') {
        line
    } else {
        return None;
    };

    if payload == "[DONE]" {
        Some(SseFrame::Done)
    } else if payload.is_empty() {
        None
    } else {
        Some(SseFrame::Data(payload.to_string()))
    }
}
