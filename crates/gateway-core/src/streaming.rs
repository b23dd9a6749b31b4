//! Streamed response events handed to callers of `complete_stream`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One element of a decorated completion stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A content delta
    Chunk(StreamChunk),
    /// Terminal sentinel: the upstream finished normally
    Done(StreamSummary),
}

impl StreamEvent {
    /// Whether this is the terminal sentinel
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Text of a chunk; `None` for the sentinel
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Chunk(chunk) => Some(&chunk.text),
            Self::Done(_) => None,
        }
    }
}

/// A content delta decorated with gateway timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamChunk {
    /// Text delta
    pub text: String,
    /// Model that produced the delta
    pub model: String,
    /// Provider that served the stream
    pub provider: String,
    /// Milliseconds since the gateway accepted the request
    pub latency_ms: u64,
    /// Time the gateway forwarded the delta
    pub timestamp: DateTime<Utc>,
}

/// Summary carried by the terminal sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSummary {
    /// Number of chunks delivered
    pub chunks: u64,
    /// Milliseconds from acceptance to end of stream
    pub latency_ms: u64,
}
