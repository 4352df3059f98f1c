//! Newline-delimited record reassembly
//!
//! The backend streams its reply as newline-delimited records, but the
//! transport is free to cut chunks anywhere: mid-record, mid-codepoint, or
//! several records at once. [`MessageReassembler`] buffers raw bytes and
//! only decodes a line once its terminating `\n` has arrived, so a
//! multi-byte character split across chunks is never decoded in halves.

use futures::{Stream, StreamExt};
use serde_json::{Value, json};

use crate::Result;

/// One logical record recovered from the reply stream
#[derive(Debug, Clone, PartialEq)]
pub struct ReassembledMessage {
    payload: Value,
}

impl ReassembledMessage {
    /// Classify one raw line
    ///
    /// JSON lines keep their parsed structure; anything else becomes
    /// `{"text": <trimmed line>}`. Whitespace-only lines yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let payload = serde_json::from_str::<Value>(trimmed)
            .unwrap_or_else(|_| json!({ "text": trimmed }));
        Some(Self { payload })
    }

    /// Wrap an already-structured payload
    #[must_use]
    pub const fn from_value(payload: Value) -> Self {
        Self { payload }
    }

    /// Structural tag (`type` field), if any
    #[must_use]
    pub fn kind(&self) -> Option<&Value> {
        self.payload.get("type")
    }

    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }
}

/// Incremental line splitter over raw byte chunks
#[derive(Debug, Default)]
pub struct MessageReassembler {
    pending: Vec<u8>,
}

impl MessageReassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every record it completed, in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ReassembledMessage> {
        self.pending.extend_from_slice(chunk);

        // `\n` never occurs inside a multi-byte UTF-8 sequence, so every
        // byte up to the last newline decodes cleanly
        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        complete
            .split(|&b| b == b'\n')
            .filter_map(decode_line)
            .collect()
    }

    /// Bytes buffered but not yet terminated by a newline
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// End of stream: flush any unterminated trailing record
    #[must_use]
    pub fn finish(self) -> Option<ReassembledMessage> {
        decode_line(&self.pending)
    }
}

fn decode_line(bytes: &[u8]) -> Option<ReassembledMessage> {
    ReassembledMessage::parse(&String::from_utf8_lossy(bytes))
}

/// Drain a chunk stream into its ordered records
///
/// # Errors
///
/// Returns the first error the stream yields; buffered partial data is discarded
pub async fn reassemble<S>(mut chunks: S) -> Result<Vec<ReassembledMessage>>
where
    S: Stream<Item = Result<Vec<u8>>> + Unpin,
{
    let mut reassembler = MessageReassembler::new();
    let mut messages = Vec::new();

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        messages.extend(reassembler.push(&chunk));
    }

    if reassembler.pending_len() > 0 {
        tracing::trace!(bytes = reassembler.pending_len(), "flushing unterminated record");
    }
    messages.extend(reassembler.finish());

    tracing::debug!(messages = messages.len(), "reply stream reassembled");
    Ok(messages)
}
