//! Reply text accumulation
//!
//! Keeps only records that carry reply text and joins their text exactly as
//! received. Framing records (a `type` other than `item`) are dropped no
//! matter what they contain.

use serde_json::Value;

use super::ReassembledMessage;

/// Structural tag of a record that carries reply text
pub const CONTENT_ITEM: &str = "item";

/// Append-only reply text for one run
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    text: String,
    accepted: usize,
    dropped: usize,
}

impl TranscriptAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the message's text if it is a content record
    ///
    /// Returns whether anything was appended.
    pub fn push(&mut self, message: &ReassembledMessage) -> bool {
        if !is_content(message) {
            self.dropped += 1;
            return false;
        }

        match message_text(message.payload()) {
            Some(fragment) => {
                self.text.push_str(fragment);
                self.accepted += 1;
                true
            }
            None => {
                self.dropped += 1;
                false
            }
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of records that contributed text
    #[must_use]
    pub const fn accepted(&self) -> usize {
        self.accepted
    }

    /// Number of framing or text-less records
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Concatenate the text of every content record, in order
pub fn accumulate<'a, I>(messages: I) -> String
where
    I: IntoIterator<Item = &'a ReassembledMessage>,
{
    let mut accumulator = TranscriptAccumulator::new();
    for message in messages {
        accumulator.push(message);
    }
    tracing::debug!(
        accepted = accumulator.accepted(),
        dropped = accumulator.dropped(),
        chars = accumulator.text().chars().count(),
        "reply text accumulated"
    );
    accumulator.into_text()
}

/// Untagged (or null-tagged) records count as content; tagged ones only if tagged `item`
fn is_content(message: &ReassembledMessage) -> bool {
    message
        .kind()
        .is_none_or(|kind| kind.is_null() || kind.as_str() == Some(CONTENT_ITEM))
}

/// First present of: `content` field, bare string, `text` field, `message` field
fn message_text(payload: &Value) -> Option<&str> {
    payload
        .get("content")
        .and_then(Value::as_str)
        .or_else(|| payload.as_str())
        .or_else(|| payload.get("text").and_then(Value::as_str))
        .or_else(|| payload.get("message").and_then(Value::as_str))
}
