//! Sentence segmentation for speech synthesis
//!
//! The backend gives no sentence boundaries, so text is split by an ordered
//! list of strategies and the first one that produces a usable split wins:
//!
//! 1. terminal punctuation (`.`, `!`, `?`, `।`, `॥`)
//! 2. line breaks (only when that yields more than one piece)
//! 3. for text over 100 characters, runs of 2+ whitespace or whitespace
//!    before an uppercase letter (only when that yields more than one piece)
//! 4. the whole trimmed text as a single sentence
//!
//! Strategy 3 relies on letter case and so never fires for scripts without
//! case distinction; such text falls through to strategy 4.

use std::sync::LazyLock;

use regex::Regex;

/// Sentences shorter than this (after trimming) are not synthesized
pub const MIN_SPEAKABLE_CHARS: usize = 2;

/// Text must be longer than this for the whitespace heuristic to apply
const LONG_TEXT_CHARS: usize = 100;

static PUNCTUATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?।॥]+[.!?।॥]+").expect("valid regex"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// One speakable unit of reply text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    /// 1-based position in the reply
    pub index: usize,
    pub text: String,
}

impl Sentence {
    /// Whether the sentence is long enough to send to synthesis
    #[must_use]
    pub fn is_speakable(&self) -> bool {
        self.text.trim().chars().count() >= MIN_SPEAKABLE_CHARS
    }
}

/// A segmentation strategy: `None` means "no usable split, try the next one"
type Strategy = fn(&str) -> Option<Vec<String>>;

/// Strategies in priority order
const STRATEGIES: &[(&str, Strategy)] = &[
    ("punctuation", split_on_punctuation),
    ("newline", split_on_newlines),
    ("long_text", split_long_text),
];

/// Split text into ordered, 1-indexed sentences
///
/// Empty or whitespace-only text yields no sentences; anything else yields
/// at least one.
#[must_use]
pub fn segment(text: &str) -> Vec<Sentence> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let (strategy, pieces) = STRATEGIES
        .iter()
        .find_map(|(name, strategy)| strategy(trimmed).map(|pieces| (*name, pieces)))
        .unwrap_or_else(|| ("whole", vec![trimmed.to_string()]));

    tracing::debug!(strategy, sentences = pieces.len(), "segmented reply text");

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| Sentence { index: i + 1, text })
        .collect()
}

/// Runs of non-terminators followed by terminators
///
/// Terminators before the first run stay attached to the first sentence and
/// unterminated text after the last terminator is kept as a final sentence.
pub fn split_on_punctuation(text: &str) -> Option<Vec<String>> {
    let mut pieces = Vec::new();
    let mut consumed = 0;

    // Matches are contiguous, so only the first can leave a gap before it
    for m in PUNCTUATED.find_iter(text) {
        push_trimmed(&mut pieces, &text[consumed..m.end()]);
        consumed = m.end();
    }

    if pieces.is_empty() {
        return None;
    }
    push_trimmed(&mut pieces, &text[consumed..]);
    Some(pieces)
}

/// Split on line breaks when there is more than one non-empty line
pub fn split_on_newlines(text: &str) -> Option<Vec<String>> {
    let mut pieces = Vec::new();
    for line in text.lines() {
        push_trimmed(&mut pieces, line);
    }
    (pieces.len() > 1).then_some(pieces)
}

/// Whitespace heuristic for long unpunctuated text
pub fn split_long_text(text: &str) -> Option<Vec<String>> {
    if text.chars().count() <= LONG_TEXT_CHARS {
        return None;
    }

    let mut pieces = Vec::new();
    let mut start = 0;

    for ws in WHITESPACE_RUN.find_iter(text) {
        let wide = ws.as_str().chars().nth(1).is_some();
        let before_capital = text[ws.end()..]
            .chars()
            .next()
            .is_some_and(char::is_uppercase);

        if wide || before_capital {
            push_trimmed(&mut pieces, &text[start..ws.start()]);
            start = ws.end();
        }
    }
    push_trimmed(&mut pieces, &text[start..]);

    (pieces.len() > 1).then_some(pieces)
}

fn push_trimmed(pieces: &mut Vec<String>, piece: &str) {
    let piece = piece.trim();
    if !piece.is_empty() {
        pieces.push(piece.to_string());
    }
}
