//! Conversational backend
//!
//! The backend answers a transcript with a long-lived HTTP response whose
//! body is a sequence of newline-delimited records. This module opens that
//! stream, rebuilds the records and folds the content records into text.

mod accumulator;
mod client;
mod reassembler;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use accumulator::{CONTENT_ITEM, TranscriptAccumulator, accumulate};
pub use client::WebhookBackend;
pub use reassembler::{MessageReassembler, ReassembledMessage, reassemble};

use crate::Result;

/// Raw reply chunks in arrival order
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>>>;

/// Conversational backend that streams its reply
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// Send the transcript and return the reply body as a chunk stream
    async fn open(&self, transcript: &str, request_id: &str) -> Result<ChunkStream>;
}
