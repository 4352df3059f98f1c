//! Voice Relay - speech round trips through a conversational backend
//!
//! This library provides the core functionality for the relay:
//! - Speech-to-text and text-to-speech clients
//! - Reassembly of the backend's chunked, newline-delimited reply
//! - Sentence segmentation of the reply for progressive synthesis
//! - WAV recombination of per-sentence audio
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     HTTP API                         │
//! │  /process  │  /process/stream (SSE)  │  /audio  ...  │
//! └────────────────────────┬─────────────────────────────┘
//!                          │
//! ┌────────────────────────▼─────────────────────────────┐
//! │                     Pipeline                         │
//! │  STT → backend stream → reassemble → accumulate      │
//! │      → segment → TTS per sentence → (merge WAV)      │
//! └────────────────────────┬─────────────────────────────┘
//!                          │
//! ┌────────────────────────▼─────────────────────────────┐
//! │                  Collaborators                       │
//! │   STT service  │  Conversational backend  │  TTS     │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod audio;
pub mod config;
pub mod conversation;
pub mod error;
pub mod pipeline;
pub mod voice;

pub use api::{ApiServer, ApiServerBuilder, ApiState};
pub use audio::{PcmFormat, WavRecombiner, merge_wav};
pub use config::Config;
pub use conversation::{ConversationBackend, MessageReassembler, ReassembledMessage, WebhookBackend};
pub use error::{Error, ErrorKind, Result};
pub use pipeline::{Pipeline, PipelineOutcome, PipelineRequest, StageEvent};
pub use voice::{AudioUpload, CallOptions, SpeechToText, Synthesizer, TextToSpeech, Transcriber};
