//! Speech collaborators
//!
//! Speech-to-text and text-to-speech are remote calls behind the
//! [`Transcriber`] and [`Synthesizer`] traits so the pipeline can run
//! against test doubles.

mod stt;
mod tts;

use async_trait::async_trait;

pub use stt::SpeechToText;
pub use tts::TextToSpeech;

use crate::Result;

/// Per-call overrides for the speech collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOptions {
    /// Language code (e.g. "hi-IN")
    pub language: String,
    /// STT model identifier
    pub model: String,
}

impl CallOptions {
    /// Apply optional overrides on top of these defaults
    #[must_use]
    pub fn with_overrides(&self, language: Option<String>, model: Option<String>) -> Self {
        Self {
            language: language
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| self.language.clone()),
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| self.model.clone()),
        }
    }
}

/// Uploaded utterance
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

impl AudioUpload {
    /// Wrap raw bytes, treated as PCM-in-WAV
    #[must_use]
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: "audio.wav".to_string(),
            content_type: "audio/wav".to_string(),
        }
    }
}

/// Transcribes an uploaded utterance
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Return the transcript; may be empty if nothing was recognised
    async fn transcribe(&self, audio: &AudioUpload, options: &CallOptions) -> Result<String>;
}

/// Synthesizes one sentence into a WAV container
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, options: &CallOptions) -> Result<Vec<u8>>;
}
