//! Error types for the voice relay

use std::time::Duration;

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// External collaborator a call was made against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Speech-to-text endpoint
    Stt,
    /// Conversational backend (streamed reply)
    Backend,
    /// Text-to-speech endpoint
    Tts,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Stt => "STT",
            Self::Backend => "backend",
            Self::Tts => "TTS",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in the voice relay
#[derive(Debug, Error)]
pub enum Error {
    /// Missing, empty or oversized upload
    #[error("validation error: {0}")]
    Validation(String),

    /// Upload larger than the configured limit
    #[error("validation error: upload exceeds {limit} bytes")]
    UploadTooLarge { limit: usize },

    /// A collaborator call failed (non-success status, bad payload)
    #[error("{service} call failed: {message}")]
    Upstream { service: Service, message: String },

    /// A collaborator call did not finish in time
    #[error("{service} call timed out after {}s", .after.as_secs())]
    Timeout { service: Service, after: Duration },

    /// A collaborator returned no usable text
    #[error("empty transcription: {0}")]
    EmptyTranscription(String),

    /// The backend's chunked transport errored mid-read
    #[error("stream transport error: {0}")]
    StreamTransport(String),

    /// Audio container error
    #[error("audio error: {0}")]
    Audio(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

}

/// Coarse error classification surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    UpstreamCall,
    EmptyTranscription,
    StreamTransport,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::UpstreamCall => "upstream_call_error",
            Self::EmptyTranscription => "empty_transcription_error",
            Self::StreamTransport => "stream_transport_error",
            Self::Internal => "internal_error",
        }
    }
}

impl Error {
    /// Shorthand for an upstream failure
    pub fn upstream(service: Service, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
        }
    }

    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::UploadTooLarge { .. } => ErrorKind::Validation,
            Self::Upstream { .. } | Self::Timeout { .. } => ErrorKind::UpstreamCall,
            Self::EmptyTranscription(_) => ErrorKind::EmptyTranscription,
            Self::StreamTransport(_) => ErrorKind::StreamTransport,
            Self::Audio(_) | Self::Config(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }
}
