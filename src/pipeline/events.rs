//! Progress events emitted by a progressive run

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Serialize, Serializer};

/// One stage transition or per-sentence result, in emission order
///
/// Serializes to the event's JSON payload; [`StageEvent::name`] is the
/// event name the boundary layer attaches to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum StageEvent {
    Start {
        request_id: String,
    },
    SttStart {
        request_id: String,
    },
    SttComplete {
        request_id: String,
        stt_text: String,
    },
    WebhookStart {
        request_id: String,
    },
    WebhookComplete {
        request_id: String,
        accumulated_text: String,
    },
    TtsStart {
        request_id: String,
        sentence_count: usize,
    },
    TtsResult {
        request_id: String,
        sentence_index: usize,
        sentence: String,
        #[serde(rename = "ttsBase64", serialize_with = "as_base64")]
        audio: Vec<u8>,
    },
    TtsError {
        request_id: String,
        sentence_index: usize,
        sentence: String,
        error: String,
    },
    Complete {
        request_id: String,
        tts_response_count: usize,
        tts_error_count: usize,
    },
    Error {
        request_id: String,
        error: String,
        code: &'static str,
    },
}

impl StageEvent {
    /// Wire name of the event
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::SttStart { .. } => "stt_start",
            Self::SttComplete { .. } => "stt_complete",
            Self::WebhookStart { .. } => "webhook_start",
            Self::WebhookComplete { .. } => "webhook_complete",
            Self::TtsStart { .. } => "tts_start",
            Self::TtsResult { .. } => "tts_result",
            Self::TtsError { .. } => "tts_error",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }
}

fn as_base64<S: Serializer>(audio: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(audio))
}
