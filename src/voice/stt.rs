//! Speech-to-text (STT) processing

use async_trait::async_trait;

use super::{AudioUpload, CallOptions, Transcriber};
use crate::config::SttConfig;
use crate::error::Service;
use crate::{Error, Result};

/// Response from the transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl TranscriptionResponse {
    fn into_text(self) -> String {
        self.transcript.or(self.text).unwrap_or_default()
    }
}

/// Transcribes speech to text over HTTP
pub struct SpeechToText {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl SpeechToText {
    /// Create a new STT client
    #[must_use]
    pub fn new(config: &SttConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, audio: &AudioUpload, options: &CallOptions) -> Result<String> {
        tracing::debug!(
            audio_bytes = audio.bytes.len(),
            model = %options.model,
            language = %options.language,
            "starting transcription"
        );

        let part = reqwest::multipart::Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name.clone())
            .mime_str(&audio.content_type)
            .map_err(|e| Error::upstream(Service::Stt, e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", options.model.clone())
            .text("language_code", options.language.clone());

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("api-subscription-key", key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "STT request failed");
            Error::upstream(Service::Stt, e.to_string())
        })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "STT API error");
            return Err(Error::upstream(
                Service::Stt,
                format!("STT API error {status}: {body}"),
            ));
        }

        let result: TranscriptionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            Error::upstream(Service::Stt, format!("invalid response: {e}"))
        })?;

        let transcript = result.into_text();
        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}
