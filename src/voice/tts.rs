//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{CallOptions, Synthesizer};
use crate::audio::PcmFormat;
use crate::config::TtsConfig;
use crate::error::Service;
use crate::{Error, Result};

/// Synthesizes speech from text over HTTP
pub struct TextToSpeech {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    speaker: String,
    /// Used when the call carries no language
    language: String,
}

#[derive(serde::Serialize)]
struct TtsRequest<'a> {
    inputs: [&'a str; 1],
    target_language_code: &'a str,
    speaker: &'a str,
    model: &'a str,
    speech_sample_rate: u32,
}

#[derive(serde::Deserialize)]
struct TtsResponse {
    #[serde(default)]
    audios: Vec<String>,
}

impl TextToSpeech {
    /// Create a new TTS client
    #[must_use]
    pub fn new(config: &TtsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            speaker: config.speaker.clone(),
            language: config.language.clone(),
        }
    }
}

/// Decode the first base64 audio clip from a TTS response body
fn decode_first_audio(response: TtsResponse) -> Result<Vec<u8>> {
    let encoded = response
        .audios
        .into_iter()
        .next()
        .ok_or_else(|| Error::upstream(Service::Tts, "response contained no audio"))?;

    STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::upstream(Service::Tts, format!("invalid base64 audio: {e}")))
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, options: &CallOptions) -> Result<Vec<u8>> {
        tracing::debug!(chars = text.chars().count(), "starting synthesis");

        let language = if options.language.trim().is_empty() {
            &self.language
        } else {
            &options.language
        };

        let request = TtsRequest {
            inputs: [text],
            target_language_code: language,
            speaker: &self.speaker,
            model: &self.model,
            speech_sample_rate: PcmFormat::RELAY.sample_rate,
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-subscription-key", key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::upstream(Service::Tts, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                Service::Tts,
                format!("TTS API error {status}: {body}"),
            ));
        }

        let parsed: TtsResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(Service::Tts, format!("invalid response: {e}")))?;

        let audio = decode_first_audio(parsed)?;
        tracing::debug!(audio_bytes = audio.len(), "synthesis complete");
        Ok(audio)
    }
}
