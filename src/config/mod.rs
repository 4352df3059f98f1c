//! Configuration management for the voice relay
//!
//! Configuration is resolved once at start-up (env > TOML file > default)
//! into an immutable [`Config`] that is handed to the clients and pipeline.

pub mod file;

use std::time::Duration;

use crate::pipeline::PipelineSettings;
use crate::voice::CallOptions;
use crate::{Error, Result};

/// Default maximum upload size (50 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Voice relay configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API server configuration
    pub server: ServerConfig,

    /// Speech-to-text endpoint
    pub stt: SttConfig,

    /// Conversational backend endpoint
    pub backend: BackendConfig,

    /// Text-to-speech endpoint
    pub tts: TtsConfig,

    /// Per-collaborator call timeouts
    pub timeouts: Timeouts,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
}

/// Speech-to-text configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub url: String,
    pub api_key: Option<String>,
    /// Default model, overridable per call
    pub model: String,
    /// Default language code, overridable per call
    pub language: String,
}

/// Conversational backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Webhook URL; the reply arrives as newline-delimited records
    pub url: String,
    pub token: Option<String>,
}

/// Text-to-speech configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub speaker: String,
    pub language: String,
}

/// Collaborator call timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub stt: Duration,
    pub backend: Duration,
    pub tts: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            stt: Duration::from_secs(30),
            backend: Duration::from_secs(60),
            tts: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the standard TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the resolved configuration is incomplete
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        let config = Self::resolve(|key| std::env::var(key).ok(), fc);
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration from an env lookup and a parsed config file
    ///
    /// Precedence is env > file > built-in default.
    pub fn resolve<F>(env: F, fc: file::RelayConfigFile) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = ServerConfig {
            port: env("RELAY_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(3000),
            max_upload_bytes: env("RELAY_MAX_UPLOAD_BYTES")
                .and_then(|s| s.parse().ok())
                .or(fc.server.max_upload_bytes)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };

        let stt = SttConfig {
            url: env("STT_URL")
                .or(fc.stt.url)
                .unwrap_or_else(|| "https://api.sarvam.ai/speech-to-text".to_string()),
            api_key: env("STT_API_KEY").or(fc.stt.api_key),
            model: env("STT_MODEL")
                .or(fc.stt.model)
                .unwrap_or_else(|| "saarika:v2".to_string()),
            language: env("STT_LANGUAGE")
                .or(fc.stt.language)
                .unwrap_or_else(|| "hi-IN".to_string()),
        };

        let backend = BackendConfig {
            url: env("BACKEND_URL").or(fc.backend.url).unwrap_or_default(),
            token: env("BACKEND_TOKEN").or(fc.backend.token),
        };

        // TTS key falls back to the STT key when both live on the same provider
        let tts = TtsConfig {
            url: env("TTS_URL")
                .or(fc.tts.url)
                .unwrap_or_else(|| "https://api.sarvam.ai/text-to-speech".to_string()),
            api_key: env("TTS_API_KEY")
                .or(fc.tts.api_key)
                .or_else(|| stt.api_key.clone()),
            model: env("TTS_MODEL")
                .or(fc.tts.model)
                .unwrap_or_else(|| "bulbul:v2".to_string()),
            speaker: env("TTS_SPEAKER")
                .or(fc.tts.speaker)
                .unwrap_or_else(|| "anushka".to_string()),
            language: env("TTS_LANGUAGE")
                .or(fc.tts.language)
                .unwrap_or_else(|| stt.language.clone()),
        };

        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            stt: fc.timeouts.stt_secs.map_or(defaults.stt, Duration::from_secs),
            backend: fc
                .timeouts
                .backend_secs
                .map_or(defaults.backend, Duration::from_secs),
            tts: fc.timeouts.tts_secs.map_or(defaults.tts, Duration::from_secs),
        };

        Self {
            server,
            stt,
            backend,
            tts,
            timeouts,
        }
    }

    /// Check that required settings are present
    ///
    /// # Errors
    ///
    /// Returns error if the backend URL is missing or the upload limit is zero
    pub fn validate(&self) -> Result<()> {
        if self.backend.url.trim().is_empty() {
            return Err(Error::Config(
                "backend URL required (set BACKEND_URL or [backend].url)".to_string(),
            ));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(Error::Config("max upload size must be positive".to_string()));
        }
        if self.stt.api_key.is_none() {
            tracing::warn!("no STT API key configured");
        }
        Ok(())
    }

    /// Default per-call options (language and model)
    #[must_use]
    pub fn call_options(&self) -> CallOptions {
        CallOptions {
            language: self.stt.language.clone(),
            model: self.stt.model.clone(),
        }
    }

    /// Settings the pipeline runs with
    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            timeouts: self.timeouts,
            defaults: self.call_options(),
        }
    }
}
