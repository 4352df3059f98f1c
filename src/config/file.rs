//! TOML configuration file loading
//!
//! Supports `~/.config/voice-relay/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct RelayConfigFile {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Speech-to-text endpoint
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Conversational backend endpoint
    #[serde(default)]
    pub backend: BackendFileConfig,

    /// Text-to-speech endpoint
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Collaborator timeouts, in seconds
    #[serde(default)]
    pub timeouts: TimeoutsFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Model identifier (e.g. "saarika:v2")
    pub model: Option<String>,
    /// Language code (e.g. "hi-IN")
    pub language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BackendFileConfig {
    /// Webhook URL that streams newline-delimited reply records
    pub url: Option<String>,
    /// Optional bearer token
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Voice/speaker identifier
    pub speaker: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimeoutsFileConfig {
    pub stt_secs: Option<u64>,
    pub backend_secs: Option<u64>,
    pub tts_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `RelayConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> RelayConfigFile {
    config_file_path().map_or_else(RelayConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or unparsable files yield defaults.
pub fn load_config_file_from(path: &Path) -> RelayConfigFile {
    if !path.exists() {
        return RelayConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                RelayConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            RelayConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voice-relay/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-relay").join("config.toml"))
}
