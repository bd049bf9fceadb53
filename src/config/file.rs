//! TOML configuration file loading
//!
//! Supports `~/.config/quill/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct QuillConfigFile {
    /// Default ElevenLabs API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Voice/synthesis configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Endpoint overrides
    #[serde(default)]
    pub endpoints: EndpointsFileConfig,

    /// External-call timeout bounds
    #[serde(default)]
    pub timeouts: TimeoutsFileConfig,

    /// Proxy server configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Voice and synthesis configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Synthesis voice identifier
    pub voice_id: Option<String>,

    /// Synthesis model (e.g. "eleven_flash_v2_5")
    pub model_id: Option<String>,

    /// Realtime transcription model (e.g. "scribe_v2_realtime")
    pub scribe_model_id: Option<String>,

    /// Speak the transcript back after each stop
    pub speak_on_stop: Option<bool>,
}

/// Endpoint base URL overrides
#[derive(Debug, Default, Deserialize)]
pub struct EndpointsFileConfig {
    /// HTTP API base (token + synthesis)
    pub api_base: Option<String>,

    /// Realtime transcription WebSocket URL
    pub realtime: Option<String>,
}

/// External-call timeout bounds, in seconds
#[derive(Debug, Default, Deserialize)]
pub struct TimeoutsFileConfig {
    pub token_secs: Option<u64>,
    pub connect_secs: Option<u64>,
    pub synthesis_secs: Option<u64>,
}

/// Proxy server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Port to listen on
    pub port: Option<u16>,
}

/// Load the TOML config file from the standard path
///
/// Returns `QuillConfigFile::default()` if the file doesn't exist or can't
/// be parsed.
pub fn load_config_file() -> QuillConfigFile {
    let Some(path) = config_file_path() else {
        return QuillConfigFile::default();
    };

    if !path.exists() {
        return QuillConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
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
                QuillConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            QuillConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/quill/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("quill").join("config.toml"))
}
