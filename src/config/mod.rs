//! Configuration for the Quill gateway
//!
//! Resolution order is env > toml > default for every field.

pub mod file;

use std::time::Duration;

use crate::session::SessionConfig;
use crate::voice::{DEFAULT_VOICE_ID, SYNTHESIS_MODEL_ID};

/// Default realtime transcription model
pub const SCRIBE_MODEL_ID: &str = "scribe_v2_realtime";

/// Default API base for token issuance and synthesis
const DEFAULT_API_BASE: &str = "https://api.elevenlabs.io";

/// Default realtime transcription endpoint
const DEFAULT_REALTIME_URL: &str = "wss://api.elevenlabs.io/v1/speech-to-text/realtime";

/// Quill gateway configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Default long-lived credential (`ELEVENLABS_API_KEY`)
    pub api_key: Option<String>,

    /// Selected synthesis voice
    pub voice_id: String,

    /// Synthesis model identifier
    pub synthesis_model_id: String,

    /// Realtime transcription model identifier
    pub scribe_model_id: String,

    /// Speak the transcript back after each stop
    pub speak_on_stop: bool,

    /// HTTP API base URL (token + synthesis)
    pub api_base_url: String,

    /// Realtime transcription WebSocket URL
    pub realtime_url: String,

    /// Bound on the token fetch
    pub token_timeout: Duration,

    /// Bound on establishing the realtime connection
    pub connect_timeout: Duration,

    /// Bound on the synthesis request
    pub synthesis_timeout: Duration,

    /// Proxy server port
    pub port: u16,
}

impl AppConfig {
    /// Load configuration (env > toml > default)
    #[must_use]
    pub fn load() -> Self {
        let fc = file::load_config_file();

        let api_key = std::env::var("ELEVENLABS_API_KEY").ok().or(fc.api_key);

        let voice_id = std::env::var("QUILL_VOICE_ID")
            .ok()
            .or(fc.voice.voice_id)
            .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string());

        let synthesis_model_id = std::env::var("QUILL_TTS_MODEL")
            .ok()
            .or(fc.voice.model_id)
            .unwrap_or_else(|| SYNTHESIS_MODEL_ID.to_string());

        let scribe_model_id = std::env::var("QUILL_SCRIBE_MODEL")
            .ok()
            .or(fc.voice.scribe_model_id)
            .unwrap_or_else(|| SCRIBE_MODEL_ID.to_string());

        let speak_on_stop = std::env::var("QUILL_SPEAK_ON_STOP")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .or(fc.voice.speak_on_stop)
            .unwrap_or(true);

        let api_base_url = std::env::var("QUILL_API_BASE")
            .ok()
            .or(fc.endpoints.api_base)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let realtime_url = std::env::var("QUILL_REALTIME_URL")
            .ok()
            .or(fc.endpoints.realtime)
            .unwrap_or_else(|| DEFAULT_REALTIME_URL.to_string());

        let token_timeout = timeout_from(
            "QUILL_TOKEN_TIMEOUT_SECS",
            fc.timeouts.token_secs,
            10,
        );
        let connect_timeout = timeout_from(
            "QUILL_CONNECT_TIMEOUT_SECS",
            fc.timeouts.connect_secs,
            10,
        );
        let synthesis_timeout = timeout_from(
            "QUILL_SYNTHESIS_TIMEOUT_SECS",
            fc.timeouts.synthesis_secs,
            30,
        );

        let port = std::env::var("QUILL_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .and_then(|s| s.parse().ok())
            .or(fc.server.port)
            .unwrap_or(17890);

        Self {
            api_key,
            voice_id,
            synthesis_model_id,
            scribe_model_id,
            speak_on_stop,
            api_base_url,
            realtime_url,
            token_timeout,
            connect_timeout,
            synthesis_timeout,
            port,
        }
    }

    /// Project the session-facing slice of this configuration
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            default_api_key: self.api_key.clone(),
            voice_id: self.voice_id.clone(),
            synthesis_model_id: self.synthesis_model_id.clone(),
            speak_on_stop: self.speak_on_stop,
            token_timeout: self.token_timeout,
            connect_timeout: self.connect_timeout,
            synthesis_timeout: self.synthesis_timeout,
        }
    }
}

fn timeout_from(env_key: &str, toml_secs: Option<u64>, default_secs: u64) -> Duration {
    let secs = std::env::var(env_key)
        .ok()
        .and_then(|s| s.parse().ok())
        .or(toml_secs)
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}
