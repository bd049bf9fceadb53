//! Text-to-speech synthesis

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Default voice when the user has not picked one
pub const DEFAULT_VOICE_ID: &str = "JBFqnCBsd6RMkjVDRZzb";

/// Fixed synthesis model (low-latency Flash tier)
pub const SYNTHESIS_MODEL_ID: &str = "eleven_flash_v2_5";

/// Output encoding requested from the synthesis endpoint
const OUTPUT_FORMAT: &str = "mp3_44100_128";

/// A selectable synthesis voice
///
/// Static catalog entries; selection is a pure preference with no lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceProfile {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
}

/// The built-in voice catalog
#[must_use]
pub const fn voice_profiles() -> &'static [VoiceProfile] {
    &[
        VoiceProfile {
            id: "JBFqnCBsd6RMkjVDRZzb",
            display_name: "George",
            description: "Warm British narration",
        },
        VoiceProfile {
            id: "21m00Tcm4TlvDq8ikWAM",
            display_name: "Rachel",
            description: "Calm American conversational",
        },
        VoiceProfile {
            id: "AZnzlk1XvdvUeBnXmlld",
            display_name: "Domi",
            description: "Strong, confident delivery",
        },
        VoiceProfile {
            id: "ErXwobaYiN019PkySvjV",
            display_name: "Antoni",
            description: "Well-rounded male voice",
        },
        VoiceProfile {
            id: "TxGEqnHWrfWFTfGW9XjX",
            display_name: "Josh",
            description: "Deep American narration",
        },
    ]
}

/// One speech synthesis request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub model_id: String,
}

/// Synthesizes speech from text
///
/// Implementations return the full encoded audio for one request; failures
/// are terminal and never retried.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize the request into MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error on any non-success response, carrying the endpoint's
    /// error body verbatim.
    async fn synthesize(&self, credential: &SecretString, request: &SynthesisRequest)
    -> Result<Vec<u8>>;
}

/// ElevenLabs text-to-speech client
pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    base_url: String,
}

impl ElevenLabsSynthesizer {
    /// Create a synthesis client against an API base URL
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(
        &self,
        credential: &SecretString,
        request: &SynthesisRequest,
    ) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!(
            "{}/v1/text-to-speech/{}?output_format={OUTPUT_FORMAT}",
            self.base_url.trim_end_matches('/'),
            request.voice_id,
        );

        tracing::debug!(
            voice_id = %request.voice_id,
            model_id = %request.model_id,
            chars = request.text.len(),
            "starting speech synthesis"
        );

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", credential.expose_secret())
            .json(&TtsRequest {
                text: &request.text,
                model_id: &request.model_id,
            })
            .send()
            .await
            .map_err(|e| Error::Transport(format!("synthesis request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "synthesis failed");
            return Err(Error::Synthesis(if body.is_empty() {
                format!("synthesis endpoint error {status}")
            } else {
                body
            }));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("synthesis stream failed: {e}")))?;

        tracing::info!(bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_unique_ids_and_a_default() {
        let profiles = voice_profiles();
        assert!(profiles.iter().any(|p| p.id == DEFAULT_VOICE_ID));

        for (i, a) in profiles.iter().enumerate() {
            for b in &profiles[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }
}
