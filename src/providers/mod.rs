//! Credential resolution and session token issuance
//!
//! A user-supplied API key, when present and non-empty after trimming, takes
//! precedence over the configured default key for every external call.
//! Session tokens are short-lived and single-use; one token authorizes one
//! realtime connection attempt.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::{Error, Result};

/// User-visible message when no credential is available anywhere
pub const MISSING_KEY_MESSAGE: &str = "API key is required. Please provide an API key or configure ELEVENLABS_API_KEY in environment variables.";

/// Short-lived, single-use credential authorizing one realtime connection
#[derive(Debug, Clone)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a raw token value
    #[must_use]
    pub fn new(value: String) -> Self {
        Self(value)
    }

    /// The raw token value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Resolves the effective long-lived credential
///
/// Precedence: user-supplied key (trimmed, non-empty) over the configured
/// default. Missing both is a terminal configuration error for the call.
#[derive(Default)]
pub struct CredentialResolver {
    default_key: Option<SecretString>,
    user_key: Option<SecretString>,
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("default_key", &self.default_key.is_some())
            .field("user_key", &self.user_key.is_some())
            .finish()
    }
}

impl CredentialResolver {
    /// Create a resolver with an optional default credential
    #[must_use]
    pub fn new(default_key: Option<String>) -> Self {
        Self {
            default_key: default_key
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
            user_key: None,
        }
    }

    /// Set or clear the user-supplied credential
    ///
    /// Empty or whitespace-only input clears it. Returns true when the
    /// effective credential changed, in which case any held session token
    /// must be invalidated by the caller.
    pub fn set_user_key(&mut self, key: Option<String>) -> bool {
        let next = key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(SecretString::from);

        let changed = match (&self.user_key, &next) {
            (None, None) => false,
            (Some(a), Some(b)) => a.expose_secret() != b.expose_secret(),
            _ => true,
        };

        if changed {
            tracing::debug!(present = next.is_some(), "user credential changed");
            self.user_key = next;
        }
        changed
    }

    /// Resolve the effective credential
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when neither a user-supplied nor a default
    /// credential exists.
    pub fn resolve(&self) -> Result<SecretString> {
        self.resolve_or(None)
    }

    /// Resolve with a per-call override taking highest precedence
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no credential is available at any
    /// precedence level.
    pub fn resolve_or(&self, request_key: Option<&str>) -> Result<SecretString> {
        if let Some(k) = request_key.map(str::trim).filter(|k| !k.is_empty()) {
            return Ok(SecretString::from(k.to_string()));
        }
        self.user_key
            .as_ref()
            .or(self.default_key.as_ref())
            .map(|k| SecretString::from(k.expose_secret().to_string()))
            .ok_or_else(|| Error::Config(MISSING_KEY_MESSAGE.to_string()))
    }
}

/// Issues single-use session tokens for the realtime transcription service
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Exchange a long-lived credential for a session token
    ///
    /// # Errors
    ///
    /// Returns an error on any non-success response; the endpoint's error
    /// body is carried verbatim. Never retried.
    async fn issue(&self, credential: &SecretString) -> Result<SessionToken>;
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
}

/// ElevenLabs single-use token endpoint client
pub struct ElevenLabsTokenClient {
    client: reqwest::Client,
    base_url: String,
}

impl ElevenLabsTokenClient {
    /// Create a token client against an API base URL
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
impl TokenProvider for ElevenLabsTokenClient {
    async fn issue(&self, credential: &SecretString) -> Result<SessionToken> {
        let url = format!(
            "{}/v1/single-use-token/realtime_scribe",
            self.base_url.trim_end_matches('/')
        );

        tracing::debug!(url = %url, "requesting session token");

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", credential.expose_secret())
            .send()
            .await
            .map_err(|e| Error::Transport(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Endpoint errors arrive as {"error": "..."}; surface that text
            // verbatim, fall back to the raw body.
            let message = serde_json::from_str::<TokenErrorResponse>(&body)
                .map_or_else(|_| format!("token endpoint error {status}: {body}"), |e| e.error);
            tracing::error!(status = %status, message = %message, "token issuance failed");
            return Err(Error::Transport(message));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("malformed token response: {e}")))?;

        if parsed.token.is_empty() {
            return Err(Error::Transport("token response missing credential".to_string()));
        }

        tracing::debug!("session token issued");
        Ok(SessionToken::new(parsed.token))
    }
}
