//! Speech synthesis endpoint

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::ApiState;
use crate::providers::MISSING_KEY_MESSAGE;
use crate::voice::{SpeechSynthesizer, SynthesisRequest};

/// Synthesis request body
///
/// Field names match the browser client's JSON; `apiKey` lets a caller
/// override the server-held credential for this one request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechBody {
    pub text: String,
    pub voice_id: Option<String>,
    pub model_id: Option<String>,
    pub api_key: Option<String>,
}

/// `POST /api/text-to-speech`
///
/// Returns the synthesized audio as an `audio/mpeg` byte stream, or a
/// plain-text error body on failure.
pub async fn synthesize(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<SpeechBody>,
) -> Response {
    if body.text.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Text is required").into_response();
    }

    let credential = match state.credentials.resolve_or(body.api_key.as_deref()) {
        Ok(c) => c,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, MISSING_KEY_MESSAGE).into_response();
        }
    };

    let request = SynthesisRequest {
        text: body.text,
        voice_id: body
            .voice_id
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| state.default_voice_id.clone()),
        model_id: body
            .model_id
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| state.synthesis_model_id.clone()),
    };

    match state.synthesizer.synthesize(&credential, &request).await {
        Ok(audio) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "audio/mpeg"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            audio,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "synthesis failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate speech",
            )
                .into_response()
        }
    }
}
