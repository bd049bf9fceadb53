//! Session token issuance endpoint

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use super::ApiState;
use crate::Error;
use crate::providers::TokenProvider;

#[derive(Serialize)]
struct TokenResponse {
    token: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// `GET /api/scribe-token`
///
/// Exchanges the server-held credential for a single-use realtime session
/// token. The credential itself never reaches the client.
pub async fn issue(State(state): State<Arc<ApiState>>) -> Response {
    let credential = match state.credentials.resolve() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "token issuance refused");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { error: e.message() }),
            )
                .into_response();
        }
    };

    match state.tokens.issue(&credential).await {
        Ok(token) => (
            StatusCode::OK,
            Json(TokenResponse {
                token: token.as_str().to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "token creation failed");
            let status = match e {
                Error::Config(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(ErrorResponse {
                    error: "Failed to create token".to_string(),
                }),
            )
                .into_response()
        }
    }
}
