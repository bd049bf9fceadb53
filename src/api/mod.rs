//! HTTP proxy endpoints
//!
//! The thin server the browser-facing UI talks to: it holds the long-lived
//! credential so clients never see it, exchanging it for single-use session
//! tokens and forwarding synthesis requests.

pub mod speech;
pub mod token;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::providers::{CredentialResolver, ElevenLabsTokenClient};
use crate::voice::ElevenLabsSynthesizer;

/// Shared state for API handlers
pub struct ApiState {
    /// Default credential resolution (request keys may override per call)
    pub credentials: CredentialResolver,
    /// Token endpoint client
    pub tokens: ElevenLabsTokenClient,
    /// Synthesis client
    pub synthesizer: ElevenLabsSynthesizer,
    /// Voice used when the request names none
    pub default_voice_id: String,
    /// Model used when the request names none
    pub synthesis_model_id: String,
}

/// Build the proxy router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/scribe-token", get(token::issue))
        .route("/api/text-to-speech", post(speech::synthesize))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the proxy until interrupted
///
/// # Errors
///
/// Returns error if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<ApiState>, port: u16) -> Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "proxy API listening");
    axum::serve(listener, app).await?;
    Ok(())
}
