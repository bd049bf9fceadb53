//! Realtime transcription channel abstraction
//!
//! The vendor protocol lives behind [`RealtimeTranscriber`]; the session
//! orchestrator never assumes a specific provider. The shipped implementation
//! is the ElevenLabs Scribe client in [`scribe`].

mod scribe;

pub use scribe::ScribeClient;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;
use crate::providers::SessionToken;

/// Fixed microphone processing constraints
///
/// Always fully enabled; not user configurable. Forwarded to the vendor on
/// connect so its capture pipeline applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl MicConstraints {
    /// The one supported constraint set: everything on
    #[must_use]
    pub const fn fixed() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Events emitted by a live transcription connection
///
/// Delivered in vendor emission order; no reordering or buffering happens on
/// top of the channel itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// Provisional recognition result; replaces any previous partial
    Partial(String),
    /// Finalized recognition result for a spoken segment
    Committed(String),
    /// Channel-level failure, surfaced to the user; the vendor layer owns
    /// socket teardown
    Error(String),
}

/// A realtime transcription client
///
/// Implementations hold at most one live connection. `connect` consumes a
/// single-use session token; `disconnect` is always terminal and returns the
/// final partial transcript observed by the vendor layer, so callers can fold
/// it into the spoken text without racing the teardown.
#[async_trait(?Send)]
pub trait RealtimeTranscriber {
    /// Open the realtime connection and begin streaming microphone audio
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    async fn connect(
        &mut self,
        token: SessionToken,
        constraints: MicConstraints,
    ) -> Result<mpsc::UnboundedReceiver<TranscriptEvent>>;

    /// Tear down the connection
    ///
    /// Returns the final partial transcript, if one was live at teardown.
    ///
    /// # Errors
    ///
    /// Returns an error if teardown fails; callers treat that as non-fatal.
    async fn disconnect(&mut self) -> Result<Option<String>>;
}
