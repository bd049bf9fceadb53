//! Quill Gateway - realtime dictation sessions with spoken-back synthesis
//!
//! This library provides the core functionality for the Quill gateway:
//! - Recording session lifecycle (token → realtime connect → transcript)
//! - Transcript accumulation (committed history + live partial)
//! - Post-stop speech synthesis and playback
//! - Token/synthesis proxy endpoints
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Start/Stop control                    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Session orchestrator                    │
//! │   Token  │  Realtime STT  │  Synthesis  │ Playback  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │            Vendor services (ElevenLabs)              │
//! │   single-use tokens  │  Scribe WS  │  TTS HTTP      │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod providers;
pub mod realtime;
pub mod session;
pub mod voice;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use providers::{CredentialResolver, ElevenLabsTokenClient, SessionToken, TokenProvider};
pub use realtime::{MicConstraints, RealtimeTranscriber, ScribeClient, TranscriptEvent};
pub use session::transcript::{TranscriptSegment, TranscriptStore};
pub use session::{Recorder, RecorderState, SessionConfig, SessionUpdate, SpeechPhase, StopSignal};
pub use voice::{
    CpalSink, ElevenLabsSynthesizer, PlaybackController, PlaybackEvent, SpeechSynthesizer,
    SynthesisRequest, VoiceProfile, voice_profiles,
};
