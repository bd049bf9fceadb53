//! Recording session lifecycle
//!
//! Coordinates three external resources behind one start/stop control: the
//! short-lived session token, the realtime transcription connection, and
//! spoken-back synthesis with playback. Single-threaded and event-driven;
//! the driver loop calls [`Recorder::pump`] between control events.

pub mod transcript;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::providers::{CredentialResolver, SessionToken, TokenProvider};
use crate::realtime::{MicConstraints, RealtimeTranscriber, TranscriptEvent};
use crate::voice::{
    DEFAULT_VOICE_ID, PlaybackController, PlaybackEvent, PlaybackSink, SYNTHESIS_MODEL_ID,
    SpeechSynthesizer, SynthesisRequest,
};
use crate::{Error, Result};
use transcript::TranscriptStore;

/// Recording-side lifecycle state
///
/// `start()` is valid from `Idle` and `Error`; `stop()` from `Connected`.
/// Everything else treats the call as a safe no-op, so an out-of-band
/// invocation can never open a second connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// No connection, nothing pending
    Idle,
    /// Waiting on the token endpoint
    TokenPending,
    /// Opening the realtime connection
    Connecting,
    /// Live; transcript events are flowing
    Connected,
    /// Tearing down; always lands back in `Idle`
    Disconnecting,
    /// A terminal failure was surfaced; `start()` recovers
    Error,
}

/// Speech-synthesis-side lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechPhase {
    /// No synthesis in flight
    Ready,
    /// Synthesis request in flight
    Processing,
    /// Audio is playing
    Speaking,
}

/// Explicit session configuration passed into the recorder
///
/// There is deliberately no ambient global state; everything the session
/// needs to know arrives here.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Default long-lived credential (a user-supplied key overrides it)
    pub default_api_key: Option<String>,
    /// Selected synthesis voice
    pub voice_id: String,
    /// Synthesis model identifier
    pub synthesis_model_id: String,
    /// Speak the accumulated transcript after each stop
    pub speak_on_stop: bool,
    /// Bound on the token fetch
    pub token_timeout: Duration,
    /// Bound on establishing the realtime connection
    pub connect_timeout: Duration,
    /// Bound on the synthesis request
    pub synthesis_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_api_key: None,
            voice_id: DEFAULT_VOICE_ID.to_string(),
            synthesis_model_id: SYNTHESIS_MODEL_ID.to_string(),
            speak_on_stop: true,
            token_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            synthesis_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle for requesting a stop without exclusive access to the recorder
///
/// Mirrors the UI control: a stop may be clicked while token fetch or
/// connect is still in flight. The session honors the request as soon as the
/// pending step completes instead of leaving a dangling connection.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Request a stop at the next opportunity
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// What a [`Recorder::pump`] call observed and applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// A transcript event arrived and was folded into session state
    Transcript(TranscriptEvent),
    /// A playback lifecycle event arrived
    Playback(PlaybackEvent),
    /// The transcript channel closed
    ChannelClosed,
}

/// The dictation session orchestrator
///
/// Owns the state machine, the transcript store, and the playback
/// controller. Vendor specifics stay behind the capability traits.
pub struct Recorder {
    config: SessionConfig,
    credentials: CredentialResolver,
    state: RecorderState,
    phase: SpeechPhase,
    transcript: TranscriptStore,
    token: Option<SessionToken>,
    stop_signal: StopSignal,
    last_error: Option<String>,
    transcriber: Box<dyn RealtimeTranscriber>,
    tokens: Box<dyn TokenProvider>,
    synthesizer: Box<dyn SpeechSynthesizer>,
    playback: PlaybackController,
    events: Option<tokio::sync::mpsc::UnboundedReceiver<TranscriptEvent>>,
}

impl Recorder {
    /// Assemble a recorder from its collaborators
    #[must_use]
    pub fn new(
        config: SessionConfig,
        transcriber: Box<dyn RealtimeTranscriber>,
        tokens: Box<dyn TokenProvider>,
        synthesizer: Box<dyn SpeechSynthesizer>,
        sink: Box<dyn PlaybackSink>,
    ) -> Self {
        let credentials = CredentialResolver::new(config.default_api_key.clone());
        Self {
            config,
            credentials,
            state: RecorderState::Idle,
            phase: SpeechPhase::Ready,
            transcript: TranscriptStore::new(),
            token: None,
            stop_signal: StopSignal::default(),
            last_error: None,
            transcriber,
            tokens,
            synthesizer,
            playback: PlaybackController::new(sink),
            events: None,
        }
    }

    /// Begin a recording session
    ///
    /// Valid from `Idle` or `Error`; a no-op from any other state. Fetches a
    /// session token when none is held, then opens the realtime connection
    /// with the fixed microphone constraints. A `stop()` that raced the
    /// establishment is honored as soon as the pending step completes.
    ///
    /// # Errors
    ///
    /// Returns the failure that moved the session to `Error`; the message is
    /// also retained for display via [`Self::last_error`].
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            RecorderState::Idle | RecorderState::Error => {}
            _ => {
                tracing::debug!(state = ?self.state, "start ignored");
                return Ok(());
            }
        }

        self.last_error = None;
        self.stop_signal.clear();

        // A channel error leaves the vendor connection to tear itself down,
        // but restarting must never stack a second connection on top of it.
        if self.events.is_some() {
            if let Err(e) = self.transcriber.disconnect().await {
                tracing::warn!(error = %e, "stale connection teardown failed");
            }
            self.events = None;
            self.transcript.clear_partial();
        }

        if self.token.is_none() {
            self.state = RecorderState::TokenPending;
            let credential = match self.credentials.resolve() {
                Ok(c) => c,
                Err(e) => return Err(self.fail(e)),
            };

            let issued =
                tokio::time::timeout(self.config.token_timeout, self.tokens.issue(&credential))
                    .await;
            let token = match issued {
                Ok(Ok(token)) => token,
                Ok(Err(e)) => return Err(self.fail(e)),
                Err(_) => {
                    return Err(self.fail(Error::Transport(format!(
                        "token request timed out after {:?}",
                        self.config.token_timeout
                    ))));
                }
            };
            self.token = Some(token);
        }

        if self.stop_signal.take() {
            // A stop raced the token fetch; keep the unused token, skip the
            // connect entirely
            self.state = RecorderState::Idle;
            tracing::debug!("stop arrived during token fetch, staying idle");
            return Ok(());
        }

        self.state = RecorderState::Connecting;
        let Some(token) = self.token.take() else {
            return Err(self.fail(Error::Config("no session token held".to_string())));
        };

        let connected = tokio::time::timeout(
            self.config.connect_timeout,
            self.transcriber.connect(token, MicConstraints::fixed()),
        )
        .await;
        let events = match connected {
            Ok(Ok(events)) => events,
            Ok(Err(e)) => return Err(self.fail(e)),
            Err(_) => {
                return Err(self.fail(Error::Connection(format!(
                    "connect timed out after {:?}",
                    self.config.connect_timeout
                ))));
            }
        };

        self.events = Some(events);
        self.state = RecorderState::Connected;
        tracing::info!("transcription session connected");

        if self.stop_signal.take() {
            // A stop raced the connect; tear down immediately instead of
            // leaving the session open
            tracing::debug!("stop arrived during connect, disconnecting");
            return self.stop().await;
        }

        Ok(())
    }

    /// End the recording session and, when enabled, speak the transcript
    ///
    /// Valid from `Connected`. During `TokenPending`/`Connecting` the stop is
    /// recorded and honored once the pending step completes; otherwise a
    /// no-op. Disconnect failures are logged, never surfaced — the session
    /// always returns to `Idle`.
    ///
    /// # Errors
    ///
    /// Returns a synthesis failure, if one occurred; the recording side is
    /// already idle by then.
    pub async fn stop(&mut self) -> Result<()> {
        match self.state {
            RecorderState::Connected => {}
            RecorderState::TokenPending | RecorderState::Connecting => {
                self.stop_signal.request();
                tracing::debug!(state = ?self.state, "stop requested mid-establishment");
                return Ok(());
            }
            _ => {
                tracing::debug!(state = ?self.state, "stop ignored");
                return Ok(());
            }
        }

        // Captured before disconnect: teardown clears the live partial as a
        // side effect, and the spoken text must still include it.
        let captured_partial = self.transcript.partial().map(str::to_owned);

        self.state = RecorderState::Disconnecting;
        let final_partial = match self.transcriber.disconnect().await {
            Ok(partial) => partial,
            Err(e) => {
                tracing::warn!(error = %e, "disconnect failed, returning to idle anyway");
                None
            }
        };
        self.events = None;
        self.transcript.clear_partial();
        self.state = RecorderState::Idle;
        tracing::info!("transcription session stopped");

        if !self.config.speak_on_stop {
            return Ok(());
        }

        let partial = final_partial.or(captured_partial).unwrap_or_default();
        let mut text = format!("{} {}", self.transcript.accumulated(), partial)
            .trim()
            .to_string();
        if text.is_empty() {
            text = self.transcript.joined();
        }
        if text.is_empty() {
            tracing::debug!("nothing to speak");
            return Ok(());
        }

        self.speak(text).await
    }

    /// Synthesize and hand off to playback
    async fn speak(&mut self, text: String) -> Result<()> {
        self.phase = SpeechPhase::Processing;

        let credential = match self.credentials.resolve() {
            Ok(c) => c,
            Err(e) => return Err(self.speech_fail(e)),
        };

        let request = SynthesisRequest {
            text,
            voice_id: self.config.voice_id.clone(),
            model_id: self.config.synthesis_model_id.clone(),
        };

        let outcome = tokio::time::timeout(
            self.config.synthesis_timeout,
            self.synthesizer.synthesize(&credential, &request),
        )
        .await;
        let audio = match outcome {
            Ok(Ok(audio)) => audio,
            Ok(Err(e)) => return Err(self.speech_fail(e)),
            Err(_) => {
                return Err(self.speech_fail(Error::Transport(format!(
                    "synthesis timed out after {:?}",
                    self.config.synthesis_timeout
                ))));
            }
        };

        // Phase stays Processing until the controller reports Started
        self.playback.submit(audio);
        Ok(())
    }

    /// Wait for the next transcript or playback event and apply it
    ///
    /// The driver loop interleaves this with control input. Partial events
    /// replace the live partial wholesale; committed events grow the
    /// history; channel errors surface a message and move the session to
    /// `Error` without tearing the socket down here.
    pub async fn pump(&mut self) -> SessionUpdate {
        enum Incoming {
            Transcript(Option<TranscriptEvent>),
            Playback(Option<PlaybackEvent>),
        }

        let incoming = {
            let playback = self.playback.events_mut();
            match self.events.as_mut() {
                Some(rx) => tokio::select! {
                    ev = rx.recv() => Incoming::Transcript(ev),
                    ev = playback.recv() => Incoming::Playback(ev),
                },
                None => Incoming::Playback(playback.recv().await),
            }
        };

        match incoming {
            Incoming::Transcript(Some(event)) => {
                self.apply_transcript_event(event.clone());
                SessionUpdate::Transcript(event)
            }
            Incoming::Transcript(None) => {
                self.events = None;
                if self.state == RecorderState::Connected {
                    self.last_error =
                        Some("transcription channel closed unexpectedly".to_string());
                    self.state = RecorderState::Error;
                }
                SessionUpdate::ChannelClosed
            }
            Incoming::Playback(Some(event)) => {
                self.apply_playback_event(event.clone());
                SessionUpdate::Playback(event)
            }
            // The controller holds its sender for its whole lifetime
            Incoming::Playback(None) => SessionUpdate::ChannelClosed,
        }
    }

    /// Fold one transcript event into session state
    pub fn apply_transcript_event(&mut self, event: TranscriptEvent) {
        match event {
            TranscriptEvent::Partial(text) => {
                if self.state == RecorderState::Connected {
                    self.transcript.apply_partial(&text);
                }
            }
            TranscriptEvent::Committed(text) => {
                if self.state == RecorderState::Connected {
                    self.transcript.commit(&text);
                }
            }
            TranscriptEvent::Error(message) => {
                tracing::error!(error = %message, "transcription channel error");
                self.last_error = Some(message);
                if self.state == RecorderState::Connected {
                    // The vendor layer owns socket teardown on error
                    self.state = RecorderState::Error;
                }
            }
        }
    }

    /// Fold one playback lifecycle event into session state
    pub fn apply_playback_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Started => self.phase = SpeechPhase::Speaking,
            PlaybackEvent::Finished => self.phase = SpeechPhase::Ready,
            PlaybackEvent::Error(message) => {
                tracing::error!(error = %message, "playback failed");
                self.last_error = Some(message);
                self.phase = SpeechPhase::Ready;
            }
        }
    }

    /// Set or clear the user-supplied API key
    ///
    /// A changed effective credential invalidates any held session token.
    pub fn set_user_api_key(&mut self, key: Option<String>) {
        if self.credentials.set_user_key(key) {
            self.token = None;
        }
    }

    /// Select a synthesis voice
    pub fn set_voice(&mut self, voice_id: String) {
        self.config.voice_id = voice_id;
    }

    /// Drop the committed history and accumulated transcript
    pub fn clear_history(&mut self) {
        self.transcript.clear();
    }

    /// The text a copy action exports: the committed history, space-joined
    #[must_use]
    pub fn copy_text(&self) -> String {
        self.transcript.joined()
    }

    /// Current recording-side state
    #[must_use]
    pub const fn state(&self) -> RecorderState {
        self.state
    }

    /// Current synthesis-side phase
    #[must_use]
    pub const fn phase(&self) -> SpeechPhase {
        self.phase
    }

    /// Whether a live connection exists
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Connected
    }

    /// The transcript store
    #[must_use]
    pub const fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }

    /// The most recent user-visible error message
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Selected voice id
    #[must_use]
    pub fn voice_id(&self) -> &str {
        &self.config.voice_id
    }

    /// A cloneable handle for requesting stops from outside the driver
    #[must_use]
    pub fn stop_signal(&self) -> StopSignal {
        self.stop_signal.clone()
    }

    fn fail(&mut self, err: Error) -> Error {
        let message = err.message();
        tracing::error!(error = %message, "session error");
        self.last_error = Some(message);
        self.state = RecorderState::Error;
        err
    }

    fn speech_fail(&mut self, err: Error) -> Error {
        let message = err.message();
        tracing::error!(error = %message, "synthesis error");
        self.last_error = Some(message);
        self.phase = SpeechPhase::Ready;
        err
    }
}
