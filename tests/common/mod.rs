//! Shared test doubles
//!
//! The session orchestrator is exercised without audio hardware or network:
//! every collaborator is replaced behind its capability trait.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::mpsc;

use quill_gateway::voice::{PlaybackSink, SpeechSynthesizer, SynthesisRequest};
use quill_gateway::{
    Error, MicConstraints, RealtimeTranscriber, Recorder, Result, SessionConfig, SessionToken,
    TokenProvider, TranscriptEvent,
};

/// Token provider returning a canned outcome
pub struct StaticTokens {
    outcome: std::result::Result<String, String>,
    delay: Option<Duration>,
    issued: Arc<Mutex<u32>>,
}

impl StaticTokens {
    pub fn ok() -> Self {
        Self {
            outcome: Ok("test-session-token".to_string()),
            delay: None,
            issued: Arc::new(Mutex::new(0)),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            delay: None,
            issued: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn issued_handle(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.issued)
    }
}

#[async_trait]
impl TokenProvider for StaticTokens {
    async fn issue(&self, _credential: &SecretString) -> Result<SessionToken> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        *self.issued.lock().unwrap() += 1;
        match &self.outcome {
            Ok(token) => Ok(SessionToken::new(token.clone())),
            Err(message) => Err(Error::Transport(message.clone())),
        }
    }
}

#[derive(Default)]
struct TranscriberShared {
    sender: Option<mpsc::UnboundedSender<TranscriptEvent>>,
    connects: u32,
    disconnects: u32,
    final_partial: Option<String>,
    fail_connect: Option<String>,
}

/// Control handle for the mock transcriber, shared with the test body
#[derive(Clone, Default)]
pub struct TranscriberHandle {
    inner: Arc<Mutex<TranscriberShared>>,
    connect_delay: Arc<Mutex<Option<Duration>>>,
}

impl TranscriberHandle {
    /// Emit an event on the live connection
    pub fn emit(&self, event: TranscriptEvent) {
        let shared = self.inner.lock().unwrap();
        let sender = shared.sender.as_ref().expect("no live connection");
        sender.send(event).expect("event receiver dropped");
    }

    pub fn connects(&self) -> u32 {
        self.inner.lock().unwrap().connects
    }

    pub fn disconnects(&self) -> u32 {
        self.inner.lock().unwrap().disconnects
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().sender.is_some()
    }

    /// What the next disconnect reports as the final partial transcript
    pub fn set_final_partial(&self, partial: Option<&str>) {
        self.inner.lock().unwrap().final_partial = partial.map(ToString::to_string);
    }

    pub fn fail_next_connect(&self, message: &str) {
        self.inner.lock().unwrap().fail_connect = Some(message.to_string());
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock().unwrap() = Some(delay);
    }
}

/// Transcriber double driven entirely by its [`TranscriberHandle`]
#[derive(Default)]
pub struct MockTranscriber {
    pub handle: TranscriberHandle,
}

#[async_trait(?Send)]
impl RealtimeTranscriber for MockTranscriber {
    async fn connect(
        &mut self,
        _token: SessionToken,
        _constraints: MicConstraints,
    ) -> Result<mpsc::UnboundedReceiver<TranscriptEvent>> {
        let delay = *self.handle.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut shared = self.handle.inner.lock().unwrap();
        if let Some(message) = shared.fail_connect.take() {
            return Err(Error::Connection(message));
        }
        shared.connects += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        shared.sender = Some(tx);
        Ok(rx)
    }

    async fn disconnect(&mut self) -> Result<Option<String>> {
        let mut shared = self.handle.inner.lock().unwrap();
        shared.disconnects += 1;
        shared.sender = None;
        Ok(shared.final_partial.take())
    }
}

/// Records synthesis requests; optionally fails them
#[derive(Clone, Default)]
pub struct SynthLog {
    requests: Arc<Mutex<Vec<SynthesisRequest>>>,
    fail: Arc<Mutex<Option<String>>>,
}

impl SynthLog {
    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn fail_next(&self, message: &str) {
        *self.fail.lock().unwrap() = Some(message.to_string());
    }
}

pub struct MockSynthesizer {
    pub log: SynthLog,
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(
        &self,
        _credential: &SecretString,
        request: &SynthesisRequest,
    ) -> Result<Vec<u8>> {
        if let Some(message) = self.log.fail.lock().unwrap().take() {
            return Err(Error::Synthesis(message));
        }
        self.log.requests.lock().unwrap().push(request.clone());
        Ok(vec![0u8; 16])
    }
}

/// Records what reached the playback sink
#[derive(Clone, Default)]
pub struct PlayLog(Arc<Mutex<Vec<usize>>>);

impl PlayLog {
    pub fn plays(&self) -> Vec<usize> {
        self.0.lock().unwrap().clone()
    }
}

pub struct RecordingSink {
    pub log: PlayLog,
}

impl PlaybackSink for RecordingSink {
    fn play(&mut self, audio: &[u8]) -> Result<()> {
        self.log.0.lock().unwrap().push(audio.len());
        Ok(())
    }
}

/// A fully assembled recorder plus the handles into its doubles
pub struct Harness {
    pub recorder: Recorder,
    pub transcriber: TranscriberHandle,
    pub synth: SynthLog,
    pub plays: PlayLog,
}

pub fn default_config() -> SessionConfig {
    SessionConfig {
        default_api_key: Some("test-api-key".to_string()),
        ..SessionConfig::default()
    }
}

pub fn harness(config: SessionConfig) -> Harness {
    harness_with_tokens(config, StaticTokens::ok())
}

pub fn harness_with_tokens(config: SessionConfig, tokens: StaticTokens) -> Harness {
    let transcriber = MockTranscriber::default();
    let handle = transcriber.handle.clone();
    let synth = SynthLog::default();
    let plays = PlayLog::default();

    let recorder = Recorder::new(
        config,
        Box::new(transcriber),
        Box::new(tokens),
        Box::new(MockSynthesizer { log: synth.clone() }),
        Box::new(RecordingSink { log: plays.clone() }),
    );

    Harness {
        recorder,
        transcriber: handle,
        synth,
        plays,
    }
}
