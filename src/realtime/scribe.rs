//! ElevenLabs Scribe realtime transcription client
//!
//! Streams microphone PCM over a WebSocket authenticated by a single-use
//! session token and translates vendor frames into [`TranscriptEvent`]s.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::{MicConstraints, RealtimeTranscriber, TranscriptEvent};
use crate::providers::SessionToken;
use crate::voice::{AudioCapture, SAMPLE_RATE};
use crate::{Error, Result};

/// Cadence for flushing captured audio to the channel
const CHUNK_INTERVAL: Duration = Duration::from_millis(100);

/// How long to let the reader drain trailing frames on disconnect
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

type WsSink = futures::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Frames the Scribe service sends
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ScribeFrame {
    PartialTranscript { text: String },
    CommittedTranscript { text: String },
    Error { message: String },
    #[serde(other)]
    Other,
}

struct ScribeConnection {
    sink: Arc<tokio::sync::Mutex<WsSink>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    capture: AudioCapture,
    last_partial: Arc<Mutex<Option<String>>>,
}

/// Realtime Scribe client
///
/// Holds at most one live connection; the microphone is only open while the
/// connection is.
pub struct ScribeClient {
    realtime_url: String,
    model_id: String,
    conn: Option<ScribeConnection>,
}

impl ScribeClient {
    /// Create a client for a realtime endpoint and model
    #[must_use]
    pub const fn new(realtime_url: String, model_id: String) -> Self {
        Self {
            realtime_url,
            model_id,
            conn: None,
        }
    }
}

#[async_trait(?Send)]
impl RealtimeTranscriber for ScribeClient {
    async fn connect(
        &mut self,
        token: SessionToken,
        constraints: MicConstraints,
    ) -> Result<mpsc::UnboundedReceiver<TranscriptEvent>> {
        if self.conn.is_some() {
            return Err(Error::Connection(
                "a realtime connection is already open".to_string(),
            ));
        }

        let url = Url::parse_with_params(
            &self.realtime_url,
            &[
                ("model_id", self.model_id.as_str()),
                ("token", token.as_str()),
            ],
        )
        .map_err(|e| Error::Connection(format!("invalid realtime endpoint: {e}")))?;

        tracing::debug!(model_id = %self.model_id, "opening realtime connection");

        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::Connection(format!("realtime connect failed: {e}")))?;
        let (mut ws_tx, mut ws_rx) = stream.split();

        // Session config must be the first frame on the wire
        let init = serde_json::json!({
            "type": "session_config",
            "model_id": self.model_id,
            "audio_format": { "encoding": "pcm_s16le", "sample_rate": SAMPLE_RATE },
            "microphone": {
                "echo_cancellation": constraints.echo_cancellation,
                "noise_suppression": constraints.noise_suppression,
                "auto_gain_control": constraints.auto_gain_control,
            },
        });
        ws_tx
            .send(Message::Text(init.to_string().into()))
            .await
            .map_err(|e| Error::Connection(format!("session config send failed: {e}")))?;

        let mut capture = AudioCapture::new()?;
        capture.start()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let last_partial = Arc::new(Mutex::new(None));

        // Reader: vendor frames -> transcript events
        let reader_partial = Arc::clone(&last_partial);
        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ScribeFrame>(&text) {
                            Ok(ScribeFrame::PartialTranscript { text }) => {
                                *reader_partial
                                    .lock()
                                    .unwrap_or_else(std::sync::PoisonError::into_inner) =
                                    Some(text.clone());
                                if events_tx.send(TranscriptEvent::Partial(text)).is_err() {
                                    break;
                                }
                            }
                            Ok(ScribeFrame::CommittedTranscript { text }) => {
                                // The commit supersedes any live partial
                                reader_partial
                                    .lock()
                                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                                    .take();
                                if events_tx.send(TranscriptEvent::Committed(text)).is_err() {
                                    break;
                                }
                            }
                            Ok(ScribeFrame::Error { message }) => {
                                if events_tx.send(TranscriptEvent::Error(message)).is_err() {
                                    break;
                                }
                            }
                            Ok(ScribeFrame::Other) => {}
                            Err(e) => {
                                tracing::debug!(error = %e, "unrecognized realtime frame");
                            }
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        let _ = events_tx
                            .send(TranscriptEvent::Error(format!("realtime channel dropped: {e}")));
                        break;
                    }
                }
            }
            tracing::debug!("realtime reader finished");
        });

        // Writer: microphone chunks -> vendor frames
        let sink = Arc::new(tokio::sync::Mutex::new(ws_tx));
        let writer_sink = Arc::clone(&sink);
        let buffer = capture.buffer();
        let writer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CHUNK_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let samples = buffer.take();
                if samples.is_empty() {
                    continue;
                }
                let frame = serde_json::json!({
                    "type": "audio_chunk",
                    "audio_base64": BASE64.encode(pcm_s16le_bytes(&samples)),
                });
                let mut sink = writer_sink.lock().await;
                if sink
                    .send(Message::Text(frame.to_string().into()))
                    .await
                    .is_err()
                {
                    tracing::debug!("realtime writer send failed, stopping");
                    break;
                }
            }
        });

        self.conn = Some(ScribeConnection {
            sink,
            reader,
            writer,
            capture,
            last_partial,
        });

        tracing::info!("realtime connection established");
        Ok(events_rx)
    }

    async fn disconnect(&mut self) -> Result<Option<String>> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(None);
        };

        conn.capture.stop();
        conn.writer.abort();

        {
            let mut sink = conn.sink.lock().await;
            let bye = serde_json::json!({ "type": "end_of_stream" });
            if let Err(e) = sink.send(Message::Text(bye.to_string().into())).await {
                tracing::debug!(error = %e, "end_of_stream send failed");
            }
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "websocket close failed");
            }
        }

        // Let the reader drain trailing frames, then give up on it
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut conn.reader)
            .await
            .is_err()
        {
            conn.reader.abort();
        }

        let final_partial = conn
            .last_partial
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();

        tracing::info!(final_partial = ?final_partial, "realtime connection closed");
        Ok(final_partial)
    }
}

/// Convert f32 samples to little-endian signed 16-bit PCM bytes
fn pcm_s16le_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}
