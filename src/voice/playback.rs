//! Speech playback to the audio output device
//!
//! One output handle, one active playback. Requests arriving while audio is
//! playing replace any earlier pending request; the controller drains at most
//! one queued result after the current playback finishes.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};
use tokio::sync::mpsc;

use crate::{Error, Result};

/// Lifecycle notifications for a submitted synthesis result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Audio started playing
    Started,
    /// Audio finished naturally; the decoded resource has been released
    Finished,
    /// Playback failed
    Error(String),
}

/// Something that can play one MP3 byte stream to completion
///
/// The production implementation is [`CpalSink`]; tests substitute a
/// recording fake.
pub trait PlaybackSink: Send + 'static {
    /// Decode and play the audio, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if decoding or the output device fails.
    fn play(&mut self, audio: &[u8]) -> Result<()>;
}

struct PlaybackQueue {
    busy: bool,
    pending: Option<Vec<u8>>,
}

/// Serializes synthesis results onto a single playback sink
pub struct PlaybackController {
    sink: Arc<Mutex<Box<dyn PlaybackSink>>>,
    queue: Arc<Mutex<PlaybackQueue>>,
    events_tx: mpsc::UnboundedSender<PlaybackEvent>,
    events_rx: mpsc::UnboundedReceiver<PlaybackEvent>,
}

impl PlaybackController {
    /// Create a controller around a sink
    #[must_use]
    pub fn new(sink: Box<dyn PlaybackSink>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            sink: Arc::new(Mutex::new(sink)),
            queue: Arc::new(Mutex::new(PlaybackQueue {
                busy: false,
                pending: None,
            })),
            events_tx,
            events_rx,
        }
    }

    /// Submit a synthesis result for playback
    ///
    /// If audio is already playing, the result is parked as the single
    /// pending request, replacing any earlier one (latest wins).
    pub fn submit(&self, audio: Vec<u8>) {
        {
            let mut queue = self.queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if queue.busy {
                let replaced = queue.pending.replace(audio).is_some();
                tracing::debug!(replaced, "playback busy, parked latest synthesis result");
                return;
            }
            queue.busy = true;
        }
        self.spawn_drain(audio);
    }

    /// Mutable access to the lifecycle event stream
    pub fn events_mut(&mut self) -> &mut mpsc::UnboundedReceiver<PlaybackEvent> {
        &mut self.events_rx
    }

    fn spawn_drain(&self, first: Vec<u8>) {
        let sink = Arc::clone(&self.sink);
        let queue = Arc::clone(&self.queue);
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let mut current = first;
            loop {
                let _ = events.send(PlaybackEvent::Started);

                let audio = std::mem::take(&mut current);
                let sink_ref = Arc::clone(&sink);
                let outcome = tokio::task::spawn_blocking(move || {
                    let mut sink = sink_ref
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    sink.play(&audio)
                })
                .await;

                match outcome {
                    Ok(Ok(())) => {
                        let _ = events.send(PlaybackEvent::Finished);
                    }
                    Ok(Err(e)) => {
                        let _ = events.send(PlaybackEvent::Error(e.message()));
                    }
                    Err(e) => {
                        let _ = events.send(PlaybackEvent::Error(format!(
                            "playback task failed: {e}"
                        )));
                    }
                }

                let next = {
                    let mut queue = queue
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    let next = queue.pending.take();
                    if next.is_none() {
                        queue.busy = false;
                    }
                    next
                };

                match next {
                    Some(audio) => current = audio,
                    None => break,
                }
            }
        });
    }
}

/// The single output handle: device plus stream config for one sample rate
struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_rate: u32,
}

impl AudioOutput {
    fn open(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Playback("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Playback(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(sample_rate)
                        && c.max_sample_rate() >= SampleRate(sample_rate)
                })
            })
            .ok_or_else(|| Error::Playback("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(sample_rate))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "audio output opened"
        );

        Ok(Self {
            device,
            config,
            sample_rate,
        })
    }
}

/// Plays MP3 audio on the default output device
///
/// The output handle is created lazily on first use and reused while valid;
/// a failed playback drops it so the next request reopens the device.
pub struct CpalSink {
    output: Option<AudioOutput>,
    volume: f32,
    muted: bool,
}

impl Default for CpalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalSink {
    /// Create a sink; no device is touched until the first play
    #[must_use]
    pub const fn new() -> Self {
        Self {
            output: None,
            volume: 1.0,
            muted: false,
        }
    }

    /// Play raw mono samples at the given rate
    ///
    /// # Errors
    ///
    /// Returns error if the output device fails.
    pub fn play_pcm(&mut self, samples: &[f32], sample_rate: u32) -> Result<()> {
        self.play_samples(samples, sample_rate)
    }

    fn play_samples(&mut self, samples: &[f32], sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        // Residual level state from an earlier playback must never silence
        // this one.
        self.volume = 1.0;
        self.muted = false;
        let gain = if self.muted { 0.0 } else { self.volume };

        let reuse = self
            .output
            .as_ref()
            .is_some_and(|o| o.sample_rate == sample_rate);
        if !reuse {
            self.output = Some(AudioOutput::open(sample_rate)?);
        }
        let (device, config) = {
            let output = self
                .output
                .as_ref()
                .ok_or_else(|| Error::Playback("output handle unavailable".to_string()))?;
            (output.device.clone(), output.config.clone())
        };

        let channels = config.channels as usize;

        let samples: Arc<Vec<f32>> = Arc::new(samples.iter().map(|s| s * gain).collect());
        let position = Arc::new(Mutex::new(0usize));
        let finished = Arc::new(Mutex::new(false));

        let samples_cb = Arc::clone(&samples);
        let position_cb = Arc::clone(&position);
        let finished_cb = Arc::clone(&finished);

        let stream = match device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut pos = position_cb.lock().unwrap();

                for frame in data.chunks_mut(channels) {
                    let sample = if *pos < samples_cb.len() {
                        samples_cb[*pos]
                    } else {
                        *finished_cb.lock().unwrap() = true;
                        0.0
                    };

                    for out in frame.iter_mut() {
                        *out = sample;
                    }

                    if *pos < samples_cb.len() {
                        *pos += 1;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        ) {
            Ok(stream) => stream,
            Err(e) => {
                self.output = None;
                return Err(Error::Playback(e.to_string()));
            }
        };

        if let Err(e) = stream.play() {
            self.output = None;
            return Err(Error::Playback(e.to_string()));
        }

        // Wait for playback to finish, bounded by the clip duration
        let duration_ms = (samples.len() as u64 * 1000) / u64::from(sample_rate);
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(duration_ms + 500);

        while !*finished.lock().unwrap() {
            if start.elapsed() > timeout {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }

        // Let the device drain the tail
        std::thread::sleep(std::time::Duration::from_millis(100));

        drop(stream);
        tracing::debug!(samples = samples.len(), "playback complete");

        Ok(())
    }
}

impl PlaybackSink for CpalSink {
    fn play(&mut self, audio: &[u8]) -> Result<()> {
        let (samples, sample_rate) = decode_mp3(audio)?;
        self.play_samples(&samples, sample_rate)
    }
}

/// Decode MP3 bytes to mono f32 samples, returning the stream's sample rate
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                #[allow(clippy::cast_sign_loss)]
                let rate = frame.sample_rate as u32;
                sample_rate.get_or_insert(rate);

                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    // Stereo: average channels down to mono
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Playback(format!("MP3 decode error: {e}"))),
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| Error::Playback("empty MP3 stream".to_string()))?;
    Ok((samples, sample_rate))
}
