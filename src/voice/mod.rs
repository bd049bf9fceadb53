//! Audio capture, playback, and speech synthesis
//!
//! Capture feeds the realtime transcription channel; playback owns the one
//! audio-output handle and speaks synthesis results back.

mod capture;
mod playback;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, SharedAudioBuffer, samples_to_wav};
pub use playback::{CpalSink, PlaybackController, PlaybackEvent, PlaybackSink};
pub use tts::{
    DEFAULT_VOICE_ID, ElevenLabsSynthesizer, SYNTHESIS_MODEL_ID, SpeechSynthesizer,
    SynthesisRequest, VoiceProfile, voice_profiles,
};
