use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use quill_gateway::voice::{AudioCapture, CpalSink, PlaybackSink, SAMPLE_RATE, samples_to_wav};
use quill_gateway::{
    AppConfig, CredentialResolver, ElevenLabsSynthesizer, ElevenLabsTokenClient, PlaybackEvent,
    Recorder, ScribeClient, SessionUpdate, SpeechSynthesizer, SynthesisRequest, TranscriptEvent,
    voice_profiles,
};

/// Quill - realtime dictation with spoken-back synthesis
#[derive(Parser)]
#[command(name = "quill", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive dictation session (the default)
    Record {
        /// Synthesis voice id (see `quill voices`)
        #[arg(long)]
        voice: Option<String>,

        /// Don't speak the transcript back on stop
        #[arg(long)]
        no_speak: bool,
    },
    /// Run the token/synthesis proxy server
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// List the available synthesis voices
    Voices,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,quill_gateway=info",
        1 => "info,quill_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load();

    match cli.command {
        None => cmd_record(config, None, false).await,
        Some(Command::Record { voice, no_speak }) => cmd_record(config, voice, no_speak).await,
        Some(Command::Serve { port }) => cmd_serve(config, port).await,
        Some(Command::Voices) => {
            cmd_voices();
            Ok(())
        }
        Some(Command::TestMic { duration }) => test_mic(duration).await,
        Some(Command::TestSpeaker) => test_speaker(),
        Some(Command::TestTts { text }) => test_tts(&config, &text).await,
    }
}

/// Interactive dictation loop: one control toggles the whole session
#[allow(clippy::future_not_send, clippy::too_many_lines)]
async fn cmd_record(
    mut config: AppConfig,
    voice: Option<String>,
    no_speak: bool,
) -> anyhow::Result<()> {
    if let Some(voice) = voice {
        config.voice_id = voice;
    }
    if no_speak {
        config.speak_on_stop = false;
    }

    let transcriber = Box::new(ScribeClient::new(
        config.realtime_url.clone(),
        config.scribe_model_id.clone(),
    ));
    let tokens = Box::new(ElevenLabsTokenClient::new(
        config.api_base_url.clone(),
        config.token_timeout,
    )?);
    let synthesizer = Box::new(ElevenLabsSynthesizer::new(
        config.api_base_url.clone(),
        config.synthesis_timeout,
    )?);

    let mut recorder = Recorder::new(
        config.session_config(),
        transcriber,
        tokens,
        synthesizer,
        Box::new(CpalSink::new()),
    );

    println!("quill dictation");
    println!("  Enter  start/stop recording");
    println!("  c      clear transcript history");
    println!("  p      print the transcript");
    println!("  q      quit");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => {
                        if recorder.is_recording() {
                            if let Err(e) = recorder.stop().await {
                                eprintln!("error: {}", e.message());
                            } else {
                                println!("stopped.");
                            }
                        } else if let Err(e) = recorder.start().await {
                            eprintln!("error: {}", e.message());
                        } else if recorder.is_recording() {
                            println!("recording... press Enter to stop");
                        }
                    }
                    "c" => {
                        recorder.clear_history();
                        println!("history cleared");
                    }
                    "p" => println!("{}", recorder.copy_text()),
                    "q" => break,
                    other => println!("unrecognized input: {other:?}"),
                }
            }
            update = recorder.pump() => {
                match update {
                    SessionUpdate::Transcript(TranscriptEvent::Partial(text)) => {
                        print!("\r… {text}");
                        let _ = std::io::stdout().flush();
                    }
                    SessionUpdate::Transcript(TranscriptEvent::Committed(text)) => {
                        if !text.trim().is_empty() {
                            println!("\r✔ {}", text.trim());
                        }
                    }
                    SessionUpdate::Transcript(TranscriptEvent::Error(message)) => {
                        eprintln!("\rtranscription error: {message}");
                    }
                    SessionUpdate::Playback(PlaybackEvent::Started) => println!("speaking…"),
                    SessionUpdate::Playback(PlaybackEvent::Finished) => println!("ready."),
                    SessionUpdate::Playback(PlaybackEvent::Error(message)) => {
                        eprintln!("playback error: {message}");
                    }
                    SessionUpdate::ChannelClosed => {
                        if let Some(message) = recorder.last_error() {
                            eprintln!("session error: {message}");
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// Run the token/synthesis proxy endpoints
async fn cmd_serve(config: AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    let state = Arc::new(quill_gateway::api::ApiState {
        credentials: CredentialResolver::new(config.api_key.clone()),
        tokens: ElevenLabsTokenClient::new(config.api_base_url.clone(), config.token_timeout)?,
        synthesizer: ElevenLabsSynthesizer::new(
            config.api_base_url.clone(),
            config.synthesis_timeout,
        )?,
        default_voice_id: config.voice_id.clone(),
        synthesis_model_id: config.synthesis_model_id.clone(),
    });

    quill_gateway::api::serve(state, port.unwrap_or(config.port)).await?;
    Ok(())
}

fn cmd_voices() {
    println!("available voices:");
    for profile in voice_profiles() {
        println!(
            "  {:<24} {:<10} {}",
            profile.id, profile.display_name, profile.description
        );
    }
}

/// Record a few seconds from the microphone and write a WAV check file
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;
    println!("recording for {duration}s...");
    tokio::time::sleep(Duration::from_secs(duration)).await;

    let samples = capture.buffer().take();
    capture.stop();

    #[allow(clippy::cast_precision_loss)]
    let rms = if samples.is_empty() {
        0.0
    } else {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    };

    let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
    std::fs::write("mic-check.wav", &wav)?;
    println!(
        "captured {} samples (rms {rms:.4}), wrote mic-check.wav",
        samples.len()
    );

    if rms < 0.001 {
        println!("warning: input level is very low - check the microphone");
    }
    Ok(())
}

/// Play a short tone through the output device
fn test_speaker() -> anyhow::Result<()> {
    const TONE_RATE: u32 = 24000;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..TONE_RATE)
        .map(|i| {
            let t = i as f32 / TONE_RATE as f32;
            0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect();

    println!("playing test tone...");
    let mut sink = CpalSink::new();
    sink.play_pcm(&samples, TONE_RATE)?;
    println!("done");
    Ok(())
}

/// Synthesize a line of text and play it
async fn test_tts(config: &AppConfig, text: &str) -> anyhow::Result<()> {
    let credential = CredentialResolver::new(config.api_key.clone()).resolve()?;
    let synthesizer =
        ElevenLabsSynthesizer::new(config.api_base_url.clone(), config.synthesis_timeout)?;

    println!("synthesizing: {text}");
    let request = SynthesisRequest {
        text: text.to_string(),
        voice_id: config.voice_id.clone(),
        model_id: config.synthesis_model_id.clone(),
    };
    let audio = synthesizer.synthesize(&credential, &request).await?;

    println!("playing {} bytes...", audio.len());
    let mut sink = CpalSink::new();
    sink.play(&audio)?;
    println!("done");
    Ok(())
}
