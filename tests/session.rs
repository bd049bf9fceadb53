//! Session lifecycle integration tests
//!
//! Exercises the recorder state machine end to end with every external
//! collaborator mocked behind its capability trait.

mod common;

use std::time::Duration;

use common::{StaticTokens, default_config, harness, harness_with_tokens};
use quill_gateway::{PlaybackEvent, RecorderState, SessionUpdate, SpeechPhase, TranscriptEvent};

fn quiet_config() -> quill_gateway::SessionConfig {
    quill_gateway::SessionConfig {
        speak_on_stop: false,
        ..default_config()
    }
}

#[tokio::test]
async fn start_connects_and_stop_returns_to_idle() {
    let mut h = harness(quiet_config());

    assert_eq!(h.recorder.state(), RecorderState::Idle);
    h.recorder.start().await.unwrap();
    assert_eq!(h.recorder.state(), RecorderState::Connected);
    assert!(h.recorder.is_recording());

    h.recorder.stop().await.unwrap();
    assert_eq!(h.recorder.state(), RecorderState::Idle);
    assert_eq!(h.transcriber.connects(), 1);
    assert_eq!(h.transcriber.disconnects(), 1);
}

#[tokio::test]
async fn committed_events_accumulate_in_arrival_order() {
    let mut h = harness(quiet_config());
    h.recorder.start().await.unwrap();

    h.transcriber.emit(TranscriptEvent::Committed("Hello".to_string()));
    h.transcriber.emit(TranscriptEvent::Committed("world".to_string()));
    h.transcriber.emit(TranscriptEvent::Committed(String::new()));
    for _ in 0..3 {
        h.recorder.pump().await;
    }

    // The empty commit is dropped: two segments, space-joined accumulation
    assert_eq!(h.recorder.transcript().accumulated(), "Hello world");
    assert_eq!(h.recorder.transcript().segments().len(), 2);
    assert_eq!(
        h.recorder.transcript().accumulated(),
        h.recorder.transcript().joined()
    );
}

#[tokio::test]
async fn whitespace_commits_never_create_segments() {
    let mut h = harness(quiet_config());
    h.recorder.start().await.unwrap();

    h.transcriber.emit(TranscriptEvent::Committed("   ".to_string()));
    h.transcriber.emit(TranscriptEvent::Committed("\t\n".to_string()));
    for _ in 0..2 {
        h.recorder.pump().await;
    }

    assert!(h.recorder.transcript().is_empty());
    assert_eq!(h.recorder.transcript().accumulated(), "");
}

#[tokio::test]
async fn partial_reflects_only_the_latest_event_and_clears_on_stop() {
    let mut h = harness(quiet_config());
    h.recorder.start().await.unwrap();

    h.transcriber.emit(TranscriptEvent::Partial("hel".to_string()));
    h.transcriber.emit(TranscriptEvent::Partial("hello".to_string()));
    h.transcriber.emit(TranscriptEvent::Partial("hello there".to_string()));
    for _ in 0..3 {
        h.recorder.pump().await;
    }
    assert_eq!(h.recorder.transcript().partial(), Some("hello there"));

    h.recorder.stop().await.unwrap();
    assert_eq!(h.recorder.transcript().partial(), None);
}

#[tokio::test]
async fn start_is_idempotent_while_connected() {
    let mut h = harness(quiet_config());
    h.recorder.start().await.unwrap();
    assert_eq!(h.transcriber.connects(), 1);

    // A second start must not open a second connection
    h.recorder.start().await.unwrap();
    assert_eq!(h.transcriber.connects(), 1);
    assert_eq!(h.recorder.state(), RecorderState::Connected);
}

#[tokio::test]
async fn clear_history_empties_everything_copyable() {
    let mut h = harness(quiet_config());
    h.recorder.start().await.unwrap();

    h.transcriber.emit(TranscriptEvent::Committed("some words".to_string()));
    h.recorder.pump().await;
    h.recorder.stop().await.unwrap();
    assert_eq!(h.recorder.copy_text(), "some words");

    h.recorder.clear_history();
    assert!(h.recorder.transcript().is_empty());
    assert_eq!(h.recorder.transcript().accumulated(), "");
    assert_eq!(h.recorder.copy_text(), "");
}

#[tokio::test]
async fn token_rejection_surfaces_the_endpoint_message_verbatim() {
    let message = "API key is required. Please provide an API key or configure ELEVENLABS_API_KEY in environment variables.";
    let mut h = harness_with_tokens(quiet_config(), StaticTokens::failing(message));

    let err = h.recorder.start().await.unwrap_err();
    assert_eq!(err.message(), message);
    assert_eq!(h.recorder.state(), RecorderState::Error);
    assert_eq!(h.recorder.last_error(), Some(message));
    // Connected is never reached
    assert_eq!(h.transcriber.connects(), 0);
}

#[tokio::test]
async fn missing_credentials_fail_before_any_request() {
    let config = quill_gateway::SessionConfig {
        default_api_key: None,
        speak_on_stop: false,
        ..quill_gateway::SessionConfig::default()
    };
    let tokens = StaticTokens::ok();
    let issued = tokens.issued_handle();
    let mut h = harness_with_tokens(config, tokens);

    assert!(h.recorder.start().await.is_err());
    assert_eq!(h.recorder.state(), RecorderState::Error);
    assert_eq!(*issued.lock().unwrap(), 0);
}

#[tokio::test]
async fn connect_failure_moves_to_error() {
    let mut h = harness(quiet_config());
    h.transcriber.fail_next_connect("realtime connect failed: refused");

    let err = h.recorder.start().await.unwrap_err();
    assert_eq!(err.message(), "realtime connect failed: refused");
    assert_eq!(h.recorder.state(), RecorderState::Error);
}

#[tokio::test]
async fn channel_error_surfaces_without_teardown() {
    let mut h = harness(quiet_config());
    h.recorder.start().await.unwrap();

    h.transcriber.emit(TranscriptEvent::Error("quota exceeded".to_string()));
    h.recorder.pump().await;

    assert_eq!(h.recorder.state(), RecorderState::Error);
    assert_eq!(h.recorder.last_error(), Some("quota exceeded"));
    // This component never tears the socket down on a channel error
    assert_eq!(h.transcriber.disconnects(), 0);

    // start() recovers, closing the stale connection first
    h.recorder.start().await.unwrap();
    assert_eq!(h.recorder.state(), RecorderState::Connected);
    assert_eq!(h.transcriber.connects(), 2);
    assert_eq!(h.transcriber.disconnects(), 1);
}

#[tokio::test]
async fn stop_folds_captured_partial_into_spoken_text() {
    let mut h = harness(default_config());
    h.recorder.start().await.unwrap();

    h.transcriber.emit(TranscriptEvent::Committed("test".to_string()));
    h.transcriber.emit(TranscriptEvent::Partial("ing now".to_string()));
    for _ in 0..2 {
        h.recorder.pump().await;
    }

    h.recorder.stop().await.unwrap();

    let requests = h.synth.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].text, "test ing now");
}

#[tokio::test]
async fn disconnect_final_partial_wins_over_captured_state() {
    let mut h = harness(default_config());
    h.recorder.start().await.unwrap();

    h.transcriber.emit(TranscriptEvent::Committed("test".to_string()));
    h.recorder.pump().await;

    // The vendor layer reports a fresher partial at teardown than anything
    // the session saw on the event channel
    h.transcriber.set_final_partial(Some("ing now"));
    h.recorder.stop().await.unwrap();

    let requests = h.synth.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].text, "test ing now");
}

#[tokio::test]
async fn empty_transcript_makes_no_synthesis_request() {
    let mut h = harness(default_config());
    h.recorder.start().await.unwrap();
    h.recorder.stop().await.unwrap();

    assert!(h.synth.requests().is_empty());
    assert!(h.plays.plays().is_empty());
    assert_eq!(h.recorder.phase(), SpeechPhase::Ready);
}

#[tokio::test]
async fn speak_on_stop_disabled_skips_synthesis() {
    let mut h = harness(quiet_config());
    h.recorder.start().await.unwrap();
    h.transcriber.emit(TranscriptEvent::Committed("hello".to_string()));
    h.recorder.pump().await;
    h.recorder.stop().await.unwrap();

    assert!(h.synth.requests().is_empty());
}

#[tokio::test]
async fn playback_lifecycle_drives_the_speech_phase() {
    let mut h = harness(default_config());
    h.recorder.start().await.unwrap();
    h.transcriber.emit(TranscriptEvent::Committed("hello".to_string()));
    h.recorder.pump().await;
    h.recorder.stop().await.unwrap();

    assert_eq!(h.recorder.phase(), SpeechPhase::Processing);
    assert_eq!(
        h.recorder.pump().await,
        SessionUpdate::Playback(PlaybackEvent::Started)
    );
    assert_eq!(h.recorder.phase(), SpeechPhase::Speaking);
    assert_eq!(
        h.recorder.pump().await,
        SessionUpdate::Playback(PlaybackEvent::Finished)
    );
    assert_eq!(h.recorder.phase(), SpeechPhase::Ready);
    assert_eq!(h.plays.plays(), vec![16]);
}

#[tokio::test]
async fn synthesis_failure_surfaces_and_returns_to_ready() {
    let mut h = harness(default_config());
    h.recorder.start().await.unwrap();
    h.transcriber.emit(TranscriptEvent::Committed("hello".to_string()));
    h.recorder.pump().await;

    h.synth.fail_next("voice limit reached");
    let err = h.recorder.stop().await.unwrap_err();

    assert_eq!(err.message(), "voice limit reached");
    assert_eq!(h.recorder.last_error(), Some("voice limit reached"));
    assert_eq!(h.recorder.phase(), SpeechPhase::Ready);
    // The recording side is already idle regardless
    assert_eq!(h.recorder.state(), RecorderState::Idle);
    assert!(h.plays.plays().is_empty());
}

#[tokio::test]
async fn selected_voice_reaches_the_synthesis_request() {
    let mut h = harness(default_config());
    h.recorder.set_voice("21m00Tcm4TlvDq8ikWAM".to_string());
    h.recorder.start().await.unwrap();
    h.transcriber.emit(TranscriptEvent::Committed("hi".to_string()));
    h.recorder.pump().await;
    h.recorder.stop().await.unwrap();

    let requests = h.synth.requests();
    assert_eq!(requests[0].voice_id, "21m00Tcm4TlvDq8ikWAM");
}

#[tokio::test]
async fn stop_during_token_fetch_prevents_the_connect() {
    let tokens = StaticTokens::ok().with_delay(Duration::from_millis(50));
    let issued = tokens.issued_handle();
    let mut h = harness_with_tokens(quiet_config(), tokens);

    let signal = h.recorder.stop_signal();
    let stopper = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.request();
    };

    let (result, ()) = tokio::join!(h.recorder.start(), stopper);
    result.unwrap();

    // The fetch completed, but no connection was opened
    assert_eq!(*issued.lock().unwrap(), 1);
    assert_eq!(h.transcriber.connects(), 0);
    assert_eq!(h.recorder.state(), RecorderState::Idle);

    // The held token is reused on the next start instead of re-fetching
    h.recorder.start().await.unwrap();
    assert_eq!(*issued.lock().unwrap(), 1);
    assert_eq!(h.transcriber.connects(), 1);
}

#[tokio::test]
async fn stop_during_connect_disconnects_immediately() {
    let mut h = harness(quiet_config());
    h.transcriber.set_connect_delay(Duration::from_millis(50));

    let signal = h.recorder.stop_signal();
    let stopper = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.request();
    };

    let (result, ()) = tokio::join!(h.recorder.start(), stopper);
    result.unwrap();

    // The connect completed and was immediately torn down
    assert_eq!(h.transcriber.connects(), 1);
    assert_eq!(h.transcriber.disconnects(), 1);
    assert!(!h.transcriber.is_connected());
    assert_eq!(h.recorder.state(), RecorderState::Idle);
}

#[tokio::test]
async fn changing_the_user_key_invalidates_a_held_token() {
    let tokens = StaticTokens::ok().with_delay(Duration::from_millis(30));
    let issued = tokens.issued_handle();
    let mut h = harness_with_tokens(quiet_config(), tokens);

    // Park a token without consuming it (stop races the fetch)
    let signal = h.recorder.stop_signal();
    let stopper = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        signal.request();
    };
    let (result, ()) = tokio::join!(h.recorder.start(), stopper);
    result.unwrap();
    assert_eq!(*issued.lock().unwrap(), 1);

    // A different credential forces a re-fetch on the next start
    h.recorder.set_user_api_key(Some("another-key".to_string()));
    h.recorder.start().await.unwrap();
    assert_eq!(*issued.lock().unwrap(), 2);
}
