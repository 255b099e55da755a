//! Speech engine tests
//!
//! Debounce, stall recovery and recognition lifecycle, on tokio's paused
//! clock.

mod common;

use std::time::Duration;

use common::{FakeCapture, FakePlayback, yield_many};
use voice_bridge::event::{self, EventReceiver};
use voice_bridge::speech::{
    CaptureEngine, CaptureEvent, CaptureExit, CaptureSignal, PlaybackEngine, PlaybackEvent,
    PlaybackSettings, PlaybackSignal, RecognitionSegment, SpeakOrigin, SpeakOutcome,
    SynthesisError,
};
use voice_bridge::{Event, Voice};

struct Playback {
    engine: PlaybackEngine<FakePlayback>,
    port: FakePlayback,
    rx: EventReceiver,
}

impl Playback {
    fn new(supported: bool, requires_gesture: bool) -> Self {
        Self::with_port(FakePlayback::default(), supported, requires_gesture)
    }

    fn with_port(port: FakePlayback, supported: bool, requires_gesture: bool) -> Self {
        let (tx, rx) = event::channel();
        let engine = PlaybackEngine::new(
            port.clone(),
            tx,
            supported,
            requires_gesture,
            PlaybackSettings::default(),
        );
        Self { engine, port, rx }
    }

    /// Advance the clock and feed timer firings to the engine
    async fn advance(&mut self, by: Duration) -> Vec<PlaybackSignal> {
        tokio::time::sleep(by).await;
        yield_many().await;

        let mut signals = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            let Event::Playback(event) = event else {
                panic!("unexpected event {event:?}");
            };
            signals.extend(self.engine.handle(event));
        }
        signals
    }

    fn current_id(&self) -> voice_bridge::speech::UtteranceId {
        self.engine.current().expect("no utterance").id
    }
}

#[tokio::test(start_paused = true)]
async fn rapid_requests_voice_only_the_last() {
    let mut p = Playback::new(true, false);

    assert_eq!(p.engine.speak("first", SpeakOrigin::Programmatic), SpeakOutcome::Scheduled);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(p.engine.speak("second", SpeakOrigin::Programmatic), SpeakOutcome::Scheduled);

    p.advance(Duration::from_millis(200)).await;

    assert_eq!(p.port.spoken_texts(), ["second"]);
    assert!(p.engine.is_active());
}

#[tokio::test(start_paused = true)]
async fn speech_waits_for_debounce() {
    let mut p = Playback::new(true, false);
    p.engine.speak("hello", SpeakOrigin::Programmatic);

    p.advance(Duration::from_millis(50)).await;
    assert!(p.port.spoken().is_empty());

    p.advance(Duration::from_millis(50)).await;
    assert_eq!(p.port.spoken_texts(), ["hello"]);
    assert!(p.port.0.lock().cancels >= 1, "cancel precedes every speak");
}

#[tokio::test(start_paused = true)]
async fn stop_leaves_nothing_running() {
    let mut p = Playback::new(true, false);
    p.engine.speak("hello", SpeakOrigin::Programmatic);
    p.advance(Duration::from_millis(100)).await;
    let id = p.current_id();
    assert_eq!(p.engine.handle(PlaybackEvent::Started(id)), Some(PlaybackSignal::Started));
    assert!(p.engine.is_polling());

    assert!(p.engine.stop_speaking());
    assert!(!p.engine.is_speaking());
    assert!(!p.engine.is_polling());

    p.port.0.lock().paused = true;
    p.port.0.lock().speaking = true;
    let signals = p.advance(Duration::from_secs(30)).await;
    assert!(signals.is_empty());
    assert_eq!(p.port.0.lock().resumes, 0);
}

#[tokio::test(start_paused = true)]
async fn natural_end_stops_polling() {
    let mut p = Playback::new(true, false);
    p.engine.speak("hello", SpeakOrigin::Programmatic);
    p.advance(Duration::from_millis(100)).await;
    let id = p.current_id();
    p.engine.handle(PlaybackEvent::Started(id));
    assert!(p.engine.is_polling());

    assert_eq!(p.engine.handle(PlaybackEvent::Ended(id)), Some(PlaybackSignal::Finished));
    assert!(!p.engine.is_speaking());
    assert!(!p.engine.is_polling());

    {
        let mut log = p.port.0.lock();
        log.paused = true;
        log.speaking = true;
    }
    let signals = p.advance(Duration::from_secs(30)).await;
    assert!(signals.is_empty());
    assert_eq!(p.port.0.lock().resumes, 0);
}

#[tokio::test(start_paused = true)]
async fn stop_after_error_is_safe() {
    let mut p = Playback::new(true, false);
    p.engine.speak("hello", SpeakOrigin::Programmatic);
    p.advance(Duration::from_millis(100)).await;
    let id = p.current_id();

    let signal = p.engine.handle(PlaybackEvent::Failed {
        id,
        error: SynthesisError::Other("audio-busy".to_string()),
    });
    assert_eq!(signal, Some(PlaybackSignal::Finished));
    assert!(!p.engine.stop_speaking());
    assert!(!p.engine.is_speaking());
    assert!(!p.engine.is_polling());

    // A duplicate error for the same utterance is ignored
    let again = p.engine.handle(PlaybackEvent::Failed {
        id,
        error: SynthesisError::Canceled,
    });
    assert_eq!(again, None);
}

#[tokio::test(start_paused = true)]
async fn stop_during_debounce_cancels_the_request() {
    let mut p = Playback::new(true, false);
    p.engine.speak("hello", SpeakOrigin::Programmatic);
    assert!(p.engine.stop_speaking());

    p.advance(Duration::from_millis(200)).await;
    assert!(p.port.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn paused_synthesis_is_resumed() {
    let mut p = Playback::new(true, false);
    p.engine.speak("a very long answer", SpeakOrigin::Programmatic);
    p.advance(Duration::from_millis(100)).await;
    let id = p.current_id();
    p.engine.handle(PlaybackEvent::Started(id));
    {
        let mut log = p.port.0.lock();
        log.speaking = true;
        log.paused = true;
    }

    let signals = p.advance(Duration::from_millis(5100)).await;
    assert!(signals.is_empty());
    assert_eq!(p.port.0.lock().resumes, 1);
    assert!(p.engine.is_speaking());
}

#[tokio::test(start_paused = true)]
async fn silent_platform_ends_the_utterance() {
    let mut p = Playback::new(true, false);
    p.engine.speak("hello", SpeakOrigin::Programmatic);
    p.advance(Duration::from_millis(100)).await;
    let id = p.current_id();
    p.engine.handle(PlaybackEvent::Started(id));
    {
        let mut log = p.port.0.lock();
        log.speaking = false;
        log.pending = false;
    }

    let signals = p.advance(Duration::from_millis(5100)).await;
    assert_eq!(signals, [PlaybackSignal::Finished]);
    assert!(!p.engine.is_active());
    assert!(!p.engine.is_polling());
}

#[tokio::test(start_paused = true)]
async fn superseded_callbacks_are_ignored() {
    let mut p = Playback::new(true, false);
    p.engine.speak("one", SpeakOrigin::Programmatic);
    p.advance(Duration::from_millis(100)).await;
    let old = p.current_id();

    p.engine.speak("two", SpeakOrigin::Programmatic);
    assert_eq!(
        p.engine.handle(PlaybackEvent::Failed {
            id: old,
            error: SynthesisError::Interrupted,
        }),
        None
    );
    assert_eq!(p.engine.handle(PlaybackEvent::Ended(old)), None);
    assert!(p.engine.is_active());
}

#[tokio::test(start_paused = true)]
async fn unsupported_synthesis_is_a_no_op() {
    let mut p = Playback::new(false, false);

    assert_eq!(p.engine.speak("hello", SpeakOrigin::Gesture), SpeakOutcome::Ignored);
    assert!(!p.engine.stop_speaking());
    assert!(!p.engine.unlock());
    p.advance(Duration::from_secs(1)).await;

    assert!(p.port.0.lock().requests.is_empty());
    assert_eq!(p.port.0.lock().cancels, 0);
}

#[tokio::test(start_paused = true)]
async fn locked_platform_queues_programmatic_speech() {
    let mut p = Playback::new(true, true);
    assert!(!p.engine.can_autoplay());

    assert_eq!(p.engine.speak("hi", SpeakOrigin::Programmatic), SpeakOutcome::Queued);
    assert_eq!(p.engine.speak("hello", SpeakOrigin::Programmatic), SpeakOutcome::Queued);
    p.advance(Duration::from_millis(200)).await;
    assert!(p.port.0.lock().requests.is_empty());

    assert!(p.engine.unlock());
    assert!(p.engine.is_unlocked());
    p.advance(Duration::from_millis(100)).await;

    assert_eq!(p.port.spoken_texts(), ["hello"]);
    assert_eq!(p.port.0.lock().requests.len(), 2, "primer plus the queued text");
}

#[tokio::test(start_paused = true)]
async fn gesture_speech_unlocks_directly() {
    let mut p = Playback::new(true, true);

    assert_eq!(p.engine.speak("hi", SpeakOrigin::Gesture), SpeakOutcome::Scheduled);
    assert!(p.engine.is_unlocked());
    p.advance(Duration::from_millis(100)).await;
    assert_eq!(p.port.spoken_texts(), ["hi"]);
}

#[tokio::test(start_paused = true)]
async fn preferred_voice_is_selected() {
    let port = FakePlayback::default();
    port.0.lock().voices = vec![
        Voice::new("Alex", "en-US", true),
        Voice::new("Microsoft Aria Online (Natural)", "en-US", false),
        Voice::new("Samantha", "en-US", true),
    ];
    let mut p = Playback::with_port(port, true, false);

    p.engine.speak("hello", SpeakOrigin::Programmatic);
    p.advance(Duration::from_millis(100)).await;

    let voice = p.port.last_spoken().voice.expect("voice chosen");
    assert_eq!(voice.name, "Samantha");
}

#[tokio::test(start_paused = true)]
async fn late_voice_list_is_used() {
    let mut p = Playback::new(true, false);
    p.engine.handle(PlaybackEvent::VoicesChanged(vec![
        Voice::new("Thomas", "fr-FR", true),
        Voice::new("Google US English", "en-US", false),
    ]));

    p.engine.speak("hello", SpeakOrigin::Programmatic);
    p.advance(Duration::from_millis(100)).await;

    let voice = p.port.last_spoken().voice.expect("voice chosen");
    assert_eq!(voice.name, "Google US English");
}

fn capture(supported: bool) -> (CaptureEngine<FakeCapture>, FakeCapture) {
    let port = FakeCapture::default();
    (CaptureEngine::new(port.clone(), supported, "en-US"), port)
}

#[test]
fn start_while_listening_is_a_no_op() {
    let (mut engine, port) = capture(true);

    assert!(engine.start());
    assert!(!engine.start());
    assert!(engine.is_listening());
    assert_eq!(port.0.lock().starts.len(), 1);
    assert_eq!(port.0.lock().starts[0].1, "en-US");
}

#[test]
fn results_split_into_interim_and_final() {
    let (mut engine, port) = capture(true);
    engine.start();
    let pass = port.last_pass();

    let signal = engine.handle(CaptureEvent::Result {
        pass,
        segments: vec![
            RecognitionSegment::final_text("I'd like "),
            RecognitionSegment::final_text("a demo"),
            RecognitionSegment::interim(" on tues"),
        ],
    });

    assert_eq!(signal, Some(CaptureSignal::Updated));
    assert_eq!(engine.final_transcript(), "I'd like a demo");
    assert_eq!(engine.interim(), " on tues");
}

#[test]
fn every_exit_stops_listening() {
    let (mut engine, port) = capture(true);

    engine.start();
    let pass = port.last_pass();
    assert_eq!(
        engine.handle(CaptureEvent::Error {
            pass,
            reason: "no-speech".to_string(),
        }),
        Some(CaptureSignal::Ended(CaptureExit::Failed))
    );
    assert!(!engine.is_listening());

    engine.start();
    let pass = port.last_pass();
    assert_eq!(
        engine.handle(CaptureEvent::End { pass }),
        Some(CaptureSignal::Ended(CaptureExit::Finished))
    );
    assert!(!engine.is_listening());

    engine.start();
    assert!(engine.stop());
    assert!(!engine.is_listening());
    assert!(!engine.stop());
    assert_eq!(port.0.lock().stops, 1);
}

#[test]
fn stop_keeps_final_and_drops_interim() {
    let (mut engine, port) = capture(true);
    engine.start();
    engine.handle(CaptureEvent::Result {
        pass: port.last_pass(),
        segments: vec![
            RecognitionSegment::final_text("hello"),
            RecognitionSegment::interim(" wor"),
        ],
    });

    engine.stop();
    assert_eq!(engine.interim(), "");
    assert_eq!(engine.take_final().as_deref(), Some("hello"));
    assert_eq!(engine.take_final(), None);
}

#[test]
fn stopped_pass_still_delivers_its_final() {
    let (mut engine, port) = capture(true);
    engine.start();
    let pass = port.last_pass();
    engine.handle(CaptureEvent::Result {
        pass,
        segments: vec![RecognitionSegment::interim("book me a")],
    });

    assert!(engine.stop());
    assert!(!engine.is_listening());
    assert!(engine.is_stopping());

    let signal = engine.handle(CaptureEvent::Result {
        pass,
        segments: vec![
            RecognitionSegment::final_text("book me a demo"),
            RecognitionSegment::interim(" to"),
        ],
    });
    assert_eq!(signal, Some(CaptureSignal::Updated));
    assert_eq!(engine.interim(), "");

    assert_eq!(
        engine.handle(CaptureEvent::End { pass }),
        Some(CaptureSignal::Ended(CaptureExit::Stopped))
    );
    assert!(!engine.is_stopping());
    assert_eq!(engine.take_final().as_deref(), Some("book me a demo"));
}

#[test]
fn reset_forgets_a_stopping_pass() {
    let (mut engine, port) = capture(true);
    engine.start();
    let pass = port.last_pass();
    engine.stop();
    engine.reset();

    assert!(!engine.is_stopping());
    assert_eq!(engine.handle(CaptureEvent::End { pass }), None);
}

#[test]
fn callbacks_from_old_passes_are_ignored() {
    let (mut engine, port) = capture(true);
    engine.start();
    let old = port.last_pass();
    engine.stop();
    engine.start();

    assert_eq!(engine.handle(CaptureEvent::End { pass: old }), None);
    assert_eq!(
        engine.handle(CaptureEvent::Result {
            pass: old,
            segments: vec![RecognitionSegment::final_text("stale")],
        }),
        None
    );
    assert!(engine.is_listening());
    assert_eq!(engine.final_transcript(), "");
}

#[test]
fn refused_start_is_not_listening() {
    let (mut engine, port) = capture(true);
    port.0.lock().fail_start = true;

    assert!(!engine.start());
    assert!(!engine.is_listening());
}

#[test]
fn unsupported_recognition_is_a_no_op() {
    let (mut engine, port) = capture(false);

    assert!(!engine.start());
    assert!(!engine.stop());
    assert!(!engine.is_supported());
    assert!(port.0.lock().starts.is_empty());
    assert_eq!(port.0.lock().stops, 0);
}
