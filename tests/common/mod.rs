//! Shared test utilities: recording fakes for every port and a coordinator
//! harness driven on tokio's paused clock

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use voice_bridge::event::{self, EventReceiver, EventSender};
use voice_bridge::speech::{PassId, UtteranceRequest};
use voice_bridge::transport::{ConnectionId, SocketEvent};
use voice_bridge::{
    Attribution, Capabilities, ConversationSettings, Coordinator, Error, Event, Ports, Result,
    SocketPort, SpeechCapturePort, SpeechPlaybackPort, UserAction, Voice,
};

/// Shared, inspectable log behind a fake port
#[derive(Debug, Default)]
pub struct Shared<T>(Arc<Mutex<T>>);

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Shared<T> {
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock().expect("fake log poisoned")
    }
}

#[derive(Debug, Default)]
pub struct CaptureLog {
    pub starts: Vec<(PassId, String)>,
    pub stops: usize,
    pub fail_start: bool,
}

/// Recording [`SpeechCapturePort`]
#[derive(Debug, Clone, Default)]
pub struct FakeCapture(pub Shared<CaptureLog>);

impl FakeCapture {
    pub fn last_pass(&self) -> PassId {
        self.0.lock().starts.last().expect("no pass started").0
    }
}

impl SpeechCapturePort for FakeCapture {
    fn start(&mut self, pass: PassId, language: &str) -> Result<()> {
        let mut log = self.0.lock();
        if log.fail_start {
            return Err(Error::Stt("not allowed".to_string()));
        }
        log.starts.push((pass, language.to_string()));
        Ok(())
    }

    fn stop(&mut self) {
        self.0.lock().stops += 1;
    }
}

#[derive(Debug, Default)]
pub struct PlaybackLog {
    pub requests: Vec<UtteranceRequest>,
    pub cancels: usize,
    pub resumes: usize,
    pub voices: Vec<Voice>,
    pub speaking: bool,
    pub pending: bool,
    pub paused: bool,
}

/// Recording [`SpeechPlaybackPort`]
#[derive(Debug, Clone, Default)]
pub struct FakePlayback(pub Shared<PlaybackLog>);

impl FakePlayback {
    /// Audible requests (the silent unlock primer excluded)
    pub fn spoken(&self) -> Vec<UtteranceRequest> {
        self.0
            .lock()
            .requests
            .iter()
            .filter(|r| r.volume > 0.0)
            .cloned()
            .collect()
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.spoken().into_iter().map(|r| r.text).collect()
    }

    pub fn last_spoken(&self) -> UtteranceRequest {
        self.spoken().pop().expect("nothing spoken")
    }
}

impl SpeechPlaybackPort for FakePlayback {
    fn voices(&self) -> Vec<Voice> {
        self.0.lock().voices.clone()
    }

    fn speak(&mut self, request: UtteranceRequest) -> Result<()> {
        let mut log = self.0.lock();
        if request.volume > 0.0 {
            log.pending = true;
        }
        log.requests.push(request);
        Ok(())
    }

    fn cancel(&mut self) {
        let mut log = self.0.lock();
        log.cancels += 1;
        log.speaking = false;
        log.pending = false;
        log.paused = false;
    }

    fn is_speaking(&self) -> bool {
        self.0.lock().speaking
    }

    fn is_pending(&self) -> bool {
        self.0.lock().pending
    }

    fn is_paused(&self) -> bool {
        self.0.lock().paused
    }

    fn resume(&mut self) {
        let mut log = self.0.lock();
        log.resumes += 1;
        log.paused = false;
    }
}

#[derive(Debug, Default)]
pub struct SocketLog {
    pub opens: Vec<(ConnectionId, String)>,
    pub sent: Vec<String>,
    pub closes: usize,
    pub fail_open: bool,
}

/// Recording [`SocketPort`]
#[derive(Debug, Clone, Default)]
pub struct FakeSocket(pub Shared<SocketLog>);

impl FakeSocket {
    pub fn last_conn(&self) -> ConnectionId {
        self.0.lock().opens.last().expect("socket never opened").0
    }

    pub fn frames(&self) -> Vec<serde_json::Value> {
        self.0
            .lock()
            .sent
            .iter()
            .map(|s| serde_json::from_str(s).expect("sent frame is json"))
            .collect()
    }

    pub fn frames_of(&self, kind: &str) -> Vec<serde_json::Value> {
        self.frames()
            .into_iter()
            .filter(|f| f["type"] == kind)
            .collect()
    }
}

impl SocketPort for FakeSocket {
    fn open(&mut self, conn: ConnectionId, url: &str) -> Result<()> {
        let mut log = self.0.lock();
        if log.fail_open {
            return Err(Error::Transport("refused".to_string()));
        }
        log.opens.push((conn, url.to_string()));
        Ok(())
    }

    fn send(&mut self, text: String) -> Result<()> {
        self.0.lock().sent.push(text);
        Ok(())
    }

    fn close(&mut self) {
        self.0.lock().closes += 1;
    }
}

/// Let spawned timer tasks run after the paused clock moves
pub async fn yield_many() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Coordinator wired to fakes
pub struct Harness {
    pub coordinator: Coordinator<FakeCapture, FakePlayback, FakeSocket>,
    pub capture: FakeCapture,
    pub playback: FakePlayback,
    pub socket: FakeSocket,
    pub tx: EventSender,
    rx: EventReceiver,
}

impl Harness {
    pub fn new(capabilities: Capabilities) -> Self {
        Self::with_settings(capabilities, ConversationSettings::default())
    }

    pub fn with_settings(capabilities: Capabilities, settings: ConversationSettings) -> Self {
        let (tx, rx) = event::channel();
        let capture = FakeCapture::default();
        let playback = FakePlayback::default();
        let socket = FakeSocket::default();

        let coordinator = Coordinator::new(
            capabilities,
            settings,
            Ports {
                capture: capture.clone(),
                playback: playback.clone(),
                socket: socket.clone(),
            },
            tx.clone(),
        );

        Self {
            coordinator,
            capture,
            playback,
            socket,
            tx,
            rx,
        }
    }

    /// Apply one event directly
    pub fn handle(&mut self, event: impl Into<Event>) {
        self.coordinator.handle(event.into());
    }

    pub fn act(&mut self, action: UserAction) {
        self.handle(action);
    }

    /// Apply everything queued on the channel
    pub fn pump(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.coordinator.handle(event);
        }
    }

    /// Advance the paused clock, then apply whatever the timers posted
    pub async fn advance(&mut self, by: Duration) {
        tokio::time::sleep(by).await;
        yield_many().await;
        self.pump();
    }

    /// Let the playback debounce elapse
    pub async fn settle(&mut self) {
        self.advance(Duration::from_millis(100)).await;
    }

    /// Open the conversation and complete the socket handshake
    pub fn open_connected(&mut self, attribution: Attribution) {
        self.act(UserAction::Open { attribution });
        let conn = self.socket.last_conn();
        self.handle(SocketEvent::Opened(conn));
    }

    /// Deliver an inbound frame on the current connection
    pub fn receive(&mut self, frame: &str) {
        let conn = self.socket.last_conn();
        self.handle(SocketEvent::Message {
            conn,
            text: frame.to_string(),
        });
    }

    pub fn greet(&mut self, text: &str) {
        self.receive(&format!(r#"{{"type":"greeting","text":"{text}"}}"#));
    }

    pub fn respond(&mut self, text: &str) {
        self.receive(&format!(r#"{{"type":"response","text":"{text}"}}"#));
    }

    /// Whether nothing is waiting on the channel
    pub fn is_quiet(&mut self) -> bool {
        self.rx.try_recv().is_err()
    }
}

/// Capabilities of a desktop host with both speech directions
pub const fn full() -> Capabilities {
    Capabilities::new(true, true, false)
}

/// Capabilities of an iOS-like host
pub const fn gesture_gated() -> Capabilities {
    Capabilities::new(true, true, true)
}

/// Capabilities of a host without speech
pub const fn text_only() -> Capabilities {
    Capabilities::new(false, false, false)
}

/// Capabilities of a host that can only listen
pub const fn stt_only() -> Capabilities {
    Capabilities::new(true, false, false)
}

/// Capabilities of a host that can only speak
pub const fn tts_only() -> Capabilities {
    Capabilities::new(false, true, false)
}
