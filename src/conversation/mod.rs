//! Conversation coordinator
//!
//! An explicit state machine that owns the capture engine, the playback
//! engine and the session transport. Every input (user action, platform
//! callback, timer firing) arrives as an [`Event`] and is applied by
//! [`Coordinator::handle`], the only place conversation state changes.

mod session;
mod transcript;

pub use session::{Booking, Session};
pub use transcript::{Message, Role, Transcript};

use crate::attribution::Attribution;
use crate::capability::Capabilities;
use crate::event::{Event, EventSender};
use crate::speech::{
    CaptureEngine, CaptureEvent, CaptureExit, CaptureSignal, PlaybackEngine, PlaybackEvent,
    PlaybackSettings, PlaybackSignal, SpeakOrigin, SpeakOutcome, SpeechCapturePort,
    SpeechPlaybackPort,
};
use crate::transport::{
    ConnectionState, InboundFrame, InboundKind, SessionId, SessionTransport, SocketEvent,
    SocketPort, TransportSignal,
};

/// Default agent endpoint
pub const DEFAULT_WS_URL: &str = "wss://api.gentic.pro/ws";

/// Where the conversation is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not open
    Closed,
    /// Opened, waiting for the agent's greeting
    Connecting,
    /// Ready for input
    Idle,
    /// Recognition pass active
    Listening,
    /// User message sent, waiting for the reply
    AwaitingResponse,
    /// Voicing an assistant message
    Speaking,
    /// Transport dropped while open; no reconnect
    Disconnected,
}

/// Front-end input
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    /// Open the conversation with referral attribution
    Open { attribution: Attribution },
    /// Close the conversation
    Close,
    /// Microphone button
    MicTap,
    /// Typed message
    SendText(String),
    /// Replay (or stop) the assistant message at this index
    Replay(usize),
    /// Toggle automatic voicing of responses
    ToggleVoice,
    /// Gesture that unlocks audio playback
    UnlockAudio,
}

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct ConversationSettings {
    /// Agent endpoint
    pub ws_url: String,

    /// Language for both recognition and synthesis
    pub language: String,

    /// Voice responses automatically
    pub voice_enabled: bool,

    /// Playback tunables (its language is replaced by `language`)
    pub playback: PlaybackSettings,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            language: "en-US".to_string(),
            voice_enabled: true,
            playback: PlaybackSettings::default(),
        }
    }
}

/// Platform capabilities handed to the coordinator
pub struct Ports<C, P, S> {
    pub capture: C,
    pub playback: P,
    pub socket: S,
}

/// Drives one conversation
pub struct Coordinator<C, P, S> {
    capabilities: Capabilities,
    phase: Phase,
    capture: CaptureEngine<C>,
    playback: PlaybackEngine<P>,
    transport: SessionTransport<S>,
    session: Session,
    voice_enabled: bool,
    processing: bool,
    playing: Option<usize>,
    queued: Option<usize>,
}

impl<C, P, S> Coordinator<C, P, S>
where
    C: SpeechCapturePort,
    P: SpeechPlaybackPort,
    S: SocketPort,
{
    pub fn new(
        capabilities: Capabilities,
        settings: ConversationSettings,
        ports: Ports<C, P, S>,
        events: EventSender,
    ) -> Self {
        let playback_settings = PlaybackSettings {
            language: settings.language.clone(),
            ..settings.playback
        };

        Self {
            capabilities,
            phase: Phase::Closed,
            capture: CaptureEngine::new(ports.capture, capabilities.stt(), &settings.language),
            playback: PlaybackEngine::new(
                ports.playback,
                events,
                capabilities.tts(),
                capabilities.requires_gesture(),
                playback_settings,
            ),
            transport: SessionTransport::new(ports.socket, settings.ws_url),
            session: Session::default(),
            voice_enabled: settings.voice_enabled,
            processing: false,
            playing: None,
            queued: None,
        }
    }

    /// Apply one event
    pub fn handle(&mut self, event: Event) {
        let before = self.phase;

        match event {
            Event::User(action) => self.on_user(action),
            Event::Capture(event) => self.on_capture(event),
            Event::Playback(event) => self.on_playback(event),
            Event::Socket(event) => self.on_socket(event),
        }

        if self.phase != before {
            tracing::debug!(from = ?before, to = ?self.phase, "phase changed");
        }
    }

    fn on_user(&mut self, action: UserAction) {
        match action {
            UserAction::Open { attribution } => self.open(attribution),
            UserAction::Close => self.close(),
            UserAction::MicTap => self.mic_tap(),
            UserAction::SendText(text) => self.send_text(&text),
            UserAction::Replay(index) => self.replay(index),
            UserAction::ToggleVoice => self.toggle_voice(),
            UserAction::UnlockAudio => self.unlock_audio(),
        }
    }

    fn open(&mut self, attribution: Attribution) {
        match self.phase {
            Phase::Closed => {}
            Phase::Disconnected => self.teardown(),
            _ => {
                tracing::debug!(phase = ?self.phase, "already open");
                return;
            }
        }

        tracing::info!(tags = attribution.len(), "opening conversation");
        self.session = Session::new(attribution.clone());
        self.transport.connect(attribution);
        self.phase = match self.transport.state() {
            ConnectionState::Disconnected => Phase::Disconnected,
            _ => Phase::Connecting,
        };
    }

    fn close(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        self.teardown();
        self.phase = Phase::Closed;
        tracing::info!(messages = self.session.transcript.len(), "conversation closed");
    }

    /// Disconnect transport, stop playback, stop capture, in that order
    fn teardown(&mut self) {
        self.transport.disconnect();
        self.playback.stop_speaking();
        self.capture.stop();
        self.capture.reset();
        self.processing = false;
        self.playing = None;
        self.queued = None;
    }

    fn mic_tap(&mut self) {
        match self.phase {
            Phase::Idle | Phase::Speaking => {
                self.stop_playback();
                if self.capture.start() {
                    self.phase = Phase::Listening;
                }
            }
            Phase::Listening if self.capture.is_stopping() => {
                tracing::debug!("recognition already stopping");
            }
            Phase::Listening => {
                self.capture.stop();
                // Without a final yet, the end callback for this pass submits
                if !self.capture.final_transcript().trim().is_empty() {
                    self.submit_transcript();
                }
            }
            _ => tracing::debug!(phase = ?self.phase, "mic tap ignored"),
        }
    }

    fn send_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !matches!(self.phase, Phase::Idle | Phase::Speaking) {
            tracing::debug!(phase = ?self.phase, "typed message ignored");
            return;
        }

        self.stop_playback();
        self.submit(text);
    }

    fn replay(&mut self, index: usize) {
        if self.phase == Phase::Closed || !self.voice_enabled {
            return;
        }
        let Some(message) = self.session.transcript.get(index) else {
            return;
        };
        if message.role != Role::Assistant {
            return;
        }

        if self.playing == Some(index) && self.playback.is_speaking() {
            self.stop_playback();
            return;
        }

        let text = message.text.clone();
        if self.phase == Phase::Listening {
            self.capture.stop();
            self.capture.reset();
            self.phase = Phase::Idle;
        }

        if self.playback.speak(&text, SpeakOrigin::Gesture) == SpeakOutcome::Scheduled {
            self.queued = None;
            self.playing = Some(index);
            if self.phase == Phase::Idle {
                self.phase = Phase::Speaking;
            }
        }
    }

    fn toggle_voice(&mut self) {
        self.voice_enabled = !self.voice_enabled;
        tracing::info!(enabled = self.voice_enabled, "voice output toggled");
        if !self.voice_enabled {
            self.stop_playback();
        }
    }

    fn unlock_audio(&mut self) {
        if self.playback.unlock() {
            self.playing = self.queued.take();
            if self.phase == Phase::Idle {
                self.phase = Phase::Speaking;
            }
        }
    }

    fn on_capture(&mut self, event: CaptureEvent) {
        match self.capture.handle(event) {
            Some(CaptureSignal::Ended(exit)) if self.phase == Phase::Listening => match exit {
                CaptureExit::Finished | CaptureExit::Stopped => self.submit_transcript(),
                CaptureExit::Failed => {
                    self.capture.reset();
                    self.phase = Phase::Idle;
                }
            },
            _ => {}
        }
    }

    fn on_playback(&mut self, event: PlaybackEvent) {
        if let Some(PlaybackSignal::Finished) = self.playback.handle(event) {
            self.playing = None;
            if self.phase == Phase::Speaking {
                self.phase = Phase::Idle;
            }
        }
    }

    fn on_socket(&mut self, event: SocketEvent) {
        match self.transport.handle(event) {
            Some(TransportSignal::Connected) => {
                tracing::info!(
                    session = %self.transport.session_id().map_or("", SessionId::as_str),
                    "session started"
                );
            }
            Some(TransportSignal::Response(frame)) => self.on_response(frame),
            Some(TransportSignal::Disconnected) => self.on_disconnected(),
            None => {}
        }
    }

    fn on_response(&mut self, frame: InboundFrame) {
        if matches!(self.phase, Phase::Closed | Phase::Disconnected) {
            return;
        }
        if frame.kind == InboundKind::Error {
            tracing::warn!(text = %frame.text, "agent reported an error");
        }
        if let Some(booking) = Booking::from_frame(&frame) {
            tracing::info!(
                time = booking.appointment_time.as_deref().unwrap_or("unspecified"),
                "appointment booked"
            );
            self.session.booking = Some(booking);
        }

        let index = self
            .session
            .transcript
            .push(Message::assistant(frame.text.as_str()));
        self.processing = false;

        if self.phase == Phase::Listening {
            return;
        }

        self.phase = Phase::Idle;
        if !self.voice_enabled {
            return;
        }
        match self.playback.speak(&frame.text, SpeakOrigin::Programmatic) {
            SpeakOutcome::Scheduled => {
                self.queued = None;
                self.playing = Some(index);
                self.phase = Phase::Speaking;
            }
            SpeakOutcome::Queued => self.queued = Some(index),
            SpeakOutcome::Ignored => {}
        }
    }

    fn on_disconnected(&mut self) {
        self.processing = false;
        if self.phase == Phase::Closed {
            return;
        }
        if self.capture.is_listening() {
            self.capture.stop();
        }
        self.capture.reset();
        self.phase = Phase::Disconnected;
        tracing::warn!("conversation disconnected");
    }

    fn submit_transcript(&mut self) {
        match self.capture.take_final() {
            Some(text) => self.submit(&text),
            None => self.phase = Phase::Idle,
        }
        self.capture.reset();
    }

    fn submit(&mut self, text: &str) {
        if !self.transport.send_message(text) {
            tracing::warn!("message not sent, session not connected");
            self.phase = Phase::Idle;
            return;
        }
        self.session.transcript.push(Message::user(text));
        self.processing = true;
        self.phase = Phase::AwaitingResponse;
    }

    fn stop_playback(&mut self) {
        self.playback.stop_speaking();
        self.playing = None;
        self.queued = None;
        if self.phase == Phase::Speaking {
            self.phase = Phase::Idle;
        }
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.session.transcript.messages()
    }

    /// Booking confirmed during this session
    #[must_use]
    pub const fn booking(&self) -> Option<&Booking> {
        self.session.booking.as_ref()
    }

    #[must_use]
    pub const fn attribution(&self) -> &Attribution {
        &self.session.attribution
    }

    /// Partial transcript of the active recognition pass
    #[must_use]
    pub fn interim_transcript(&self) -> &str {
        self.capture.interim()
    }

    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.capture.is_listening()
    }

    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.playback.is_speaking()
    }

    /// A user message is waiting for its reply
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        self.processing
    }

    #[must_use]
    pub const fn voice_enabled(&self) -> bool {
        self.voice_enabled
    }

    /// Index of the message being voiced
    #[must_use]
    pub const fn playing_index(&self) -> Option<usize> {
        self.playing
    }

    /// Playback is held until the user performs the unlock gesture
    #[must_use]
    pub const fn needs_unlock(&self) -> bool {
        self.playback.is_supported() && !self.playback.can_autoplay()
    }

    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    #[must_use]
    pub const fn connection_state(&self) -> ConnectionState {
        self.transport.state()
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.transport.session_id()
    }
}
