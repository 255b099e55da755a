//! Voice Bridge - voice chat sessions between a visitor and a conversational agent
//!
//! This library provides the voice-chat core of a landing page widget:
//! - Speech capture (interim/final transcripts from a recognition capability)
//! - Speech playback (debounced, stall-recovering, gesture-aware synthesis)
//! - Session transport (JSON frames over a persistent WebSocket)
//! - Conversation coordination (an explicit state machine over all three)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Front end (terminal, widget)            │
//! │   mic tap  │  typed text  │  replay  │  close        │
//! └────────────────────┬────────────────────────────────┘
//!                      │ Event::User
//! ┌────────────────────▼────────────────────────────────┐
//! │              Conversation Coordinator                │
//! │   Capture Engine  │  Playback Engine  │  Transport   │
//! └────────┬───────────────────┬──────────────────┬─────┘
//!          │                   │                  │
//! ┌────────▼───────┐  ┌────────▼───────┐  ┌───────▼──────┐
//! │ Capture port   │  │ Playback port  │  │ Socket port  │
//! │ (mic + STT)    │  │ (TTS + speaker)│  │ (WebSocket)  │
//! └────────────────┘  └────────────────┘  └──────────────┘
//! ```
//!
//! Every platform callback and timer firing is delivered to the coordinator
//! as an [`Event`] over a single channel, so all state changes happen in one
//! transition function.

pub mod attribution;
pub mod capability;
pub mod config;
pub mod conversation;
pub mod error;
pub mod event;
pub mod speech;
pub mod timer;
pub mod transport;
pub mod voice;

pub use attribution::Attribution;
pub use capability::{Capabilities, PlatformSignature};
pub use config::Config;
pub use conversation::{
    Booking, ConversationSettings, Coordinator, Message, Phase, Ports, Role, UserAction,
};
pub use error::{Error, Result};
pub use event::{Event, EventReceiver, EventSender};
pub use speech::{
    CaptureEngine, PlaybackEngine, PlaybackSettings, SpeakOrigin, SpeakOutcome,
    SpeechCapturePort, SpeechPlaybackPort, Voice,
};
pub use transport::{ConnectionState, SessionTransport, SocketPort, WebSocketClient};
