//! Event plumbing between platform callbacks and the coordinator
//!
//! Adapters and timers never touch coordinator state directly. They post an
//! [`Event`] and the coordinator consumes the channel in order.

use tokio::sync::mpsc;

use crate::conversation::UserAction;
use crate::speech::{CaptureEvent, PlaybackEvent};
use crate::transport::SocketEvent;

/// Sending half of the coordinator event channel
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Receiving half of the coordinator event channel
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Create a new coordinator event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Everything the coordinator reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Front-end user action (tap, typed text, close)
    User(UserAction),
    /// Speech recognition callback
    Capture(CaptureEvent),
    /// Speech synthesis callback or playback timer firing
    Playback(PlaybackEvent),
    /// Socket lifecycle or inbound frame
    Socket(SocketEvent),
}

impl From<UserAction> for Event {
    fn from(action: UserAction) -> Self {
        Self::User(action)
    }
}

impl From<CaptureEvent> for Event {
    fn from(event: CaptureEvent) -> Self {
        Self::Capture(event)
    }
}

impl From<PlaybackEvent> for Event {
    fn from(event: PlaybackEvent) -> Self {
        Self::Playback(event)
    }
}

impl From<SocketEvent> for Event {
    fn from(event: SocketEvent) -> Self {
        Self::Socket(event)
    }
}
