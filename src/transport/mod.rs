//! Session transport
//!
//! Owns one persistent socket per conversation and speaks the JSON frame
//! protocol described in [`protocol`]. Socket callbacks arrive as
//! [`SocketEvent`]s and are filtered by connection id, so a late callback
//! from a torn-down socket never touches a newer session.

pub mod protocol;
mod session;
mod socket;
mod websocket;

pub use protocol::{InboundFrame, InboundKind, OutboundFrame, ResponseMetadata};
pub use session::SessionId;
pub use socket::{ConnectionId, SocketEvent, SocketPort};
pub use websocket::WebSocketClient;

use crate::attribution::Attribution;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What a socket callback meant for the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// Socket open and start frame sent
    Connected,
    /// A well-formed inbound frame
    Response(InboundFrame),
    /// Socket closed or failed; no retry is attempted
    Disconnected,
}

struct Connection {
    id: ConnectionId,
    session: SessionId,
    attribution: Attribution,
}

/// One conversation session over a [`SocketPort`]
pub struct SessionTransport<S> {
    socket: S,
    url: String,
    state: ConnectionState,
    next_conn: u64,
    connection: Option<Connection>,
}

impl<S: SocketPort> SessionTransport<S> {
    pub fn new(socket: S, url: impl Into<String>) -> Self {
        Self {
            socket,
            url: url.into(),
            state: ConnectionState::Disconnected,
            next_conn: 0,
            connection: None,
        }
    }

    /// Open a new session
    ///
    /// No-op while a connection is open or opening. The start frame carrying
    /// `attribution` is sent once the socket reports open.
    pub fn connect(&mut self, attribution: Attribution) {
        if self.state != ConnectionState::Disconnected {
            tracing::debug!(state = ?self.state, "connect ignored");
            return;
        }

        self.next_conn += 1;
        let id = ConnectionId(self.next_conn);
        let session = SessionId::generate();

        if let Err(e) = self.socket.open(id, &self.url) {
            tracing::warn!(error = %e, url = %self.url, "failed to open session socket");
            return;
        }

        tracing::info!(conn = %id, session = %session, "connecting");
        self.state = ConnectionState::Connecting;
        self.connection = Some(Connection {
            id,
            session,
            attribution,
        });
    }

    /// Send one user message
    ///
    /// Returns false (and sends nothing) unless connected.
    pub fn send_message(&mut self, text: &str) -> bool {
        if self.state != ConnectionState::Connected {
            tracing::debug!(state = ?self.state, "message dropped, not connected");
            return false;
        }
        let Some(connection) = &self.connection else {
            return false;
        };

        let frame = OutboundFrame::Message {
            text: text.to_string(),
            session_id: connection.session.to_string(),
        };
        self.send_frame(&frame)
    }

    /// End the session and close the socket
    ///
    /// The end frame is only sent when connected. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        if self.state == ConnectionState::Connected {
            let frame = OutboundFrame::End {
                session_id: connection.session.to_string(),
            };
            self.send_frame(&frame);
        }

        self.socket.close();
        self.state = ConnectionState::Disconnected;
        tracing::info!(session = %connection.session, "session ended");
    }

    /// Apply a socket callback
    pub fn handle(&mut self, event: SocketEvent) -> Option<TransportSignal> {
        let conn = match &event {
            SocketEvent::Opened(conn) | SocketEvent::Closed(conn) => *conn,
            SocketEvent::Message { conn, .. } | SocketEvent::Failed { conn, .. } => *conn,
        };
        if self.connection.as_ref().map(|c| c.id) != Some(conn) {
            tracing::trace!(%conn, "ignoring callback from stale connection");
            return None;
        }

        match event {
            SocketEvent::Opened(_) => self.on_open(),
            SocketEvent::Message { text, .. } => {
                InboundFrame::parse(&text).map(TransportSignal::Response)
            }
            SocketEvent::Closed(_) => {
                tracing::info!(%conn, "session socket closed");
                self.drop_connection()
            }
            SocketEvent::Failed { reason, .. } => {
                tracing::warn!(%conn, reason = %reason, "session socket failed");
                self.drop_connection()
            }
        }
    }

    fn on_open(&mut self) -> Option<TransportSignal> {
        if self.state != ConnectionState::Connecting {
            return None;
        }
        let connection = self.connection.as_ref()?;

        let frame = OutboundFrame::Start {
            session_id: connection.session.to_string(),
            attribution: connection.attribution.clone(),
        };
        self.state = ConnectionState::Connected;
        self.send_frame(&frame);
        Some(TransportSignal::Connected)
    }

    fn drop_connection(&mut self) -> Option<TransportSignal> {
        self.connection = None;
        self.state = ConnectionState::Disconnected;
        Some(TransportSignal::Disconnected)
    }

    fn send_frame(&mut self, frame: &OutboundFrame) -> bool {
        let sent = frame.to_json().and_then(|json| self.socket.send(json));
        if let Err(e) = sent {
            tracing::warn!(error = %e, "failed to send frame");
            return false;
        }
        true
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Identifier of the current session, if any
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.connection.as_ref().map(|c| &c.session)
    }

    /// Endpoint this transport connects to
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}
