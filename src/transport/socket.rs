//! Socket capability used by the session transport

use std::fmt;

use crate::Result;

/// Identifies one socket connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Socket callback, tagged with the connection it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Connection established
    Opened(ConnectionId),
    /// Text frame received
    Message { conn: ConnectionId, text: String },
    /// Connection closed (by either side)
    Closed(ConnectionId),
    /// Connection failed to open or broke
    Failed { conn: ConnectionId, reason: String },
}

/// A bidirectional text socket
///
/// Implementations report open, inbound text, close and failure by posting
/// [`SocketEvent`]s tagged with the connection id passed to `open`.
pub trait SocketPort {
    /// Begin opening a connection to `url`
    ///
    /// # Errors
    ///
    /// Returns error if the connection cannot even be attempted
    fn open(&mut self, conn: ConnectionId, url: &str) -> Result<()>;

    /// Send a text frame on the open connection
    ///
    /// # Errors
    ///
    /// Returns error if no connection is open
    fn send(&mut self, text: String) -> Result<()>;

    /// Close the connection
    fn close(&mut self);
}

impl<T: SocketPort + ?Sized> SocketPort for Box<T> {
    fn open(&mut self, conn: ConnectionId, url: &str) -> Result<()> {
        (**self).open(conn, url)
    }

    fn send(&mut self, text: String) -> Result<()> {
        (**self).send(text)
    }

    fn close(&mut self) {
        (**self).close();
    }
}
