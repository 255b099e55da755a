//! WebSocket socket adapter
//!
//! Runs one tokio task per connection. The task owns the stream, forwards
//! queued outbound frames and posts every callback to the coordinator.

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use super::socket::{ConnectionId, SocketEvent, SocketPort};
use crate::event::EventSender;
use crate::{Error, Result};

enum Outgoing {
    Text(String),
    Close,
}

/// [`SocketPort`] backed by `tokio-tungstenite`
pub struct WebSocketClient {
    events: EventSender,
    outgoing: Option<mpsc::UnboundedSender<Outgoing>>,
    task: Option<JoinHandle<()>>,
}

impl WebSocketClient {
    /// Create a client that reports to `events`
    #[must_use]
    pub const fn new(events: EventSender) -> Self {
        Self {
            events,
            outgoing: None,
            task: None,
        }
    }

    fn abort(&mut self) {
        self.outgoing = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl SocketPort for WebSocketClient {
    fn open(&mut self, conn: ConnectionId, url: &str) -> Result<()> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::Transport(format!("invalid url {url}: {e}")))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(Error::Transport(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        self.abort();

        let (tx, rx) = mpsc::unbounded_channel();
        self.outgoing = Some(tx);
        self.task = Some(tokio::spawn(run_connection(
            conn,
            parsed.to_string(),
            rx,
            self.events.clone(),
        )));

        tracing::info!(%conn, url = %parsed, "opening websocket");
        Ok(())
    }

    fn send(&mut self, text: String) -> Result<()> {
        let outgoing = self
            .outgoing
            .as_ref()
            .ok_or_else(|| Error::Transport("socket not open".to_string()))?;
        outgoing
            .send(Outgoing::Text(text))
            .map_err(|_| Error::Transport("socket task has exited".to_string()))
    }

    fn close(&mut self) {
        if let Some(outgoing) = self.outgoing.take() {
            // The task finishes the close handshake and exits on its own
            let _ = outgoing.send(Outgoing::Close);
            self.task = None;
        }
    }
}

impl Drop for WebSocketClient {
    fn drop(&mut self) {
        self.abort();
    }
}

async fn run_connection(
    conn: ConnectionId,
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: EventSender,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            tracing::warn!(%conn, error = %e, "websocket connect failed");
            let _ = events.send(
                SocketEvent::Failed {
                    conn,
                    reason: e.to_string(),
                }
                .into(),
            );
            return;
        }
    };

    if events.send(SocketEvent::Opened(conn).into()).is_err() {
        return;
    }

    let (mut write, mut read) = stream.split();

    let closing = loop {
        tokio::select! {
            frame = outgoing.recv() => match frame {
                Some(Outgoing::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        break Some(e.to_string());
                    }
                }
                Some(Outgoing::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    break None;
                }
            },
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if events.send(SocketEvent::Message { conn, text }.into()).is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!(%conn, "websocket closed by server");
                    break None;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break Some(e.to_string()),
            },
        }
    };

    let event = match closing {
        Some(reason) => {
            tracing::warn!(%conn, reason = %reason, "websocket error");
            SocketEvent::Failed { conn, reason }
        }
        None => SocketEvent::Closed(conn),
    };
    let _ = events.send(event.into());
}
