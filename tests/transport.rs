//! Session transport tests

mod common;

use common::FakeSocket;
use voice_bridge::transport::{
    ConnectionState, InboundKind, SessionTransport, SocketEvent, TransportSignal,
};
use voice_bridge::Attribution;

fn transport() -> (SessionTransport<FakeSocket>, FakeSocket) {
    let socket = FakeSocket::default();
    (
        SessionTransport::new(socket.clone(), "ws://localhost:9000/ws"),
        socket,
    )
}

fn connected() -> (SessionTransport<FakeSocket>, FakeSocket) {
    let (mut t, socket) = transport();
    t.connect(Attribution::default());
    let signal = t.handle(SocketEvent::Opened(socket.last_conn()));
    assert_eq!(signal, Some(TransportSignal::Connected));
    (t, socket)
}

#[test]
fn connect_opens_once() {
    let (mut t, socket) = transport();

    t.connect(Attribution::default());
    assert_eq!(t.state(), ConnectionState::Connecting);
    t.connect(Attribution::default());

    let log = socket.0.lock();
    assert_eq!(log.opens.len(), 1);
    assert_eq!(log.opens[0].1, "ws://localhost:9000/ws");
}

#[test]
fn start_frame_sent_on_open() {
    let (mut t, socket) = transport();
    t.connect(Attribution::from_query("utm_medium=email&utm_term=&ref=abc"));
    assert!(socket.frames().is_empty(), "nothing sent before open");

    t.handle(SocketEvent::Opened(socket.last_conn()));
    assert!(t.is_connected());

    let frames = socket.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "start");
    assert_eq!(frames[0]["sessionId"], t.session_id().unwrap().as_str());
    assert_eq!(frames[0]["utm_medium"], "email");
    assert!(frames[0].get("utm_term").is_none());
    assert!(frames[0].get("ref").is_none());
}

#[test]
fn message_requires_connection() {
    let (mut t, socket) = transport();
    assert!(!t.send_message("hello"));

    t.connect(Attribution::default());
    assert!(!t.send_message("hello"));
    assert!(socket.frames().is_empty());

    t.handle(SocketEvent::Opened(socket.last_conn()));
    assert!(t.send_message("hello"));

    let messages = socket.frames_of("message");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], "hello");
}

#[test]
fn disconnect_twice_sends_one_end_frame() {
    let (mut t, socket) = connected();
    let session = t.session_id().unwrap().to_string();

    t.disconnect();
    t.disconnect();

    let ends = socket.frames_of("end");
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0]["sessionId"], session.as_str());
    assert_eq!(socket.0.lock().closes, 1);
    assert_eq!(t.state(), ConnectionState::Disconnected);
    assert!(t.session_id().is_none());
}

#[test]
fn reconnect_uses_a_fresh_session() {
    let (mut t, socket) = connected();
    let first = t.session_id().unwrap().clone();
    t.disconnect();

    t.connect(Attribution::default());
    t.handle(SocketEvent::Opened(socket.last_conn()));

    assert_ne!(t.session_id().unwrap(), &first);
    assert_eq!(socket.frames_of("start").len(), 2);
}

#[test]
fn inbound_frames_are_parsed_individually() {
    let (mut t, socket) = connected();
    let conn = socket.last_conn();

    let bad = t.handle(SocketEvent::Message {
        conn,
        text: "{oops".to_string(),
    });
    assert_eq!(bad, None);

    let good = t.handle(SocketEvent::Message {
        conn,
        text: r#"{"type":"response","text":"Hi","metadata":{"tierMatch":"starter"}}"#.to_string(),
    });
    let Some(TransportSignal::Response(frame)) = good else {
        panic!("expected a response, got {good:?}");
    };
    assert_eq!(frame.kind, InboundKind::Response);
    assert_eq!(frame.text, "Hi");
    assert!(t.is_connected());
}

#[test]
fn abnormal_close_disconnects_without_retry() {
    let (mut t, socket) = connected();

    let signal = t.handle(SocketEvent::Failed {
        conn: socket.last_conn(),
        reason: "1006".to_string(),
    });

    assert_eq!(signal, Some(TransportSignal::Disconnected));
    assert_eq!(t.state(), ConnectionState::Disconnected);
    assert_eq!(socket.0.lock().opens.len(), 1);

    // Nothing left to end
    t.disconnect();
    assert!(socket.frames_of("end").is_empty());
}

#[test]
fn stale_connection_events_are_ignored() {
    let (mut t, socket) = connected();
    let old = socket.last_conn();
    t.disconnect();
    t.connect(Attribution::default());

    assert_eq!(t.handle(SocketEvent::Opened(old)), None);
    assert_eq!(t.handle(SocketEvent::Closed(old)), None);
    assert_eq!(t.state(), ConnectionState::Connecting);
}

#[test]
fn open_failure_stays_disconnected() {
    let (mut t, socket) = transport();
    socket.0.lock().fail_open = true;

    t.connect(Attribution::default());
    assert_eq!(t.state(), ConnectionState::Disconnected);
    assert!(t.session_id().is_none());

    socket.0.lock().fail_open = false;
    t.connect(Attribution::default());
    assert_eq!(t.state(), ConnectionState::Connecting);
}
