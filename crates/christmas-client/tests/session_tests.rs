//! Session integration tests
//!
//! Drives a session against an in-process server peer.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;

use christmas_client::protocol::{
    AuthenticateResponse, CanvasInfo, ClientMessage, Color, GetLedsResponse, ProtocolError,
    ServerMessage, ServerMessageKind, SetLedsRequest,
};
use christmas_client::transport::{MemoryListener, MemoryPeer, MemoryTransport};
use christmas_client::{EventKind, Session, SessionError, SessionState, TransportError};
use christmas_core::traits::OutboundFrame;

const SECRET: &str = "let-it-snow";

fn auth_reply(success: bool) -> ServerMessage {
    ServerMessage::Authenticate(AuthenticateResponse { success })
}

fn leds_reply(leds: &[u32]) -> ServerMessage {
    ServerMessage::GetLeds(GetLedsResponse {
        leds: leds.iter().copied().map(Color::new).collect(),
    })
}

fn new_session() -> (Session, MemoryListener) {
    let (transport, listener) = MemoryTransport::pair();
    (
        Session::with_transport("tree.local:8080", Arc::new(transport)),
        listener,
    )
}

/// Bound every wait so a broken session fails the test instead of hanging it
async fn within<F: std::future::Future>(future: F) -> F::Output {
    timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

/// Accept one connection, expect the handshake and accept it
async fn accept_and_authenticate(mut listener: MemoryListener) -> (MemoryPeer, MemoryListener) {
    let mut peer = listener.accept().await.expect("no connection");
    peer.open();
    let hello = peer.recv().await.expect("no handshake");
    assert_eq!(hello, ClientMessage::authenticate(SECRET));
    peer.send(&auth_reply(true)).unwrap();
    (peer, listener)
}

async fn connected() -> (Session, MemoryPeer, MemoryListener) {
    let (session, listener) = new_session();
    let server = tokio::spawn(accept_and_authenticate(listener));
    within(session.connect(SECRET)).await.unwrap();
    let (peer, listener) = server.await.unwrap();
    (session, peer, listener)
}

#[tokio::test]
async fn test_handshake_is_first_message() {
    let (session, mut peer, _listener) = connected().await;

    assert_eq!(peer.url(), "ws://tree.local:8080/ws");
    assert_eq!(session.url(), "ws://tree.local:8080/ws");
    assert_eq!(session.state(), SessionState::Authenticated);
    assert!(session.is_connected());
    assert!(peer.try_recv_frame().is_none());
}

#[tokio::test]
async fn test_reply_sent_before_request_is_not_lost() {
    let (session, mut listener) = new_session();

    let server = tokio::spawn(async move {
        let mut peer = listener.accept().await.unwrap();
        // Reply goes out before the client has even written its handshake
        peer.open();
        peer.send(&auth_reply(true)).unwrap();
        let hello = peer.recv().await;
        (peer, hello)
    });

    within(session.connect(SECRET)).await.unwrap();
    let (_peer, hello) = server.await.unwrap();
    assert_eq!(hello, Some(ClientMessage::authenticate(SECRET)));
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_rejected_secret_closes_without_further_sends() {
    let (session, mut listener) = new_session();

    let server = tokio::spawn(async move {
        let mut peer = listener.accept().await.unwrap();
        peer.open();
        peer.recv().await.unwrap();
        peer.send(&auth_reply(false)).unwrap();
        peer
    });

    let result = within(session.connect("wrong")).await;
    assert!(matches!(result, Err(SessionError::AuthenticationFailed(_))));
    assert_eq!(session.state(), SessionState::Closed);

    let mut peer = server.await.unwrap();
    assert_eq!(peer.recv_frame().await, Some(OutboundFrame::Close(1001)));
    assert_eq!(peer.recv_frame().await, None);
}

#[tokio::test]
async fn test_server_error_during_handshake() {
    let (session, mut listener) = new_session();

    tokio::spawn(async move {
        let mut peer = listener.accept().await.unwrap();
        peer.open();
        peer.recv().await.unwrap();
        peer.send(&ServerMessage::Error {
            message: "invalid secret".to_string(),
        })
        .unwrap();
        peer.close(1008, "policy violation");
    });

    match within(session.connect("wrong")).await {
        Err(SessionError::AuthenticationFailed(message)) => {
            assert_eq!(message, "invalid secret")
        }
        other => panic!("expected authentication failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_close_before_handshake_reply() {
    let (session, mut listener) = new_session();

    tokio::spawn(async move {
        let mut peer = listener.accept().await.unwrap();
        peer.open();
        peer.recv().await.unwrap();
        peer.close(4000, "maintenance");
    });

    let result = within(session.connect(SECRET)).await;
    match result {
        Err(SessionError::Transport(TransportError::Closed { code, reason })) => {
            assert_eq!(code, 4000);
            assert_eq!(reason, "maintenance");
        }
        other => panic!("expected closed transport, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_unreachable_server() {
    let (session, listener) = new_session();
    drop(listener);

    match within(session.connect(SECRET)).await {
        Err(SessionError::Transport(TransportError::ConnectionFailed(error))) => {
            assert!(error.contains("server unreachable"), "{}", error)
        }
        other => panic!("expected connection failure, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_connect_twice_is_rejected() {
    let (session, _peer, _listener) = connected().await;

    let result = session.connect(SECRET).await;
    assert!(matches!(result, Err(SessionError::AlreadyConnected)));
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_connect_while_connecting_is_rejected() {
    let (session, mut listener) = new_session();

    let first = session.connect(SECRET);
    tokio::pin!(first);
    assert!(futures::poll!(&mut first).is_pending());
    assert_eq!(session.state(), SessionState::Connecting);

    // The transport has not opened yet
    let second = session.connect(SECRET).await;
    assert!(matches!(second, Err(SessionError::AlreadyConnected)));
    assert_eq!(session.state(), SessionState::Connecting);

    let server = async {
        let mut peer = listener.accept().await.unwrap();
        peer.open();
        assert_eq!(peer.recv().await, Some(ClientMessage::authenticate(SECRET)));
        peer.send(&auth_reply(true)).unwrap();
        peer
    };
    let (result, mut peer) = within(async { tokio::join!(first, server) }).await;

    result.unwrap();
    assert!(session.is_connected());
    assert!(peer.try_recv_frame().is_none());
}

#[tokio::test]
async fn test_shutdown_waits_for_the_transport() {
    let (session, mut peer, _listener) = connected().await;
    session.set_leds(vec![Color::WHITE]).unwrap();

    let shutdown = session.shutdown(true);
    tokio::pin!(shutdown);
    assert!(futures::poll!(&mut shutdown).is_pending());
    assert_eq!(session.state(), SessionState::Closed);

    assert!(matches!(peer.recv().await, Some(ClientMessage::SetLeds(_))));
    assert_eq!(peer.recv_frame().await, Some(OutboundFrame::Close(1000)));
    assert!(futures::poll!(&mut shutdown).is_pending());

    peer.close(1000, "");
    within(shutdown).await;

    // Nothing left to wait for
    within(session.shutdown(true)).await;
}

#[tokio::test]
async fn test_listener_may_read_state_while_connecting() {
    let (transport, listener) = MemoryTransport::pair();
    let session = Arc::new(Session::with_transport(
        "tree.local:8080",
        Arc::new(transport),
    ));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let weak = Arc::downgrade(&session);
    let _subscription = session.subscribe(&[EventKind::Open], move |_| {
        if let Some(session) = weak.upgrade() {
            seen_clone.lock().unwrap().push(session.state());
        }
        ControlFlow::Continue(())
    });

    let server = tokio::spawn(accept_and_authenticate(listener));
    within(session.connect(SECRET)).await.unwrap();
    let _peer = server.await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![SessionState::Open]);
}

#[tokio::test]
async fn test_send_without_connection() {
    let (session, _listener) = new_session();
    assert_eq!(session.state(), SessionState::Disconnected);

    let result = session.set_leds(vec![Color::WHITE]);
    assert!(matches!(result, Err(SessionError::NotConnected)));
}

#[tokio::test]
async fn test_every_waiter_sees_the_message() {
    let (session, peer, _listener) = connected().await;

    let first = session.next_message(None);
    let second = session.next_message(None);
    let mut stream = session.messages();

    peer.send(&leds_reply(&[0x112233])).unwrap();

    let expected = leds_reply(&[0x112233]);
    assert_eq!(within(first).await.unwrap(), expected);
    assert_eq!(within(second).await.unwrap(), expected);
    assert_eq!(within(stream.next()).await.unwrap().unwrap(), expected);
}

#[tokio::test]
async fn test_filtered_wait_skips_other_kinds() {
    let (session, peer, _listener) = connected().await;

    let leds = session.next_message(Some(ServerMessageKind::GetLeds));
    let any = session.next_message(None);

    peer.send(&ServerMessage::GetLedCanvasInfo(CanvasInfo::new(4, 2)))
        .unwrap();
    peer.send(&leds_reply(&[0xff0000])).unwrap();

    assert_eq!(
        within(any).await.unwrap(),
        ServerMessage::GetLedCanvasInfo(CanvasInfo::new(4, 2))
    );
    assert_eq!(within(leds).await.unwrap(), leds_reply(&[0xff0000]));
}

#[tokio::test]
async fn test_close_fails_pending_waiters() {
    let (session, mut peer, _listener) = connected().await;

    let waiters: Vec<_> = (0..3).map(|_| session.next_message(None)).collect();
    let mut stream = session.messages();

    session.close(true);

    for waiter in waiters {
        assert!(matches!(within(waiter).await, Err(SessionError::Closed)));
    }
    assert!(matches!(
        within(stream.next()).await,
        Some(Err(SessionError::Closed))
    ));
    assert!(within(stream.next()).await.is_none());

    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(peer.recv_frame().await, Some(OutboundFrame::Close(1000)));
}

#[tokio::test]
async fn test_server_close_fails_pending_waiters() {
    let (session, peer, _listener) = connected().await;

    let waiter = session.next_message(None);
    peer.close(1001, "shutting down");

    assert!(matches!(within(waiter).await, Err(SessionError::Closed)));
    assert_eq!(session.state(), SessionState::Closed);

    let close = session.last_close().unwrap();
    assert_eq!(close.code, 1001);
    assert_eq!(close.reason, "shutting down");
}

#[tokio::test]
async fn test_peer_dropped_is_abnormal_close() {
    let (session, peer, _listener) = connected().await;

    let waiter = session.next_message(None);
    drop(peer);

    assert!(matches!(within(waiter).await, Err(SessionError::Closed)));
    assert_eq!(session.last_close().unwrap().code, 1006);
}

#[tokio::test]
async fn test_wait_after_close_fails_immediately() {
    let (session, _peer, _listener) = connected().await;
    session.close(false);

    assert!(matches!(
        within(session.next_message(None)).await,
        Err(SessionError::Closed)
    ));
    assert!(matches!(
        within(session.messages().next()).await,
        Some(Err(SessionError::Closed))
    ));
    assert!(matches!(
        session.send(SetLedsRequest::default()),
        Err(SessionError::NotConnected)
    ));
}

#[tokio::test]
async fn test_malformed_frame() {
    let (session, peer, _listener) = connected().await;

    let waiter = session.next_message(None);
    let mut stream = session.messages();

    peer.send_raw(vec![0xff, 0xff, 0xff]);
    peer.send(&leds_reply(&[0x0000ff])).unwrap();

    assert!(matches!(
        within(waiter).await,
        Err(SessionError::MalformedMessage(_))
    ));
    assert!(matches!(
        within(stream.next()).await,
        Some(Err(SessionError::MalformedMessage(_)))
    ));
    assert_eq!(
        within(stream.next()).await.unwrap().unwrap(),
        leds_reply(&[0x0000ff])
    );
    assert!(session.is_connected());
}

#[tokio::test]
async fn test_reconnect_after_close() {
    let (session, _peer, listener) = connected().await;
    session.close(true);
    assert_eq!(session.state(), SessionState::Closed);

    let server = tokio::spawn(accept_and_authenticate(listener));
    within(session.connect(SECRET)).await.unwrap();
    let (peer, _listener) = server.await.unwrap();

    assert!(session.is_connected());
    let waiter = session.next_message(None);
    peer.send(&leds_reply(&[1])).unwrap();
    assert_eq!(within(waiter).await.unwrap(), leds_reply(&[1]));
}

#[tokio::test]
async fn test_request_helpers() {
    let (session, mut peer, _listener) = connected().await;

    let server = tokio::spawn(async move {
        while let Some(message) = peer.recv().await {
            let reply = match message {
                ClientMessage::GetLedCanvasInfo(_) => {
                    ServerMessage::GetLedCanvasInfo(CanvasInfo::new(16, 8))
                }
                ClientMessage::GetLeds(_) => leds_reply(&[0x00ff00, 0x0000ff]),
                other => panic!("unexpected request {:?}", other),
            };
            peer.send(&reply).unwrap();
        }
    });

    // Concurrent requests are serialized and each gets its own reply
    let (info, leds) = within(async { tokio::join!(session.canvas_info(), session.leds()) }).await;
    assert_eq!(info.unwrap(), CanvasInfo::new(16, 8));
    assert_eq!(
        leds.unwrap(),
        vec![Color::new(0x00ff00), Color::new(0x0000ff)]
    );

    drop(session);
    within(server).await.unwrap();
}

#[tokio::test]
async fn test_server_error_fails_request() {
    let (session, mut peer, _listener) = connected().await;

    tokio::spawn(async move {
        peer.recv().await.unwrap();
        peer.send(&ServerMessage::Error {
            message: "no leds attached".to_string(),
        })
        .unwrap();
        peer
    });

    match within(session.leds()).await {
        Err(SessionError::Server(message)) => assert_eq!(message, "no leds attached"),
        other => panic!("expected server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_set_leds_is_sent() {
    let (session, mut peer, _listener) = connected().await;

    session
        .set_leds(vec![Color::new(0xff0000), Color::BLACK])
        .unwrap();

    assert_eq!(
        within(peer.recv()).await,
        Some(ClientMessage::SetLeds(SetLedsRequest {
            leds: vec![Color::new(0xff0000), Color::BLACK],
        }))
    );
}

#[tokio::test]
async fn test_canvas_size_is_checked_before_sending() {
    let (session, mut peer, _listener) = connected().await;
    let info = CanvasInfo::new(2, 2);

    let result = session.set_led_canvas(&info, vec![0u8; 15]);
    assert!(matches!(
        result,
        Err(SessionError::Protocol(ProtocolError::CanvasSizeMismatch {
            expected: 16,
            actual: 15,
            ..
        }))
    ));
    assert!(peer.try_recv_frame().is_none());

    session.set_led_canvas(&info, vec![0u8; 16]).unwrap();
    match within(peer.recv()).await {
        Some(ClientMessage::SetLedCanvas(request)) => assert_eq!(request.pixels.len(), 16),
        other => panic!("expected canvas request, got {:?}", other),
    }
}

#[tokio::test]
async fn test_dropping_session_closes_connection() {
    let (session, mut peer, _listener) = connected().await;
    drop(session);

    assert_eq!(peer.recv_frame().await, Some(OutboundFrame::Close(1000)));
}

#[tokio::test]
async fn test_open_and_close_events() {
    let (session, listener) = new_session();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let seen_clone = Arc::clone(&seen);
    let _subscription = session.subscribe(&[EventKind::Open, EventKind::Close], move |event| {
        seen_clone.lock().unwrap().push(event.kind());
        ControlFlow::Continue(())
    });

    let server = tokio::spawn(accept_and_authenticate(listener));
    within(session.connect(SECRET)).await.unwrap();
    let _peer = server.await.unwrap();
    session.close(true);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![EventKind::Open, EventKind::Close]
    );
}
