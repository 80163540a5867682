//! Client session
//!
//! A [`Session`] owns at most one connection to an LED server. It opens the
//! connection, performs the authentication handshake and then lets callers
//! send requests and wait for replies.
//!
//! Every inbound frame is decoded once by a dispatch task and published on the
//! session's [`EventBus`]. Waiters ([`Session::next_message`]) and streams
//! ([`Session::messages`]) are just listeners on that bus, so any number of
//! them can observe the same message.
//!
//! Waiters register before the request that provokes the reply is sent, and
//! the dispatch task only delivers a message to listeners that were registered
//! when it arrived. A reply can never slip past a waiter that was set up in
//! time.

use std::future::Future;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn, Instrument};

use christmas_core::traits::{
    endpoint_url, OutboundFrame, Transport, TransportEvent, CLOSE_ABNORMAL, CLOSE_GOING_AWAY,
    CLOSE_NORMAL,
};
use christmas_core::{SessionError, TransportError};
use christmas_protocol::{
    AuthenticateResponse, CanvasInfo, ClientMessage, Color, GetLedCanvasInfoRequest,
    GetLedsRequest, GetLedsResponse, ServerMessage, ServerMessageKind, SetLedCanvasRequest,
    SetLedsRequest, WireMessage,
};

use crate::events::{CloseInfo, EventBus, EventKind, SessionEvent, Subscription};
use crate::transport::WebSocketTransport;

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Never connected
    Disconnected,
    /// Transport opening
    Connecting,
    /// Transport open, handshake in progress
    Open,
    /// Handshake accepted; requests may be sent
    Authenticated,
    /// Connection gone. `connect()` may be called again.
    Closed,
}

struct ActiveLink {
    generation: u64,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    // Finishes once the transport has reported its close
    dispatcher: JoinHandle<()>,
}

struct Inner {
    state: SessionState,
    link: Option<ActiveLink>,
    // Bumped on every connect so events from an old connection are ignored
    generation: u64,
    last_error: Option<String>,
    last_close: Option<CloseInfo>,
}

struct Shared {
    events: Arc<EventBus>,
    inner: Mutex<Inner>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(inner: &Inner, generation: u64) -> bool {
        inner
            .link
            .as_ref()
            .is_some_and(|link| link.generation == generation)
    }

    fn mark_open(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if !Self::is_current(&inner, generation) {
            return false;
        }
        if inner.state == SessionState::Connecting {
            inner.state = SessionState::Open;
        }
        true
    }

    fn record_error(&self, generation: u64, error: String) {
        let mut inner = self.lock();
        if Self::is_current(&inner, generation) {
            inner.last_error = Some(error);
        }
    }

    /// Detach the link (if `generation` still owns it) and announce the close.
    fn teardown(&self, generation: Option<u64>, code: u16, reason: String) -> Option<ActiveLink> {
        let (link, info) = {
            let mut inner = self.lock();
            let owned = match generation {
                Some(generation) => Self::is_current(&inner, generation),
                None => inner.link.is_some(),
            };
            if !owned {
                return None;
            }
            let info = CloseInfo {
                code,
                reason,
                error: inner.last_error.take(),
            };
            inner.state = SessionState::Closed;
            inner.last_close = Some(info.clone());
            (inner.link.take(), info)
        };

        self.events.publish(&SessionEvent::Close(info));
        link
    }

    fn publish_frame(&self, generation: u64, frame: &Bytes) {
        if !Self::is_current(&self.lock(), generation) {
            return;
        }
        match ServerMessage::decode(frame) {
            Ok(message) => {
                trace!(kind = %message.kind(), len = frame.len(), "Received server message");
                self.events.publish(&SessionEvent::Message(Arc::new(message)));
            }
            Err(e) => {
                warn!(error = %e, len = frame.len(), "Dropping malformed server message");
                self.events
                    .publish(&SessionEvent::Malformed(e.to_string().into()));
            }
        }
    }
}

/// Reads one connection's events and republishes them on the bus
async fn dispatch(
    shared: Arc<Shared>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Open => {
                if shared.mark_open(generation) {
                    debug!("Transport open");
                    shared.events.publish(&SessionEvent::Open);
                }
            }
            TransportEvent::Message(frame) => shared.publish_frame(generation, &frame),
            TransportEvent::Error(error) => {
                warn!(%error, "Transport error");
                shared.record_error(generation, error);
            }
            TransportEvent::Close { code, reason } => {
                if shared.teardown(Some(generation), code, reason).is_some() {
                    info!(code, "Connection closed");
                }
                return;
            }
        }
    }

    // The transport went away without reporting a close
    if shared
        .teardown(Some(generation), CLOSE_ABNORMAL, String::new())
        .is_some()
    {
        info!("Connection lost");
    }
}

/// A client session with an LED server
pub struct Session {
    address: String,
    url: String,
    transport: Arc<dyn Transport>,
    shared: Arc<Shared>,
    request_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("url", &self.url)
            .field("state", &self.state())
            .finish()
    }
}

impl Session {
    /// Create a session for the server at `address` (`host:port`).
    ///
    /// Nothing is opened until [`connect`](Self::connect) is called.
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_transport(address, Arc::new(WebSocketTransport::new()))
    }

    /// Create a session that opens its connections through `transport`
    pub fn with_transport(address: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let address = address.into();
        let url = endpoint_url(&address);
        Self {
            address,
            url,
            transport,
            shared: Arc::new(Shared {
                events: EventBus::new(),
                inner: Mutex::new(Inner {
                    state: SessionState::Disconnected,
                    link: None,
                    generation: 0,
                    last_error: None,
                    last_close: None,
                }),
            }),
            request_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Server address as given
    pub fn address(&self) -> &str {
        &self.address
    }

    /// WebSocket URL the session connects to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current connection state
    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    /// Whether the handshake has completed and the connection is still up
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Authenticated
    }

    /// How the most recent connection ended, if it has
    pub fn last_close(&self) -> Option<CloseInfo> {
        self.shared.lock().last_close.clone()
    }

    /// Observe raw session events.
    ///
    /// The callback runs while the bus is locked. It may read the session's
    /// state, but it must not subscribe, wait, connect or close from inside
    /// the callback; forward the event over a channel for that.
    pub fn subscribe<F>(&self, kinds: &[EventKind], callback: F) -> Subscription
    where
        F: FnMut(&SessionEvent) -> ControlFlow<()> + Send + 'static,
    {
        self.shared.events.subscribe(kinds, callback)
    }

    /// Open the connection and authenticate with `secret`.
    ///
    /// Fails with [`SessionError::AlreadyConnected`] while another connection
    /// is opening or open. On any failure the connection is closed again and
    /// the session can be reconnected.
    pub async fn connect(&self, secret: &str) -> Result<(), SessionError> {
        // Registered before the socket exists so a fast reply cannot be missed
        let reply = self.wait_for(|_| true);
        let opened = self.begin_connect()?;

        if let Err(e) = opened.await {
            warn!(url = %self.url, error = %e, "Failed to open connection");
            return Err(e.into());
        }

        let result = self.authenticate(secret, reply).await;
        match &result {
            Ok(()) => info!(url = %self.url, "Authenticated"),
            Err(e) => {
                warn!(url = %self.url, error = %e, "Handshake failed");
                self.close(false);
            }
        }
        result
    }

    async fn authenticate(
        &self,
        secret: &str,
        reply: impl Future<Output = Result<ServerMessage, SessionError>>,
    ) -> Result<(), SessionError> {
        self.send(ClientMessage::authenticate(secret))
            .map_err(|e| match e {
                SessionError::NotConnected => self.closed_during_handshake(),
                e => e,
            })?;

        match reply.await {
            Ok(ServerMessage::Authenticate(AuthenticateResponse { success: true })) => {
                let mut inner = self.shared.lock();
                if inner.link.is_none() {
                    drop(inner);
                    return Err(self.closed_during_handshake());
                }
                inner.state = SessionState::Authenticated;
                Ok(())
            }
            Ok(ServerMessage::Authenticate(_)) => Err(SessionError::AuthenticationFailed(
                "server rejected the secret".to_string(),
            )),
            Ok(ServerMessage::Error { message }) => {
                Err(SessionError::AuthenticationFailed(message))
            }
            Ok(other) => Err(SessionError::AuthenticationFailed(format!(
                "expected {} reply, got {}",
                ServerMessageKind::Authenticate,
                other.kind()
            ))),
            Err(SessionError::Closed) => Err(self.closed_during_handshake()),
            Err(e) => Err(e),
        }
    }

    fn closed_during_handshake(&self) -> SessionError {
        match self.last_close() {
            Some(info) => SessionError::Transport(TransportError::from(info)),
            None => SessionError::Closed,
        }
    }

    /// Open the transport and start dispatching its events.
    ///
    /// The returned future resolves once the transport reports open or close.
    fn begin_connect(
        &self,
    ) -> Result<impl Future<Output = Result<(), TransportError>> + Send + 'static, SessionError>
    {
        // Subscribe before taking `inner`; publishing locks the bus first
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        let subscription = self.shared.events.subscribe(
            &[EventKind::Open, EventKind::Close],
            move |event| {
                let outcome = match event {
                    SessionEvent::Open => Ok(()),
                    SessionEvent::Close(info) => Err(TransportError::from(info.clone())),
                    _ => return ControlFlow::Continue(()),
                };
                if let Some(tx) = tx.take() {
                    let _ = tx.send(outcome);
                }
                ControlFlow::Break(())
            },
        );

        let mut inner = self.shared.lock();
        if matches!(
            inner.state,
            SessionState::Connecting | SessionState::Open | SessionState::Authenticated
        ) {
            return Err(SessionError::AlreadyConnected);
        }

        let link = self.transport.open(&self.url)?;
        inner.generation += 1;
        let generation = inner.generation;
        info!(url = %self.url, "Connecting");

        // Spawned under the lock; the task waits for it before touching state
        let span = tracing::debug_span!("session", address = %self.address, generation);
        let dispatcher =
            tokio::spawn(dispatch(Arc::clone(&self.shared), generation, link.events).instrument(span));
        inner.link = Some(ActiveLink {
            generation,
            outbound: link.outbound,
            dispatcher,
        });
        inner.state = SessionState::Connecting;
        inner.last_error = None;
        inner.last_close = None;
        drop(inner);

        Ok(async move {
            let _subscription = subscription;
            rx.await.unwrap_or_else(|_| {
                Err(TransportError::ConnectionFailed(
                    "session dropped".to_string(),
                ))
            })
        })
    }

    /// Encode and queue a message. Never blocks.
    pub fn send(&self, message: impl Into<ClientMessage>) -> Result<(), SessionError> {
        let message = message.into();
        let inner = self.shared.lock();
        let link = inner.link.as_ref().ok_or(SessionError::NotConnected)?;

        let frame = message.encode()?;
        trace!(kind = %message.kind(), len = frame.len(), "Sending message");
        link.outbound
            .send(OutboundFrame::Binary(frame))
            .map_err(|_| SessionError::NotConnected)
    }

    /// Wait for the next server message, optionally of one kind only.
    ///
    /// The wait is registered when this is called, not when the future is
    /// first polled, so call it before sending the request it should catch.
    /// Fails with [`SessionError::Closed`] if the session closes first and
    /// with [`SessionError::MalformedMessage`] if an undecodable frame
    /// arrives first.
    pub fn next_message(
        &self,
        filter: Option<ServerMessageKind>,
    ) -> impl Future<Output = Result<ServerMessage, SessionError>> + Send + 'static {
        let closed = self.state() == SessionState::Closed;
        let wait = self.wait_for(move |message| filter.map_or(true, |kind| message.kind() == kind));
        async move {
            if closed {
                return Err(SessionError::Closed);
            }
            wait.await
        }
    }

    fn wait_for<P>(
        &self,
        accept: P,
    ) -> impl Future<Output = Result<ServerMessage, SessionError>> + Send + 'static
    where
        P: Fn(&ServerMessage) -> bool + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        let subscription = self.shared.events.subscribe(
            &[EventKind::Message, EventKind::Malformed, EventKind::Close],
            move |event| {
                let outcome = match event {
                    SessionEvent::Message(message) if accept(message) => {
                        Ok(ServerMessage::clone(message))
                    }
                    SessionEvent::Malformed(error) => {
                        Err(SessionError::MalformedMessage(error.to_string()))
                    }
                    SessionEvent::Close(_) => Err(SessionError::Closed),
                    _ => return ControlFlow::Continue(()),
                };
                if let Some(tx) = tx.take() {
                    let _ = tx.send(outcome);
                }
                ControlFlow::Break(())
            },
        );

        async move {
            let _subscription = subscription;
            rx.await.unwrap_or(Err(SessionError::Closed))
        }
    }

    /// Stream of every server message from now on.
    ///
    /// Malformed frames are yielded as errors and the stream carries on. When
    /// the session closes the stream yields [`SessionError::Closed`] once and
    /// ends.
    pub fn messages(&self) -> MessageStream {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.state() == SessionState::Closed {
            let _ = tx.send(Err(SessionError::Closed));
            return MessageStream {
                rx,
                _subscription: None,
            };
        }

        let subscription = self.shared.events.subscribe(
            &[EventKind::Message, EventKind::Malformed, EventKind::Close],
            move |event| {
                let item = match event {
                    SessionEvent::Message(message) => Ok(ServerMessage::clone(message)),
                    SessionEvent::Malformed(error) => {
                        Err(SessionError::MalformedMessage(error.to_string()))
                    }
                    SessionEvent::Close(_) => {
                        let _ = tx.send(Err(SessionError::Closed));
                        return ControlFlow::Break(());
                    }
                    SessionEvent::Open => return ControlFlow::Continue(()),
                };
                if tx.send(item).is_err() {
                    return ControlFlow::Break(());
                }
                ControlFlow::Continue(())
            },
        );

        MessageStream {
            rx,
            _subscription: Some(subscription),
        }
    }

    /// Send `message` and wait for the reply of kind `reply`.
    ///
    /// Requests are serialized, so concurrent callers never pick up each
    /// other's replies. A server `Error` message fails the request.
    pub async fn request(
        &self,
        message: impl Into<ClientMessage>,
        reply: ServerMessageKind,
    ) -> Result<ServerMessage, SessionError> {
        let message = message.into();
        let _turn = self.request_lock.lock().await;

        let wait = self.wait_for(move |m| m.kind() == reply || m.kind() == ServerMessageKind::Error);
        self.send(message)?;

        match wait.await? {
            ServerMessage::Error { message } => Err(SessionError::Server(message)),
            other => Ok(other),
        }
    }

    /// Ask the server for its canvas geometry
    pub async fn canvas_info(&self) -> Result<CanvasInfo, SessionError> {
        let expected = ServerMessageKind::GetLedCanvasInfo;
        match self.request(GetLedCanvasInfoRequest, expected).await? {
            ServerMessage::GetLedCanvasInfo(info) => Ok(info),
            other => Err(SessionError::UnexpectedReply {
                expected,
                got: other.kind(),
            }),
        }
    }

    /// Ask the server for the current LED colors
    pub async fn leds(&self) -> Result<Vec<Color>, SessionError> {
        let expected = ServerMessageKind::GetLeds;
        match self.request(GetLedsRequest, expected).await? {
            ServerMessage::GetLeds(GetLedsResponse { leds }) => Ok(leds),
            other => Err(SessionError::UnexpectedReply {
                expected,
                got: other.kind(),
            }),
        }
    }

    /// Set every LED. The server does not acknowledge this.
    pub fn set_leds(&self, leds: Vec<Color>) -> Result<(), SessionError> {
        self.send(SetLedsRequest { leds })
    }

    /// Draw an RGBA image on the canvas.
    ///
    /// `pixels` must be exactly `width * height * 4` bytes for `info`;
    /// anything else is rejected before it reaches the wire.
    pub fn set_led_canvas(
        &self,
        info: &CanvasInfo,
        pixels: impl Into<Bytes>,
    ) -> Result<(), SessionError> {
        self.send(SetLedCanvasRequest::new(info, pixels)?)
    }

    /// Close the connection.
    ///
    /// A graceful close uses code 1000, otherwise 1001. Pending waiters fail
    /// with [`SessionError::Closed`] right away and every stream ends. Frames
    /// already queued are still written, as long as the runtime keeps running;
    /// use [`shutdown`](Self::shutdown) to wait for that. Does nothing if there
    /// is no connection.
    pub fn close(&self, graceful: bool) {
        self.begin_close(graceful);
    }

    /// Close the connection and wait until the transport has finished.
    ///
    /// Behaves like [`close`](Self::close), then resolves once every frame
    /// queued before the close has been written and the transport has reported
    /// the end of the connection. That needs the server to complete the close
    /// handshake, so callers that cannot wait forever should bound this with a
    /// timeout. Resolves at once if there is no connection.
    pub async fn shutdown(&self, graceful: bool) {
        let Some(dispatcher) = self.begin_close(graceful) else {
            return;
        };
        if let Err(e) = dispatcher.await {
            warn!(url = %self.url, error = %e, "Dispatch task failed");
        }
        debug!(url = %self.url, "Connection shut down");
    }

    fn begin_close(&self, graceful: bool) -> Option<JoinHandle<()>> {
        let code = if graceful {
            CLOSE_NORMAL
        } else {
            CLOSE_GOING_AWAY
        };
        let reason = if graceful { "client closed" } else { "client going away" };

        let link = self.shared.teardown(None, code, reason.to_string())?;
        debug!(url = %self.url, code, "Closing connection");
        let _ = link.outbound.send(OutboundFrame::Close(code));
        Some(link.dispatcher)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close(true);
    }
}

/// Stream of server messages, created by [`Session::messages`]
pub struct MessageStream {
    rx: mpsc::UnboundedReceiver<Result<ServerMessage, SessionError>>,
    _subscription: Option<Subscription>,
}

impl Stream for MessageStream {
    type Item = Result<ServerMessage, SessionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream").finish_non_exhaustive()
    }
}
