//! Transport abstraction
//!
//! A transport is a bidirectional channel of binary frames. Opening one
//! returns immediately with a [`TransportLink`]; the connection reports its
//! progress as [`TransportEvent`]s on the link, in order, starting with
//! `Open` (or `Error`/`Close` if it never opens) and ending with exactly one
//! `Close`.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Normal closure
pub const CLOSE_NORMAL: u16 = 1000;
/// Endpoint going away
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Closed without a status code
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Connection dropped without a close handshake
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Notification from an open or opening connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is ready for frames
    Open,
    /// A binary frame arrived
    Message(Bytes),
    /// A connection error; a `Close` always follows
    Error(String),
    /// The connection is gone. No further events are delivered.
    Close { code: u16, reason: String },
}

/// Instruction for the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Write a binary frame
    Binary(Bytes),
    /// Start the close handshake with the given code
    Close(u16),
}

/// The client half of a connection
#[derive(Debug)]
pub struct TransportLink {
    /// Frames to write. Sending never blocks.
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    /// Connection notifications
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// The connection half of a link, held by transport implementations
#[derive(Debug)]
pub struct TransportEndpoint {
    /// Frames the client asked to write
    pub outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    /// Where to report connection notifications
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportLink {
    /// Create a connected link/endpoint pair
    pub fn channel() -> (TransportLink, TransportEndpoint) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            TransportLink {
                outbound: outbound_tx,
                events: events_rx,
            },
            TransportEndpoint {
                outbound: outbound_rx,
                events: events_tx,
            },
        )
    }
}

impl TransportEndpoint {
    /// Report an event. Returns false once the client stopped listening.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Report a failure followed by an abnormal close
    pub fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        self.emit(TransportEvent::Error(error));
        self.emit(TransportEvent::Close {
            code: CLOSE_ABNORMAL,
            reason: String::new(),
        });
    }
}

/// Something that can open connections to an endpoint URL
pub trait Transport: Send + Sync {
    /// Start opening a connection to `url`.
    ///
    /// Returns as soon as the attempt is underway; whether it succeeded is
    /// reported through the link's events. An `Err` means the attempt could
    /// not even be started.
    fn open(&self, url: &str) -> Result<TransportLink, TransportError>;
}

/// WebSocket URL of the LED server at `address`
pub fn endpoint_url(address: &str) -> String {
    format!("ws://{}/ws", address.trim_end_matches('/'))
}
