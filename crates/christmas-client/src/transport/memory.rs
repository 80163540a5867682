//! In-process transport
//!
//! [`MemoryTransport::pair`] returns a transport and a listener. Every
//! `open()` on the transport hands a [`MemoryPeer`] to the listener, which
//! plays the server side of that connection: it decides when the connection
//! opens, what the server sends and when it closes.

use bytes::Bytes;
use tokio::sync::mpsc;

use christmas_core::traits::{
    OutboundFrame, Transport, TransportEndpoint, TransportEvent, TransportLink,
};
use christmas_core::TransportError;
use christmas_protocol::{ClientMessage, ProtocolError, ServerMessage, WireMessage};

/// Client side of an in-process connection
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    incoming: mpsc::UnboundedSender<MemoryPeer>,
}

/// Accepts connections opened through a [`MemoryTransport`]
#[derive(Debug)]
pub struct MemoryListener {
    incoming: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryTransport {
    /// Create a connected transport/listener pair
    pub fn pair() -> (MemoryTransport, MemoryListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            MemoryTransport { incoming: tx },
            MemoryListener { incoming: rx },
        )
    }
}

impl Transport for MemoryTransport {
    fn open(&self, url: &str) -> Result<TransportLink, TransportError> {
        let (link, endpoint) = TransportLink::channel();
        let peer = MemoryPeer {
            url: url.to_string(),
            endpoint,
        };
        if let Err(mpsc::error::SendError(peer)) = self.incoming.send(peer) {
            peer.fail("server unreachable: listener closed");
        }
        Ok(link)
    }
}

impl MemoryListener {
    /// Wait for the next connection. `None` once every transport is gone.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.incoming.recv().await
    }
}

/// Server side of one in-process connection.
///
/// Dropping the peer without calling [`close`](Self::close) looks like an
/// abnormal disconnect to the client.
#[derive(Debug)]
pub struct MemoryPeer {
    url: String,
    endpoint: TransportEndpoint,
}

impl MemoryPeer {
    /// URL the client opened
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Complete the connection
    pub fn open(&self) {
        self.endpoint.emit(TransportEvent::Open);
    }

    /// Send an encoded server message
    pub fn send(&self, message: &ServerMessage) -> Result<(), ProtocolError> {
        let frame = message.encode()?;
        self.endpoint.emit(TransportEvent::Message(frame));
        Ok(())
    }

    /// Send an arbitrary binary frame
    pub fn send_raw(&self, frame: impl Into<Bytes>) {
        self.endpoint.emit(TransportEvent::Message(frame.into()));
    }

    /// Close the connection from the server side
    pub fn close(&self, code: u16, reason: impl Into<String>) {
        self.endpoint.emit(TransportEvent::Close {
            code,
            reason: reason.into(),
        });
    }

    /// Report a connection failure
    pub fn fail(&self, error: impl Into<String>) {
        self.endpoint.fail(error);
    }

    /// Next frame from the client. `None` once the client dropped its link.
    pub async fn recv_frame(&mut self) -> Option<OutboundFrame> {
        self.endpoint.outbound.recv().await
    }

    /// Next frame from the client, if one is already queued
    pub fn try_recv_frame(&mut self) -> Option<OutboundFrame> {
        self.endpoint.outbound.try_recv().ok()
    }

    /// Next message from the client.
    ///
    /// Returns `None` when the client starts closing, drops its link or
    /// writes something that does not decode.
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        match self.recv_frame().await? {
            OutboundFrame::Binary(frame) => ClientMessage::decode(&frame).ok(),
            OutboundFrame::Close(_) => None,
        }
    }
}
