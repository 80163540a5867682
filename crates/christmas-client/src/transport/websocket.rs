//! WebSocket transport built on tokio-tungstenite

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use christmas_core::traits::{
    OutboundFrame, Transport, TransportEndpoint, TransportEvent, TransportLink, CLOSE_ABNORMAL,
    CLOSE_NORMAL, CLOSE_NO_STATUS,
};
use christmas_core::TransportError;

/// Opens binary WebSocket connections.
///
/// Each connection runs on its own task on the current tokio runtime. Text
/// frames from the server are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, url: &str) -> Result<TransportLink, TransportError> {
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(TransportError::InvalidEndpoint(url.to_string()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (link, endpoint) = TransportLink::channel();
        runtime.spawn(run_connection(url.to_string(), endpoint));
        Ok(link)
    }
}

async fn run_connection(url: String, mut endpoint: TransportEndpoint) {
    let ws = match connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            debug!(%url, error = %e, "WebSocket connect failed");
            endpoint.fail(format!("server unreachable: {}", e));
            return;
        }
    };
    debug!(%url, "WebSocket connected");

    if !endpoint.emit(TransportEvent::Open) {
        return;
    }

    let (mut sink, mut stream) = ws.split();
    let mut closing = false;

    loop {
        tokio::select! {
            frame = endpoint.outbound.recv(), if !closing => {
                let message = match frame {
                    Some(OutboundFrame::Binary(data)) => {
                        trace!(len = data.len(), "Sending frame");
                        Message::Binary(data)
                    }
                    Some(OutboundFrame::Close(code)) => {
                        closing = true;
                        close_message(code)
                    }
                    // Session dropped its link
                    None => {
                        closing = true;
                        close_message(CLOSE_NORMAL)
                    }
                };
                if let Err(e) = sink.send(message).await {
                    endpoint.fail(e.to_string());
                    return;
                }
            }
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Binary(data))) => {
                    trace!(len = data.len(), "Received frame");
                    endpoint.emit(TransportEvent::Message(data));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_owned()),
                        None => (CLOSE_NO_STATUS, String::new()),
                    };
                    debug!(code, %reason, "WebSocket closed by peer");
                    endpoint.emit(TransportEvent::Close { code, reason });
                    return;
                }
                Some(Ok(Message::Text(_))) => debug!("Ignoring text frame"),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    endpoint.fail(e.to_string());
                    return;
                }
                None => {
                    endpoint.emit(TransportEvent::Close {
                        code: CLOSE_ABNORMAL,
                        reason: String::new(),
                    });
                    return;
                }
            }
        }
    }
}

fn close_message(code: u16) -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::from(code),
        reason: String::new().into(),
    }))
}
