//! christmas-protocol: Wire protocol for the LED canvas control service
//!
//! This crate defines the messages exchanged between a client and the LED
//! server over a single WebSocket connection, and the compact binary codec
//! used to put them on the wire.

pub mod canvas;
pub mod codec;
pub mod error;
pub mod message;

pub use canvas::CanvasBuffer;
pub use codec::{WireMessage, MAX_MESSAGE_SIZE};
pub use error::ProtocolError;
pub use message::{
    AuthenticateRequest, AuthenticateResponse, CanvasInfo, ClientMessage, ClientMessageKind,
    Color, GetLedCanvasInfoRequest, GetLedsRequest, GetLedsResponse, RgbaPixels, ServerMessage,
    ServerMessageKind, SetLedCanvasRequest, SetLedsRequest, BYTES_PER_PIXEL,
};
