//! Binary codec for protocol envelopes
//!
//! Each WebSocket binary frame carries exactly one envelope, so the codec
//! needs no framing of its own: a frame is the bincode encoding of a
//! [`ClientMessage`] or [`ServerMessage`] (variable-length integers, size
//! limited, trailing bytes rejected).

use bincode::Options;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ProtocolError;
use crate::message::{ClientMessage, ServerMessage};

/// Maximum size of an encoded envelope (16 MiB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

fn options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_MESSAGE_SIZE as u64)
}

fn map_error(err: bincode::Error) -> ProtocolError {
    if matches!(*err, bincode::ErrorKind::SizeLimit) {
        ProtocolError::MessageTooLarge {
            max: MAX_MESSAGE_SIZE,
        }
    } else {
        ProtocolError::Serialization(err)
    }
}

/// A top-level envelope that can be put on the wire
pub trait WireMessage: Serialize + DeserializeOwned + Sized {
    /// Encode into a single binary frame
    fn encode(&self) -> Result<Bytes, ProtocolError> {
        options().serialize(self).map(Bytes::from).map_err(map_error)
    }

    /// Decode a single binary frame
    fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        options().deserialize(frame).map_err(map_error)
    }
}

impl WireMessage for ClientMessage {}
impl WireMessage for ServerMessage {}
