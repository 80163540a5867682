//! Core error types for the LED canvas client

use std::path::PathBuf;

use christmas_protocol::{ProtocolError, ServerMessageKind};
use thiserror::Error;

/// Transport-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The endpoint URL cannot be used by this transport
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The connection could not be established or failed mid-flight
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection was closed
    #[error("Connection closed (code {code}): {reason}")]
    Closed { code: u16, reason: String },
}

/// Session-related errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// No active transport
    #[error("Not connected")]
    NotConnected,

    /// `connect()` called while a connection is already in progress or open
    #[error("Session is already connected")]
    AlreadyConnected,

    /// The server refused the handshake
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The session closed while waiting
    #[error("Session closed")]
    Closed,

    /// An inbound frame could not be decoded
    #[error("Malformed server message: {0}")]
    MalformedMessage(String),

    /// The server reported an error
    #[error("Server error: {0}")]
    Server(String),

    /// A reply arrived that does not answer the request
    #[error("Unexpected reply: expected {expected}, got {got}")]
    UnexpectedReply {
        expected: ServerMessageKind,
        got: ServerMessageKind,
    },

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Config file could not be read or written
    #[error("Config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
