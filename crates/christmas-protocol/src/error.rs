//! Protocol error types

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Encoded message exceeds the maximum size
    #[error("Message too large: exceeds maximum of {max} bytes")]
    MessageTooLarge { max: usize },

    /// Canvas pixel buffer does not match the canvas geometry
    #[error("Canvas size mismatch: expected {expected} bytes for {width}x{height}, got {actual}")]
    CanvasSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Canvas pixel buffer could never fit in a single message
    #[error("Canvas too large: {width}x{height}")]
    CanvasTooLarge { width: u32, height: u32 },

    /// Pixel coordinate outside the canvas
    #[error("Pixel ({x}, {y}) is outside the {width}x{height} canvas")]
    PixelOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// Color string could not be parsed
    #[error("Invalid color: {0:?}")]
    InvalidColor(String),

    /// Unknown message kind name
    #[error("Unknown message kind: {0}")]
    UnknownMessageKind(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}
