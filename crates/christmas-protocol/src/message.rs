//! Message types for the LED canvas protocol
//!
//! Both directions of the connection carry a single envelope type whose
//! variants mirror the "oneof" unions of the wire schema: a value of
//! [`ClientMessage`] or [`ServerMessage`] always carries exactly one request or
//! response, so an envelope with several variants set cannot be expressed.
//!
//! # Message Flow
//!
//! 1. Client connects and sends `Authenticate` (must be the first message)
//! 2. Server responds with `Authenticate { success }`
//! 3. Client sends `GetLedCanvasInfo` to learn the canvas geometry
//! 4. Client draws with `SetLedCanvas` or addresses LEDs directly with
//!    `GetLeds` / `SetLeds`
//!
//! Replies carry no request id, so a client that needs to match a reply to
//! its request must issue requests one at a time.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::codec::MAX_MESSAGE_SIZE;
use crate::error::ProtocolError;

/// Number of bytes per canvas pixel (R, G, B, A)
pub const BYTES_PER_PIXEL: usize = 4;

/// A single LED color, packed as `0xRRGGBB`
///
/// Only the low 24 bits are ever set, including for decoded values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Color {
    rgb: u32,
}

impl Color {
    /// All channels off
    pub const BLACK: Color = Color { rgb: 0x000000 };

    /// All channels at full intensity
    pub const WHITE: Color = Color { rgb: 0xFFFFFF };

    /// Create a color from a packed value. Bits above the low 24 are discarded.
    pub const fn new(rgb: u32) -> Self {
        Self {
            rgb: rgb & 0x00FF_FFFF,
        }
    }

    /// Create a color from its channels
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            rgb: ((r as u32) << 16) | ((g as u32) << 8) | b as u32,
        }
    }

    /// Packed 24-bit RGB value
    pub const fn rgb(&self) -> u32 {
        self.rgb
    }

    /// Red channel
    pub fn r(&self) -> u8 {
        (self.rgb >> 16) as u8
    }

    /// Green channel
    pub fn g(&self) -> u8 {
        (self.rgb >> 8) as u8
    }

    /// Blue channel
    pub fn b(&self) -> u8 {
        self.rgb as u8
    }

    /// The color as an opaque RGBA pixel
    pub fn to_rgba(&self) -> [u8; BYTES_PER_PIXEL] {
        [self.r(), self.g(), self.b(), 0xFF]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.rgb)
    }
}

impl FromStr for Color {
    type Err = ProtocolError;

    /// Parse `#RRGGBB`, `RRGGBB` or `0xRRGGBB`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ProtocolError::InvalidColor(s.to_string()));
        }

        u32::from_str_radix(hex, 16)
            .map(Color::new)
            .map_err(|_| ProtocolError::InvalidColor(s.to_string()))
    }
}

impl From<u32> for Color {
    fn from(rgb: u32) -> Self {
        Self::new(rgb)
    }
}

impl From<Color> for u32 {
    fn from(color: Color) -> Self {
        color.rgb
    }
}

/// Geometry of the LED canvas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasInfo {
    /// Width in pixels. This is also the row stride.
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Reply to [`GetLedCanvasInfoRequest`]
pub type GetLedCanvasInfoResponse = CanvasInfo;

impl CanvasInfo {
    /// Create a new canvas description
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels in a row
    pub fn stride(&self) -> u32 {
        self.width
    }

    /// Exact length of an RGBA pixel buffer for this canvas.
    ///
    /// Fails for canvases whose buffer could never fit in one message.
    pub fn byte_len(&self) -> Result<usize, ProtocolError> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .filter(|&len| len <= MAX_MESSAGE_SIZE)
            .ok_or(ProtocolError::CanvasTooLarge {
                width: self.width,
                height: self.height,
            })
    }

    /// Byte offset of the pixel at `(x, y)`
    pub fn offset(&self, x: u32, y: u32) -> Result<usize, ProtocolError> {
        if x >= self.width || y >= self.height {
            return Err(ProtocolError::PixelOutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok((y as usize * self.stride() as usize + x as usize) * BYTES_PER_PIXEL)
    }
}

impl fmt::Display for CanvasInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Row-major RGBA pixel data
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbaPixels {
    /// `width * height * 4` bytes, ordered R, G, B, A
    pub pixels: Bytes,
}

impl RgbaPixels {
    /// Wrap a raw pixel buffer
    pub fn new(pixels: impl Into<Bytes>) -> Self {
        Self {
            pixels: pixels.into(),
        }
    }

    /// Length of the buffer in bytes
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }
}

/// Authenticate with the server. Must be the first message on a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateRequest {
    /// Shared secret handed out by the server operator
    pub secret: String,
}

/// Ask for the canvas geometry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLedCanvasInfoRequest;

/// Replace the whole canvas with an image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLedCanvasRequest {
    /// Image to display; see [`RgbaPixels`] for the layout
    pub pixels: RgbaPixels,
}

impl SetLedCanvasRequest {
    /// Build a canvas request, rejecting buffers that do not match `info`
    pub fn new(info: &CanvasInfo, pixels: impl Into<Bytes>) -> Result<Self, ProtocolError> {
        let request = Self {
            pixels: RgbaPixels::new(pixels),
        };
        request.validate(info)?;
        Ok(request)
    }

    /// Check the pixel buffer length against the canvas geometry
    pub fn validate(&self, info: &CanvasInfo) -> Result<(), ProtocolError> {
        let expected = info.byte_len()?;
        if self.pixels.len() != expected {
            return Err(ProtocolError::CanvasSizeMismatch {
                width: info.width,
                height: info.height,
                expected,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }
}

/// Ask for the current LED colors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLedsRequest;

/// Set every LED at once
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLedsRequest {
    /// One color per LED, in the server's LED order
    pub leds: Vec<Color>,
}

/// Reply to [`AuthenticateRequest`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateResponse {
    /// Whether the secret was accepted
    pub success: bool,
}

/// Reply to [`GetLedsRequest`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLedsResponse {
    /// One color per LED, in the server's LED order
    pub leds: Vec<Color>,
}

/// Client-to-server envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    Authenticate(AuthenticateRequest),
    GetLedCanvasInfo(GetLedCanvasInfoRequest),
    SetLedCanvas(SetLedCanvasRequest),
    GetLeds(GetLedsRequest),
    SetLeds(SetLedsRequest),
}

impl ClientMessage {
    /// Shorthand for an authenticate request
    pub fn authenticate(secret: impl Into<String>) -> Self {
        Self::Authenticate(AuthenticateRequest {
            secret: secret.into(),
        })
    }

    /// Which variant this envelope carries
    pub fn kind(&self) -> ClientMessageKind {
        match self {
            ClientMessage::Authenticate(_) => ClientMessageKind::Authenticate,
            ClientMessage::GetLedCanvasInfo(_) => ClientMessageKind::GetLedCanvasInfo,
            ClientMessage::SetLedCanvas(_) => ClientMessageKind::SetLedCanvas,
            ClientMessage::GetLeds(_) => ClientMessageKind::GetLeds,
            ClientMessage::SetLeds(_) => ClientMessageKind::SetLeds,
        }
    }
}

impl From<AuthenticateRequest> for ClientMessage {
    fn from(req: AuthenticateRequest) -> Self {
        Self::Authenticate(req)
    }
}

impl From<GetLedCanvasInfoRequest> for ClientMessage {
    fn from(req: GetLedCanvasInfoRequest) -> Self {
        Self::GetLedCanvasInfo(req)
    }
}

impl From<SetLedCanvasRequest> for ClientMessage {
    fn from(req: SetLedCanvasRequest) -> Self {
        Self::SetLedCanvas(req)
    }
}

impl From<GetLedsRequest> for ClientMessage {
    fn from(req: GetLedsRequest) -> Self {
        Self::GetLeds(req)
    }
}

impl From<SetLedsRequest> for ClientMessage {
    fn from(req: SetLedsRequest) -> Self {
        Self::SetLeds(req)
    }
}

/// Server-to-client envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    Authenticate(AuthenticateResponse),
    GetLedCanvasInfo(GetLedCanvasInfoResponse),
    GetLeds(GetLedsResponse),
    /// The server rejected the last request. It usually closes the
    /// connection right after sending this.
    ///
    /// Not part of the upstream schema, which has no error variant: servers
    /// built to it report failures only by closing the connection. Clients
    /// therefore must not rely on receiving it.
    Error { message: String },
}

impl ServerMessage {
    /// Which variant this envelope carries
    pub fn kind(&self) -> ServerMessageKind {
        match self {
            ServerMessage::Authenticate(_) => ServerMessageKind::Authenticate,
            ServerMessage::GetLedCanvasInfo(_) => ServerMessageKind::GetLedCanvasInfo,
            ServerMessage::GetLeds(_) => ServerMessageKind::GetLeds,
            ServerMessage::Error { .. } => ServerMessageKind::Error,
        }
    }
}

/// Variant tag of a [`ClientMessage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientMessageKind {
    Authenticate,
    GetLedCanvasInfo,
    SetLedCanvas,
    GetLeds,
    SetLeds,
}

impl ClientMessageKind {
    /// Schema field name of the variant
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientMessageKind::Authenticate => "authenticate",
            ClientMessageKind::GetLedCanvasInfo => "getLedCanvasInfo",
            ClientMessageKind::SetLedCanvas => "setLedCanvas",
            ClientMessageKind::GetLeds => "getLeds",
            ClientMessageKind::SetLeds => "setLeds",
        }
    }
}

impl fmt::Display for ClientMessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant tag of a [`ServerMessage`], used to filter waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerMessageKind {
    Authenticate,
    GetLedCanvasInfo,
    GetLeds,
    Error,
}

impl ServerMessageKind {
    /// Schema field name of the variant
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerMessageKind::Authenticate => "authenticate",
            ServerMessageKind::GetLedCanvasInfo => "getLedCanvasInfo",
            ServerMessageKind::GetLeds => "getLeds",
            ServerMessageKind::Error => "error",
        }
    }
}

impl fmt::Display for ServerMessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerMessageKind {
    type Err = ProtocolError;

    /// Accepts the schema name in any case, with or without `-`/`_`
    /// separators (`getLeds`, `get-leds`, `GET_LEDS`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "authenticate" => Ok(Self::Authenticate),
            "getledcanvasinfo" => Ok(Self::GetLedCanvasInfo),
            "getleds" => Ok(Self::GetLeds),
            "error" => Ok(Self::Error),
            _ => Err(ProtocolError::UnknownMessageKind(s.to_string())),
        }
    }
}
