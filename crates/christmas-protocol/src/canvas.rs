//! Pixel buffer sized for a specific canvas

use crate::error::ProtocolError;
use crate::message::{CanvasInfo, Color, SetLedCanvasRequest, BYTES_PER_PIXEL};

/// An RGBA image whose size always matches the canvas it was created for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasBuffer {
    info: CanvasInfo,
    pixels: Vec<u8>,
}

impl CanvasBuffer {
    /// Allocate a fully transparent black buffer for `info`
    pub fn new(info: CanvasInfo) -> Result<Self, ProtocolError> {
        let len = info.byte_len()?;
        Ok(Self {
            info,
            pixels: vec![0; len],
        })
    }

    /// Wrap an existing buffer, checking its length
    pub fn from_pixels(info: CanvasInfo, pixels: Vec<u8>) -> Result<Self, ProtocolError> {
        let expected = info.byte_len()?;
        if pixels.len() != expected {
            return Err(ProtocolError::CanvasSizeMismatch {
                width: info.width,
                height: info.height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { info, pixels })
    }

    /// Canvas geometry
    pub fn info(&self) -> CanvasInfo {
        self.info
    }

    /// Paint every pixel with an opaque color
    pub fn fill(&mut self, color: Color) {
        let rgba = color.to_rgba();
        for pixel in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            pixel.copy_from_slice(&rgba);
        }
    }

    /// Set one pixel
    pub fn set_pixel(
        &mut self,
        x: u32,
        y: u32,
        rgba: [u8; BYTES_PER_PIXEL],
    ) -> Result<(), ProtocolError> {
        let offset = self.info.offset(x, y)?;
        self.pixels[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&rgba);
        Ok(())
    }

    /// Read one pixel
    pub fn get_pixel(&self, x: u32, y: u32) -> Result<[u8; BYTES_PER_PIXEL], ProtocolError> {
        let offset = self.info.offset(x, y)?;
        let mut rgba = [0; BYTES_PER_PIXEL];
        rgba.copy_from_slice(&self.pixels[offset..offset + BYTES_PER_PIXEL]);
        Ok(rgba)
    }

    /// Raw row-major RGBA bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Turn the buffer into a request for the same canvas
    pub fn into_request(self) -> Result<SetLedCanvasRequest, ProtocolError> {
        SetLedCanvasRequest::new(&self.info, self.pixels)
    }
}
