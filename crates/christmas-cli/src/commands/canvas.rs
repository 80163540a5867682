//! Canvas command implementation

use std::path::PathBuf;

use anyhow::{Context, Result};

use christmas_client::protocol::{CanvasBuffer, Color};
use christmas_core::config::ClientConfig;

use super::{close_session, open_session, with_timeout};
use crate::output::print_success;

/// What to draw on the canvas
#[derive(Debug, Clone)]
pub enum CanvasSource {
    /// A single color over the whole canvas
    Fill(Color),
    /// A raw RGBA file, row-major, exactly `width * height * 4` bytes
    Raw(PathBuf),
}

/// Draw an image on the LED canvas
pub async fn canvas_command(client: &ClientConfig, source: CanvasSource) -> Result<()> {
    let session = open_session(client).await?;
    let info = with_timeout(client.request_timeout, "canvas info", session.canvas_info()).await?;
    tracing::debug!(canvas = %info, "Fetched canvas geometry");

    let done = match source {
        CanvasSource::Fill(color) => {
            let mut buffer = CanvasBuffer::new(info)
                .with_context(|| format!("Cannot draw on a {} canvas", info))?;
            buffer.fill(color);
            session.send(buffer.into_request()?)?;
            format!("Filled {} canvas with {}", info, color)
        }
        CanvasSource::Raw(path) => {
            let pixels = std::fs::read(&path)
                .with_context(|| format!("Failed to read image file: {:?}", path))?;
            session
                .set_led_canvas(&info, pixels)
                .with_context(|| format!("Image does not fit the {} canvas", info))?;
            format!("Drew {:?} on {} canvas", path, info)
        }
    };

    close_session(client, &session).await;
    print_success(&done);
    Ok(())
}
