//! Info command implementation

use anyhow::Result;

use christmas_core::config::ClientConfig;

use super::{close_session, open_session, with_timeout};
use crate::output::format_info;

/// Show the canvas geometry and LED count of the server
pub async fn info_command(client: &ClientConfig) -> Result<()> {
    let session = open_session(client).await?;

    let info = with_timeout(client.request_timeout, "canvas info", session.canvas_info()).await?;
    let leds = with_timeout(client.request_timeout, "LED colors", session.leds()).await?;

    close_session(client, &session).await;

    print!("{}", format_info(&client.address, &info, leds.len()));
    Ok(())
}
