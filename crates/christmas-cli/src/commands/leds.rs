//! Leds command implementation

use anyhow::Result;

use christmas_core::config::ClientConfig;

use super::{close_session, open_session, with_timeout};
use crate::output::{format_leds, format_leds_json};

/// Print the current LED colors
pub async fn leds_command(client: &ClientConfig, json: bool) -> Result<()> {
    let session = open_session(client).await?;
    let leds = with_timeout(client.request_timeout, "LED colors", session.leds()).await?;
    close_session(client, &session).await;

    if json {
        println!("{}", format_leds_json(&leds)?);
    } else {
        println!("{}", format_leds(&leds));
    }
    Ok(())
}
