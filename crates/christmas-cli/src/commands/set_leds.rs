//! Set-leds command implementation

use anyhow::{bail, Result};

use christmas_client::protocol::Color;
use christmas_core::config::ClientConfig;

use super::{close_session, open_session, with_timeout};
use crate::output::print_success;

/// Set the LED colors.
///
/// Either `colors` lists one color per LED, or `fill` paints every LED the
/// same color. Without `count` the fill covers as many LEDs as the server
/// currently reports.
pub async fn set_leds_command(
    client: &ClientConfig,
    colors: Vec<Color>,
    fill: Option<Color>,
    count: Option<usize>,
) -> Result<()> {
    if fill.is_none() && colors.is_empty() {
        bail!("Nothing to set; give one or more colors or --fill");
    }

    let session = open_session(client).await?;

    let leds = match fill {
        Some(color) => {
            let count = match count {
                Some(count) => count,
                None => {
                    with_timeout(client.request_timeout, "LED colors", session.leds())
                        .await?
                        .len()
                }
            };
            vec![color; count]
        }
        None => colors,
    };

    let total = leds.len();
    session.set_leds(leds)?;
    close_session(client, &session).await;

    print_success(&format!("Set {} LEDs", total));
    Ok(())
}
