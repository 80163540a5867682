//! Output formatting utilities for the CLI
//!
//! Tables for LED colors, one-line renderings of server messages and colored
//! status messages.

use tabled::{settings::Style, Table, Tabled};

use christmas_client::protocol::{CanvasInfo, Color, ServerMessage};

/// Format LED colors as an ASCII table
///
/// Returns "No LEDs reported" if the list is empty.
pub fn format_leds(leds: &[Color]) -> String {
    if leds.is_empty() {
        return "No LEDs reported".to_string();
    }

    #[derive(Tabled)]
    struct LedRow {
        #[tabled(rename = "LED")]
        index: usize,
        #[tabled(rename = "COLOR")]
        color: String,
        #[tabled(rename = "R")]
        r: u8,
        #[tabled(rename = "G")]
        g: u8,
        #[tabled(rename = "B")]
        b: u8,
    }

    let rows: Vec<LedRow> = leds
        .iter()
        .enumerate()
        .map(|(index, color)| LedRow {
            index,
            color: color.to_string(),
            r: color.r(),
            g: color.g(),
            b: color.b(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format LED colors as a JSON array of `#rrggbb` strings
pub fn format_leds_json(leds: &[Color]) -> serde_json::Result<String> {
    let colors: Vec<String> = leds.iter().map(Color::to_string).collect();
    serde_json::to_string_pretty(&colors)
}

/// Format the server summary shown by `christmas info`
pub fn format_info(address: &str, info: &CanvasInfo, led_count: usize) -> String {
    let mut output = String::new();

    output.push_str(&format!("Server: {}\n", address));
    match info.byte_len() {
        Ok(len) => output.push_str(&format!("Canvas: {} ({} bytes RGBA)\n", info, len)),
        Err(_) => output.push_str(&format!("Canvas: {} (too large to draw)\n", info)),
    }
    output.push_str(&format!("LEDs: {}\n", led_count));

    output
}

/// Render a server message on one line
pub fn format_message(message: &ServerMessage) -> String {
    match message {
        ServerMessage::Authenticate(reply) => format!(
            "authenticate: {}",
            if reply.success { "accepted" } else { "rejected" }
        ),
        ServerMessage::GetLedCanvasInfo(info) => format!("getLedCanvasInfo: {}", info),
        ServerMessage::GetLeds(reply) => {
            let preview: Vec<String> = reply.leds.iter().take(8).map(Color::to_string).collect();
            let more = reply.leds.len().saturating_sub(preview.len());
            if more > 0 {
                format!(
                    "getLeds: {} LEDs [{} ... +{}]",
                    reply.leds.len(),
                    preview.join(" "),
                    more
                )
            } else {
                format!("getLeds: {} LEDs [{}]", reply.leds.len(), preview.join(" "))
            }
        }
        ServerMessage::Error { message } => format!("error: {}", message),
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red to stderr
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
