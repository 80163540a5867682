//! christmas CLI
//!
//! Talks to an LED canvas server over its WebSocket control endpoint:
//! - Inspect the canvas and the current LED colors
//! - Set LEDs or draw an image on the canvas
//! - Watch server messages as they arrive

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use christmas_cli::commands::{self, CanvasSource};
use christmas_client::protocol::{Color, ServerMessageKind};

#[derive(Parser)]
#[command(name = "christmas")]
#[command(author, version, about = "Control an LED canvas server")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Server address as host:port (overrides config)
    #[arg(short, long, global = true, env = "CHRISTMAS_ADDRESS")]
    address: Option<String>,

    /// Authentication secret (overrides config)
    #[arg(
        short,
        long,
        global = true,
        env = "CHRISTMAS_SECRET",
        hide_env_values = true
    )]
    secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show canvas size and LED count
    Info,

    /// Show the current LED colors
    Leds {
        /// Print colors as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Set LED colors, one per LED (#rrggbb)
    #[command(group(ArgGroup::new("colors_or_fill").required(true).args(["colors", "fill"])))]
    SetLeds {
        /// Colors in LED order
        colors: Vec<Color>,
        /// Paint every LED this color
        #[arg(long)]
        fill: Option<Color>,
        /// Number of LEDs to fill (defaults to the count the server reports)
        #[arg(long, requires = "fill")]
        count: Option<usize>,
    },

    /// Draw on the LED canvas
    #[command(group(ArgGroup::new("source").required(true).args(["fill", "raw"])))]
    Canvas {
        /// Fill the whole canvas with one color
        #[arg(long)]
        fill: Option<Color>,
        /// Raw RGBA file, row-major, width * height * 4 bytes
        #[arg(long)]
        raw: Option<PathBuf>,
    },

    /// Print server messages as they arrive
    Watch {
        /// Only show messages of this kind (e.g. getLeds)
        #[arg(long)]
        kind: Option<ServerMessageKind>,
        /// Print messages as JSON
        #[arg(long)]
        json: bool,
        /// Stop after this many messages
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Show config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config_path = cli.config.as_deref();

    // Config commands work without a reachable server or a valid secret
    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Path => {
                commands::config_path(config_path);
                Ok(())
            }
            ConfigAction::Init { force } => commands::config_init(config_path, *force),
            ConfigAction::Show => {
                let client = commands::resolve_config(config_path, cli.address, cli.secret)?;
                commands::config_show(config_path, &client)
            }
        };
    }

    let client = commands::resolve_config(config_path, cli.address, cli.secret)?;

    match cli.command {
        Commands::Info => commands::info_command(&client).await,
        Commands::Leds { json } => commands::leds_command(&client, json).await,
        Commands::SetLeds {
            colors,
            fill,
            count,
        } => commands::set_leds_command(&client, colors, fill, count).await,
        Commands::Canvas { fill, raw } => {
            let source = match (fill, raw) {
                (Some(color), _) => CanvasSource::Fill(color),
                (None, Some(path)) => CanvasSource::Raw(path),
                (None, None) => anyhow::bail!("Nothing to draw; pass --fill or --raw"),
            };
            commands::canvas_command(&client, source).await
        }
        Commands::Watch { kind, json, limit } => {
            commands::watch_command(&client, kind, json, limit).await
        }
        Commands::Config { .. } => Ok(()),
    }
}
