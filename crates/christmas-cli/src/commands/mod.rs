//! CLI command implementations

mod canvas;
mod config;
mod info;
mod leds;
mod set_leds;
mod watch;

pub use canvas::{canvas_command, CanvasSource};
pub use config::{config_init, config_path, config_show};
pub use info::info_command;
pub use leds::leds_command;
pub use set_leds::set_leds_command;
pub use watch::watch_command;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use christmas_client::Session;
use christmas_core::config::{self as core_config, ClientConfig};
use christmas_core::{ConfigError, SessionError};

/// Build the effective client configuration.
///
/// An explicitly given config file must exist; the default one is optional.
/// Command-line values override the file.
pub fn resolve_config(
    config_path: Option<&Path>,
    address: Option<String>,
    secret: Option<String>,
) -> Result<ClientConfig> {
    let mut client = match config_path {
        Some(path) => core_config::load_config(path)
            .with_context(|| format!("Failed to load config file: {:?}", path))?,
        None => match core_config::load_config(&core_config::default_config_path()) {
            Ok(client) => client,
            Err(ConfigError::NotFound(_)) => ClientConfig::default(),
            Err(e) => return Err(e).context("Failed to load default config file"),
        },
    };

    if let Some(address) = address {
        client.address = address;
    }
    if secret.is_some() {
        client.secret = secret;
    }
    Ok(client)
}

/// Connect and authenticate, bounded by the configured connect timeout
pub async fn open_session(client: &ClientConfig) -> Result<Session> {
    let secret = client
        .secret
        .as_deref()
        .context("No secret configured; pass --secret or set CHRISTMAS_SECRET")?;

    let session = Session::new(client.address.clone());
    tracing::debug!(url = %session.url(), "Opening session");

    tokio::time::timeout(client.connect_timeout, session.connect(secret))
        .await
        .map_err(|_| anyhow!("Timed out connecting to {}", client.address))?
        .with_context(|| format!("Failed to connect to {}", client.address))?;

    Ok(session)
}

/// Close gracefully and wait for queued frames to reach the server.
///
/// Bounded by the request timeout; a server that never answers the close
/// only costs a warning.
pub async fn close_session(client: &ClientConfig, session: &Session) {
    if tokio::time::timeout(client.request_timeout, session.shutdown(true))
        .await
        .is_err()
    {
        tracing::warn!(address = %client.address, "Timed out closing the connection");
    }
}

/// Await a request, bounded by `limit`
pub async fn with_timeout<T>(
    limit: Duration,
    what: &str,
    request: impl Future<Output = Result<T, SessionError>>,
) -> Result<T> {
    tokio::time::timeout(limit, request)
        .await
        .map_err(|_| anyhow!("Timed out waiting for {}", what))?
        .with_context(|| format!("Failed to get {}", what))
}
