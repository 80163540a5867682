//! Watch command implementation

use anyhow::Result;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use christmas_client::protocol::ServerMessageKind;
use christmas_client::SessionError;
use christmas_core::config::ClientConfig;

use super::{close_session, open_session};
use crate::output::{format_message, print_info, print_warning};

/// Print server messages as they arrive, until interrupted or `limit` are shown
pub async fn watch_command(
    client: &ClientConfig,
    kind: Option<ServerMessageKind>,
    json: bool,
    limit: Option<usize>,
) -> Result<()> {
    let session = open_session(client).await?;
    let mut messages = session.messages();

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    print_info(&format!("Watching {} (Ctrl-C to stop)", session.url()));

    let mut shown = 0;
    loop {
        if limit.is_some_and(|limit| shown >= limit) {
            break;
        }

        let item = tokio::select! {
            _ = cancel.cancelled() => break,
            item = messages.next() => item,
        };

        match item {
            Some(Ok(message)) => {
                if kind.is_some_and(|kind| message.kind() != kind) {
                    continue;
                }
                if json {
                    println!("{}", serde_json::to_string(&message)?);
                } else {
                    println!("{}", format_message(&message));
                }
                shown += 1;
            }
            Some(Err(SessionError::MalformedMessage(error))) => {
                print_warning(&format!("Malformed message: {}", error));
            }
            Some(Err(SessionError::Closed)) | None => {
                print_info("Connection closed by server");
                return Ok(());
            }
            Some(Err(e)) => return Err(e.into()),
        }
    }

    close_session(client, &session).await;
    Ok(())
}
