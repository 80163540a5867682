//! CLI integration tests
//!
//! Tests the christmas CLI using assert_cmd, against a small in-test LED
//! server where a connection is needed.

use std::path::Path;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use assert_cmd::Command;
use futures::{SinkExt, StreamExt};
use predicates::prelude::*;
use tokio_tungstenite::tungstenite::Message;

use christmas_client::protocol::{
    AuthenticateResponse, CanvasInfo, ClientMessage, Color, GetLedsResponse, ServerMessage,
    WireMessage,
};

const SECRET: &str = "north-pole";

/// CLI command isolated from the user's environment and config directory
fn christmas(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("christmas")
        .expect("Failed to locate christmas binary - ensure it's built before running tests");
    cmd.env_remove("CHRISTMAS_ADDRESS")
        .env_remove("CHRISTMAS_SECRET")
        .env_remove("RUST_LOG")
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .timeout(Duration::from_secs(30));
    cmd
}

/// Serve a fake LED server on a background thread.
///
/// Returns its address and a channel carrying every draw request it receives.
fn spawn_server(canvas: CanvasInfo, leds: Vec<Color>) -> (String, std_mpsc::Receiver<ClientMessage>) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let (tx, rx) = std_mpsc::channel();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let tx = tx.clone();
                let leds = leds.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(frame)) = ws.next().await {
                        let Message::Binary(data) = frame else {
                            continue;
                        };
                        let reply = match ClientMessage::decode(&data).unwrap() {
                            ClientMessage::Authenticate(request) => {
                                if request.secret != SECRET {
                                    ServerMessage::Error {
                                        message: "invalid secret".to_string(),
                                    }
                                } else {
                                    ServerMessage::Authenticate(AuthenticateResponse {
                                        success: true,
                                    })
                                }
                            }
                            ClientMessage::GetLedCanvasInfo(_) => {
                                ServerMessage::GetLedCanvasInfo(canvas)
                            }
                            ClientMessage::GetLeds(_) => ServerMessage::GetLeds(GetLedsResponse {
                                leds: leds.clone(),
                            }),
                            draw => {
                                let _ = tx.send(draw);
                                continue;
                            }
                        };
                        let frame = reply.encode().unwrap();
                        if ws.send(Message::Binary(frame)).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });
    });

    (address, rx)
}

#[test]
fn test_cli_help() {
    let home = tempfile::tempdir().unwrap();
    christmas(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("christmas"))
        .stdout(predicate::str::contains("Control an LED canvas server"));
}

#[test]
fn test_cli_version() {
    let home = tempfile::tempdir().unwrap();
    christmas(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("christmas"));
}

#[test]
fn test_cli_set_leds_help() {
    let home = tempfile::tempdir().unwrap();
    christmas(home.path())
        .args(["set-leds", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--fill"));
}

#[test]
fn test_cli_unknown_command() {
    let home = tempfile::tempdir().unwrap();
    christmas(home.path())
        .arg("sleigh")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_cli_invalid_color() {
    let home = tempfile::tempdir().unwrap();
    christmas(home.path())
        .args(["set-leds", "#12345"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("#12345"));
}

#[test]
fn test_cli_set_leds_requires_colors() {
    let home = tempfile::tempdir().unwrap();
    christmas(home.path()).arg("set-leds").assert().failure();
}

#[test]
fn test_cli_config_path() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("custom.toml");
    christmas(home.path())
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_cli_config_init_then_show() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("christmas.toml");

    christmas(home.path())
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(path.exists());

    christmas(home.path())
        .args(["config", "show", "--secret", "hunter2", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("localhost:8080"))
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("hunter2").not());
}

#[test]
fn test_cli_missing_secret() {
    let home = tempfile::tempdir().unwrap();
    christmas(home.path())
        .args(["info", "--address", "127.0.0.1:1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No secret configured"));
}

#[test]
fn test_cli_unreachable_server() {
    let home = tempfile::tempdir().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    christmas(home.path())
        .args(["info", "--secret", SECRET, "--address", &address])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to connect"));
}

#[test]
fn test_cli_info() {
    let home = tempfile::tempdir().unwrap();
    let (address, _draws) = spawn_server(CanvasInfo::new(16, 8), vec![Color::WHITE; 128]);

    christmas(home.path())
        .args(["info", "--secret", SECRET, "--address", &address])
        .assert()
        .success()
        .stdout(predicate::str::contains("Canvas: 16x8"))
        .stdout(predicate::str::contains("LEDs: 128"));
}

#[test]
fn test_cli_wrong_secret() {
    let home = tempfile::tempdir().unwrap();
    let (address, _draws) = spawn_server(CanvasInfo::new(1, 1), vec![]);

    christmas(home.path())
        .args(["info", "--secret", "coal", "--address", &address])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid secret"));
}

#[test]
fn test_cli_leds_json() {
    let home = tempfile::tempdir().unwrap();
    let (address, _draws) =
        spawn_server(CanvasInfo::new(2, 1), vec![Color::new(0xff0000), Color::new(0x00ff00)]);

    christmas(home.path())
        .env("CHRISTMAS_SECRET", SECRET)
        .env("CHRISTMAS_ADDRESS", &address)
        .args(["leds", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"#ff0000\""))
        .stdout(predicate::str::contains("\"#00ff00\""));
}

#[test]
fn test_cli_set_leds_fill() {
    let home = tempfile::tempdir().unwrap();
    let (address, draws) = spawn_server(CanvasInfo::new(3, 1), vec![Color::BLACK; 3]);

    christmas(home.path())
        .args(["set-leds", "--fill", "#00ff00", "--secret", SECRET, "--address", &address])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set 3 LEDs"));

    match draws.recv_timeout(Duration::from_secs(10)).unwrap() {
        ClientMessage::SetLeds(request) => {
            assert_eq!(request.leds, vec![Color::new(0x00ff00); 3])
        }
        other => panic!("expected set leds, got {:?}", other),
    }
}

#[test]
fn test_cli_canvas_raw_size_mismatch() {
    let home = tempfile::tempdir().unwrap();
    let (address, draws) = spawn_server(CanvasInfo::new(2, 2), vec![]);
    let image = home.path().join("image.rgba");
    std::fs::write(&image, vec![0u8; 12]).unwrap();

    christmas(home.path())
        .args(["canvas", "--secret", SECRET, "--address", &address, "--raw"])
        .arg(&image)
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not fit"));

    assert!(draws.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn test_cli_canvas_fill() {
    let home = tempfile::tempdir().unwrap();
    let (address, draws) = spawn_server(CanvasInfo::new(2, 2), vec![]);

    christmas(home.path())
        .args(["canvas", "--fill", "0x0000ff", "--secret", SECRET, "--address", &address])
        .assert()
        .success();

    match draws.recv_timeout(Duration::from_secs(10)).unwrap() {
        ClientMessage::SetLedCanvas(request) => {
            assert_eq!(request.pixels.as_bytes(), [0u8, 0, 255, 255].repeat(4).as_slice())
        }
        other => panic!("expected canvas request, got {:?}", other),
    }
}
