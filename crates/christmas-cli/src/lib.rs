//! christmas-cli: Command-line interface for the LED canvas control service
//!
//! Provides the `christmas` CLI for inspecting and drawing on an LED server.

pub mod commands;
pub mod output;
