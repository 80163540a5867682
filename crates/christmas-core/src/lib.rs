//! christmas-core: Core abstractions and configuration for the LED canvas client
//!
//! This crate provides the error taxonomy, the transport abstraction the
//! session runs on, and the configuration structures shared by the client
//! library and the CLI.

pub mod config;
pub mod error;
pub mod traits;

pub use error::{ConfigError, SessionError, TransportError};
pub use traits::{endpoint_url, Transport, TransportEvent, TransportLink};
