//! Transport implementations
//!
//! - [`WebSocketTransport`]: the real connection to an LED server
//! - [`MemoryTransport`]: an in-process pair for driving a session from tests

mod memory;
mod websocket;

pub use memory::{MemoryListener, MemoryPeer, MemoryTransport};
pub use websocket::WebSocketTransport;
