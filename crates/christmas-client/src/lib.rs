//! christmas-client: Session client for the LED canvas control service
//!
//! ```no_run
//! use christmas_client::Session;
//! use christmas_client::protocol::Color;
//!
//! # async fn demo() -> Result<(), christmas_client::SessionError> {
//! let session = Session::new("localhost:8080");
//! session.connect("secret").await?;
//!
//! let info = session.canvas_info().await?;
//! println!("canvas is {}", info);
//!
//! session.set_leds(vec![Color::new(0xff0000); 50])?;
//! session.close(true);
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod session;
pub mod transport;

pub use events::{CloseInfo, EventBus, EventKind, SessionEvent, Subscription};
pub use session::{MessageStream, Session, SessionState};
pub use transport::{MemoryListener, MemoryPeer, MemoryTransport, WebSocketTransport};

pub use christmas_core::{SessionError, TransportError};
pub use christmas_protocol as protocol;
