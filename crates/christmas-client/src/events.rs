//! Session event bus
//!
//! The session republishes everything its transport reports as
//! [`SessionEvent`]s. Any number of listeners can subscribe to one or more
//! [`EventKind`]s; each listener sees every matching event published after it
//! subscribed, in publish order, until it returns `ControlFlow::Break` or its
//! [`Subscription`] is dropped.
//!
//! Listeners run while the registry is locked, so they must not subscribe or
//! unsubscribe from inside the callback. In practice they only hand the event
//! to a channel.

use std::collections::{BTreeSet, HashMap};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use christmas_core::TransportError;
use christmas_protocol::ServerMessage;

/// Event category, used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    Close,
    Message,
    Malformed,
}

/// How a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close code
    pub code: u16,
    /// Close reason, possibly empty
    pub reason: String,
    /// Transport error reported before the close, if any
    pub error: Option<String>,
}

impl From<CloseInfo> for TransportError {
    fn from(info: CloseInfo) -> Self {
        match info.error {
            Some(error) => TransportError::ConnectionFailed(error),
            None => TransportError::Closed {
                code: info.code,
                reason: info.reason,
            },
        }
    }
}

/// Something that happened on the session's connection
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The transport is open
    Open,
    /// The connection is gone
    Close(CloseInfo),
    /// A server message was decoded
    Message(Arc<ServerMessage>),
    /// A frame arrived that could not be decoded
    Malformed(Arc<str>),
}

impl SessionEvent {
    /// Category of this event
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::Open => EventKind::Open,
            SessionEvent::Close(_) => EventKind::Close,
            SessionEvent::Message(_) => EventKind::Message,
            SessionEvent::Malformed(_) => EventKind::Malformed,
        }
    }
}

type Callback = Box<dyn FnMut(&SessionEvent) -> ControlFlow<()> + Send>;

struct Listener {
    kinds: Vec<EventKind>,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
    by_kind: HashMap<EventKind, BTreeSet<u64>>,
}

impl Registry {
    fn remove(&mut self, id: u64) -> Option<Listener> {
        let listener = self.listeners.remove(&id)?;
        for kind in &listener.kinds {
            if let Some(ids) = self.by_kind.get_mut(kind) {
                ids.remove(&id);
            }
        }
        Some(listener)
    }
}

/// Observer registry keyed by event kind
#[derive(Default)]
pub struct EventBus {
    registry: Mutex<Registry>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `callback` for events of the given kinds.
    ///
    /// The listener stays registered until the callback returns
    /// `ControlFlow::Break(())` or the returned [`Subscription`] is dropped.
    pub fn subscribe<F>(self: &Arc<Self>, kinds: &[EventKind], callback: F) -> Subscription
    where
        F: FnMut(&SessionEvent) -> ControlFlow<()> + Send + 'static,
    {
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = registry.next_id;

        for kind in kinds {
            registry.by_kind.entry(*kind).or_default().insert(id);
        }
        registry.listeners.insert(
            id,
            Listener {
                kinds: kinds.to_vec(),
                callback: Box::new(callback),
            },
        );

        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let removed = self.lock().remove(id);
        removed.is_some()
    }

    /// Deliver `event` to every listener of its kind, in subscription order.
    /// Returns the number of listeners that saw it.
    pub fn publish(&self, event: &SessionEvent) -> usize {
        let mut finished = Vec::new();
        let delivered;
        {
            let mut registry = self.lock();
            let ids: Vec<u64> = registry
                .by_kind
                .get(&event.kind())
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default();
            delivered = ids.len();

            let mut done = Vec::new();
            for id in ids {
                if let Some(listener) = registry.listeners.get_mut(&id) {
                    if (listener.callback)(event).is_break() {
                        done.push(id);
                    }
                }
            }
            for id in done {
                finished.extend(registry.remove(id));
            }
        }
        // Finished listeners are dropped outside the lock
        drop(finished);
        delivered
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Number of listeners registered for `kind`
    pub fn listener_count_for(&self, kind: EventKind) -> usize {
        self.lock().by_kind.get(&kind).map_or(0, BTreeSet::len)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle to a registered listener. Dropping it unsubscribes.
///
/// Holds only a weak reference, so it never keeps the bus alive.
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<EventBus>,
    id: u64,
}

impl Subscription {
    /// Listener id
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}
