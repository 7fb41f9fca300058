//! Circuit observers: listeners of circuit-level open/close notifications.

use circuit_resilience_core::{EventListener, EventListeners, FnListener, ListenerId, ResilienceEvent};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// Receives circuit-level notifications. Both hooks are optional.
pub trait CircuitHandler: Send + Sync {
    /// The circuit was (re)opened.
    fn on_circuit_opened(&self) {}

    /// The circuit was closed for good.
    fn on_circuit_closed(&self) {}
}

/// The two circuit notification types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitEventType {
    /// `"circuit-opened"`
    Opened,
    /// `"circuit-closed"`
    Closed,
}

impl CircuitEventType {
    /// Returns the event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitEventType::Opened => "circuit-opened",
            CircuitEventType::Closed => "circuit-closed",
        }
    }
}

impl fmt::Display for CircuitEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The name is not a known circuit event type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown circuit event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for CircuitEventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "circuit-opened" => Ok(CircuitEventType::Opened),
            "circuit-closed" => Ok(CircuitEventType::Closed),
            other => Err(UnknownEventType(other.to_string())),
        }
    }
}

/// A circuit-level notification.
#[derive(Debug, Clone)]
pub enum CircuitEvent {
    /// The circuit was (re)opened.
    Opened {
        pattern_name: String,
        timestamp: Instant,
    },
    /// The circuit was closed.
    Closed {
        pattern_name: String,
        timestamp: Instant,
    },
}

impl CircuitEvent {
    pub(crate) fn new(kind: CircuitEventType, pattern_name: &str) -> Self {
        let pattern_name = pattern_name.to_string();
        let timestamp = Instant::now();
        match kind {
            CircuitEventType::Opened => CircuitEvent::Opened {
                pattern_name,
                timestamp,
            },
            CircuitEventType::Closed => CircuitEvent::Closed {
                pattern_name,
                timestamp,
            },
        }
    }

    /// Returns the notification type.
    pub fn kind(&self) -> CircuitEventType {
        match self {
            CircuitEvent::Opened { .. } => CircuitEventType::Opened,
            CircuitEvent::Closed { .. } => CircuitEventType::Closed,
        }
    }
}

impl ResilienceEvent for CircuitEvent {
    fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitEvent::Opened { timestamp, .. } | CircuitEvent::Closed { timestamp, .. } => {
                *timestamp
            }
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CircuitEvent::Opened { pattern_name, .. }
            | CircuitEvent::Closed { pattern_name, .. } => pattern_name,
        }
    }
}

struct HandlerListener(Arc<dyn CircuitHandler>);

impl EventListener<CircuitEvent> for HandlerListener {
    fn on_event(&self, event: &CircuitEvent) {
        match event {
            CircuitEvent::Opened { .. } => self.0.on_circuit_opened(),
            CircuitEvent::Closed { .. } => self.0.on_circuit_closed(),
        }
    }
}

/// Registry of circuit observers, notified in registration order.
///
/// Holds both [`CircuitHandler`]s and per-type callbacks registered with
/// [`add_event_listener`](Self::add_event_listener).
#[derive(Clone, Default)]
pub struct CircuitObservers {
    listeners: EventListeners<CircuitEvent>,
    handlers: Vec<ListenerId>,
    typed: Vec<(ListenerId, CircuitEventType)>,
}

impl CircuitObservers {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a circuit handler receiving both notification types.
    pub fn add_handler(&mut self, handler: Arc<dyn CircuitHandler>) -> ListenerId {
        let id = self.listeners.add(HandlerListener(handler));
        self.handlers.push(id);
        id
    }

    /// Removes a circuit handler.
    ///
    /// Returns `false`, and does nothing, if `id` does not name a registered
    /// handler.
    pub fn remove_handler(&mut self, id: ListenerId) -> bool {
        let Some(pos) = self.handlers.iter().position(|existing| *existing == id) else {
            return false;
        };
        self.handlers.remove(pos);
        self.listeners.remove(id)
    }

    /// Registers a callback for one notification type.
    pub fn add_event_listener<F>(&mut self, kind: CircuitEventType, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self
            .listeners
            .add(FnListener::new(move |event: &CircuitEvent| {
                if event.kind() == kind {
                    listener();
                }
            }));
        self.typed.push((id, kind));
        id
    }

    /// Removes a callback registered for `kind`.
    ///
    /// Returns `false`, and does nothing, if no such callback is registered.
    pub fn remove_event_listener(&mut self, kind: CircuitEventType, id: ListenerId) -> bool {
        let Some(pos) = self
            .typed
            .iter()
            .position(|(existing, existing_kind)| *existing == id && *existing_kind == kind)
        else {
            return false;
        };
        self.typed.remove(pos);
        self.listeners.remove(id)
    }

    /// Notifies every observer. Returns the number of observers that panicked.
    pub fn notify(&self, event: &CircuitEvent) -> usize {
        self.listeners.emit(event)
    }

    /// Returns the number of registered observers.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true if no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for CircuitObservers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitObservers")
            .field("len", &self.len())
            .finish()
    }
}
