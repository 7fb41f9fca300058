use crate::error::TransportError;
use crate::state::CircuitState;
use circuit_resilience_core::ResilienceEvent;
use std::time::{Duration, Instant};

/// Fine-grained lifecycle events emitted by the circuit manager.
#[derive(Debug, Clone)]
pub enum ReconnectEvent {
    /// The manager moved between lifecycle states.
    StateTransition {
        pattern_name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// The transport was lost and a reconnection sequence started.
    ConnectionLost {
        pattern_name: String,
        timestamp: Instant,
        cause: Option<TransportError>,
        generation: u64,
    },
    /// A loss signal arrived while a sequence was already in flight.
    LossCoalesced {
        pattern_name: String,
        timestamp: Instant,
        cause: Option<TransportError>,
    },
    /// An attempt is scheduled after `delay`.
    AttemptStarted {
        pattern_name: String,
        timestamp: Instant,
        attempt: u32,
        max_retries: u32,
        delay: Duration,
    },
    /// An attempt failed with a transport error.
    AttemptFailed {
        pattern_name: String,
        timestamp: Instant,
        attempt: u32,
        error: TransportError,
    },
    /// The circuit was resumed.
    Reconnected {
        pattern_name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// The host no longer has the circuit.
    CircuitRejected {
        pattern_name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// Every attempt failed.
    RetriesExhausted {
        pattern_name: String,
        timestamp: Instant,
        attempts: u32,
    },
    /// The hosting shell tore the circuit down.
    Disconnected {
        pattern_name: String,
        timestamp: Instant,
        from_state: CircuitState,
    },
    /// An attempt finished after its sequence was cancelled; its result was dropped.
    StaleResultDiscarded {
        pattern_name: String,
        timestamp: Instant,
        generation: u64,
    },
}

impl ResilienceEvent for ReconnectEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReconnectEvent::StateTransition { .. } => "state_transition",
            ReconnectEvent::ConnectionLost { .. } => "connection_lost",
            ReconnectEvent::LossCoalesced { .. } => "loss_coalesced",
            ReconnectEvent::AttemptStarted { .. } => "attempt_started",
            ReconnectEvent::AttemptFailed { .. } => "attempt_failed",
            ReconnectEvent::Reconnected { .. } => "reconnected",
            ReconnectEvent::CircuitRejected { .. } => "circuit_rejected",
            ReconnectEvent::RetriesExhausted { .. } => "retries_exhausted",
            ReconnectEvent::Disconnected { .. } => "disconnected",
            ReconnectEvent::StaleResultDiscarded { .. } => "stale_result_discarded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ReconnectEvent::StateTransition { timestamp, .. }
            | ReconnectEvent::ConnectionLost { timestamp, .. }
            | ReconnectEvent::LossCoalesced { timestamp, .. }
            | ReconnectEvent::AttemptStarted { timestamp, .. }
            | ReconnectEvent::AttemptFailed { timestamp, .. }
            | ReconnectEvent::Reconnected { timestamp, .. }
            | ReconnectEvent::CircuitRejected { timestamp, .. }
            | ReconnectEvent::RetriesExhausted { timestamp, .. }
            | ReconnectEvent::Disconnected { timestamp, .. }
            | ReconnectEvent::StaleResultDiscarded { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            ReconnectEvent::StateTransition { pattern_name, .. }
            | ReconnectEvent::ConnectionLost { pattern_name, .. }
            | ReconnectEvent::LossCoalesced { pattern_name, .. }
            | ReconnectEvent::AttemptStarted { pattern_name, .. }
            | ReconnectEvent::AttemptFailed { pattern_name, .. }
            | ReconnectEvent::Reconnected { pattern_name, .. }
            | ReconnectEvent::CircuitRejected { pattern_name, .. }
            | ReconnectEvent::RetriesExhausted { pattern_name, .. }
            | ReconnectEvent::Disconnected { pattern_name, .. }
            | ReconnectEvent::StaleResultDiscarded { pattern_name, .. } => pattern_name,
        }
    }
}
