//! Circuit lifecycle state.

use crate::transport::CircuitId;
use std::fmt;

/// Lifecycle state of the circuit as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CircuitState {
    /// The transport is up and the circuit is attached.
    Connected = 0,

    /// The transport was lost; an attempt sequence is deciding the outcome.
    Reconnecting = 1,

    /// Terminal for the automatic path. Only a manual reconnect or a full
    /// reload by the hosting shell leaves this state.
    Disconnected = 2,
}

impl CircuitState {
    /// Returns the state name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Connected => "Connected",
            CircuitState::Reconnecting => "Reconnecting",
            CircuitState::Disconnected => "Disconnected",
        }
    }

    /// Returns true if the circuit is attached.
    pub fn is_connected(&self) -> bool {
        matches!(self, CircuitState::Connected)
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a circuit manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitSnapshot {
    /// Current lifecycle state.
    pub state: CircuitState,
    /// The circuit this manager keeps alive.
    pub circuit_id: CircuitId,
    /// Generation token; bumped by every loss event, disconnect and manual
    /// reconnect.
    pub generation: u64,
    /// Attempts made in the current (or last) reconnection sequence.
    pub attempts: u32,
    /// Whether the manager currently holds a connection handle.
    pub has_connection: bool,
}
