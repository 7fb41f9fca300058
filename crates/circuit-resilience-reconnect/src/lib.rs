//! Circuit lifecycle management for server-rendered interactive applications.
//!
//! A *circuit* is a server-side session holding the state of one interactive
//! application instance. It outlives any single transport connection. This
//! crate keeps a circuit alive across network interruptions: it detects
//! connection loss, runs a bounded sequence of resume attempts under an
//! operator-supplied policy, and tells the hosting shell what happened.
//!
//! # Features
//!
//! - **Three-state lifecycle**: `Connected`, `Reconnecting`, `Disconnected`
//! - **Bounded reconnection**: retry ceiling and interval from
//!   [`ReconnectionOptions`], validated when built
//! - **Pluggable handlers**: a [`ReconnectionHandler`] owns presentation; the
//!   [`DefaultReconnectionHandler`] drives a [`ReconnectDialog`]
//! - **Circuit observers**: `circuit-opened` / `circuit-closed` callbacks in
//!   registration order
//! - **Cancellation**: [`CircuitManager::disconnect`] cancels pending work and
//!   stale attempt results are discarded
//! - **Event system**: fine-grained [`ReconnectEvent`]s for observability
//!
//! # Examples
//!
//! ```rust
//! use circuit_resilience_reconnect::{CircuitEventType, CircuitHandler, CircuitStartOptions};
//! use std::time::Duration;
//!
//! struct ReloadOnClose;
//!
//! impl CircuitHandler for ReloadOnClose {
//!     fn on_circuit_closed(&self) {
//!         // ask the hosting shell to reload
//!     }
//! }
//!
//! let options = CircuitStartOptions::builder()
//!     .name("app")
//!     .max_retries(3)
//!     .retry_interval(Duration::from_secs(1))
//!     .dialog_id("reconnect-modal")
//!     .circuit_handler(ReloadOnClose)
//!     .on_state_transition(|from, to| println!("{from} -> {to}"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(options.reconnection_options().max_retries(), 3);
//! assert_eq!(CircuitEventType::Closed.as_str(), "circuit-closed");
//! ```
//!
//! Building with an invalid policy fails before any manager exists:
//!
//! ```rust
//! use circuit_resilience_reconnect::{ConfigError, ReconnectionOptions};
//!
//! let err = ReconnectionOptions::builder().max_retries(0).build().unwrap_err();
//! assert_eq!(err, ConfigError::InvalidMaxRetries { value: 0 });
//! ```

mod config;
mod error;
mod events;
pub mod global;
mod handler;
mod manager;
mod observer;
mod start;
mod state;
mod transport;

#[cfg(feature = "serde")]
pub use config::RawReconnectionOptions;
pub use config::{
    IntervalFn, ReconnectionOptions, ReconnectionOptionsBuilder, RetryInterval,
    DEFAULT_DIALOG_ID, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL, MAX_FIRST_RETRY_INTERVAL,
};
pub use error::{ConfigError, GlobalError, TransportError, TransportErrorKind};
pub use events::ReconnectEvent;
pub use handler::{
    DefaultReconnectionHandler, DialogState, DialogVisibility, ReconnectDialog,
    ReconnectionHandler,
};
pub use manager::{CircuitControl, CircuitManager};
pub use observer::{
    CircuitEvent, CircuitEventType, CircuitHandler, CircuitObservers, UnknownEventType,
};
pub use start::{CircuitStartOptions, CircuitStartOptionsBuilder};
pub use state::{CircuitSnapshot, CircuitState};
pub use transport::{CircuitId, Connection, Connector, ServiceConnector};

// Re-export core event types for listener implementations
pub use circuit_resilience_core::{EventListener, ListenerId, ResilienceEvent};
