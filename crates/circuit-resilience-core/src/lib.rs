//! Core infrastructure for circuit-resilience.
//!
//! This crate provides the shared pieces used by the circuit lifecycle manager:
//! - Event system for observability
//! - Listener registries with stable ids, so listeners can be removed again
//! - Fault containment for user-supplied callbacks

pub mod events;
pub mod fault;

pub use events::{EventListener, EventListeners, FnListener, ListenerId, ResilienceEvent};
pub use fault::{contain, ListenerFault};
