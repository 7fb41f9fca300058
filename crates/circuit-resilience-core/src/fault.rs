//! Containment of faults raised by user-supplied callbacks.
//!
//! Handlers and listeners are plain Rust callbacks. A callback that panics must
//! not unwind into the code that dispatched it, so every dispatch site runs the
//! callback through [`contain`] and decides locally what to do with the fault.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;

/// A callback panicked while being dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("callback panicked: {message}")]
pub struct ListenerFault {
    message: String,
}

impl ListenerFault {
    /// Returns the panic message, or a placeholder for non-string payloads.
    pub fn message(&self) -> &str {
        &self.message
    }

    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_string()
        };
        Self { message }
    }
}

/// Runs `f`, turning a panic into a [`ListenerFault`].
///
/// # Examples
///
/// ```
/// use circuit_resilience_core::contain;
///
/// assert!(contain(|| {}).is_ok());
///
/// let fault = contain(|| panic!("boom")).unwrap_err();
/// assert_eq!(fault.message(), "boom");
/// ```
pub fn contain<F>(f: F) -> Result<(), ListenerFault>
where
    F: FnOnce(),
{
    catch_unwind(AssertUnwindSafe(f)).map_err(ListenerFault::from_payload)
}
