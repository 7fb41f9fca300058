//! Process-wide circuit manager slot.
//!
//! A hosting shell that runs a single circuit per process can install its
//! manager here and reach it from anywhere. The slot has an explicit
//! lifecycle: [`init`] installs, [`dispose`] disconnects and clears. Code that
//! needs several independent managers (tests, multi-tenant hosts) constructs
//! [`CircuitManager`](crate::CircuitManager)s directly and never touches it.

use crate::error::GlobalError;
use crate::manager::CircuitControl;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

static CURRENT: Mutex<Option<Arc<dyn CircuitControl>>> = Mutex::new(None);

fn slot() -> MutexGuard<'static, Option<Arc<dyn CircuitControl>>> {
    CURRENT.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Installs `manager` as the process-wide manager.
///
/// # Errors
///
/// Returns [`GlobalError::AlreadyInitialized`] if a manager is installed.
pub fn init<M>(manager: M) -> Result<(), GlobalError>
where
    M: CircuitControl + 'static,
{
    init_shared(Arc::new(manager))
}

/// Installs an already shared manager as the process-wide manager.
///
/// # Errors
///
/// Returns [`GlobalError::AlreadyInitialized`] if a manager is installed.
pub fn init_shared(manager: Arc<dyn CircuitControl>) -> Result<(), GlobalError> {
    let mut slot = slot();
    if slot.is_some() {
        return Err(GlobalError::AlreadyInitialized);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(circuit_id = %manager.circuit_id(), "process-wide circuit manager installed");

    *slot = Some(manager);
    Ok(())
}

/// Returns the process-wide manager, if one is installed.
pub fn current() -> Option<Arc<dyn CircuitControl>> {
    slot().clone()
}

/// Returns true if a manager is installed.
pub fn is_initialized() -> bool {
    slot().is_some()
}

/// Disconnects and removes the process-wide manager.
///
/// Returns `false` if none was installed.
pub fn dispose() -> bool {
    // Release the slot before disconnecting so observers may call `current`.
    let manager = slot().take();
    match manager {
        Some(manager) => {
            manager.disconnect();

            #[cfg(feature = "tracing")]
            tracing::debug!(circuit_id = %manager.circuit_id(), "process-wide circuit manager disposed");

            true
        }
        None => false,
    }
}
