//! Reconnection handlers and the default reconnection dialog.

use crate::config::ReconnectionOptions;
use crate::error::TransportError;
use std::sync::Arc;
use tokio::sync::watch;

/// Receives connection-level lifecycle callbacks and owns presentation.
///
/// `on_connection_down` fires exactly once per loss event, before any attempt
/// starts. `on_connection_up` fires at most once per loss event, and only when
/// the circuit was resumed. The remaining hooks are optional progress
/// notifications.
///
/// A custom handler replaces the default one entirely. To keep the default
/// dialog, delegate to a [`DefaultReconnectionHandler`] (see
/// [`CircuitStartOptionsBuilder::reconnection_handler_with`]).
///
/// Callbacks run synchronously on the task driving the transition. A panic is
/// caught and logged; it never reaches the state machine.
///
/// [`CircuitStartOptionsBuilder::reconnection_handler_with`]: crate::CircuitStartOptionsBuilder::reconnection_handler_with
pub trait ReconnectionHandler: Send + Sync {
    /// The connection was lost and a reconnection sequence is starting.
    fn on_connection_down(&self, options: &ReconnectionOptions, error: Option<&TransportError>);

    /// The circuit was resumed.
    fn on_connection_up(&self);

    /// Attempt `attempt` of `max_retries` is about to be made.
    fn on_reconnect_attempt(&self, _attempt: u32, _max_retries: u32) {}

    /// Every attempt failed; the automatic path gave up.
    fn on_reconnect_failed(&self) {}

    /// The host no longer has the circuit; only a reload can recover.
    fn on_circuit_rejected(&self) {}
}

impl<H: ReconnectionHandler + ?Sized> ReconnectionHandler for Arc<H> {
    fn on_connection_down(&self, options: &ReconnectionOptions, error: Option<&TransportError>) {
        (**self).on_connection_down(options, error)
    }

    fn on_connection_up(&self) {
        (**self).on_connection_up()
    }

    fn on_reconnect_attempt(&self, attempt: u32, max_retries: u32) {
        (**self).on_reconnect_attempt(attempt, max_retries)
    }

    fn on_reconnect_failed(&self) {
        (**self).on_reconnect_failed()
    }

    fn on_circuit_rejected(&self) {
        (**self).on_circuit_rejected()
    }
}

/// What the reconnection dialog currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogVisibility {
    /// Not shown.
    Hidden,
    /// Shown while reconnecting. `attempt` is 0 until the first attempt starts.
    Shown {
        /// Current attempt number.
        attempt: u32,
        /// Attempt ceiling.
        max_retries: u32,
    },
    /// Shown after every attempt failed.
    Failed,
    /// Shown after the host rejected the circuit.
    Rejected,
}

impl DialogVisibility {
    /// Returns true unless the dialog is hidden.
    pub fn is_visible(&self) -> bool {
        !matches!(self, DialogVisibility::Hidden)
    }
}

/// State of the reconnection dialog, published to renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogState {
    /// Identifier of the dialog element.
    pub dialog_id: String,
    /// Current visibility.
    pub visibility: DialogVisibility,
}

/// The reconnection affordance driven by the default handler.
///
/// The dialog does not render anything. It publishes [`DialogState`] on a
/// watch channel; the hosting shell subscribes and renders the element named
/// by `dialog_id`.
#[derive(Debug)]
pub struct ReconnectDialog {
    state: watch::Sender<DialogState>,
}

impl ReconnectDialog {
    /// Creates a hidden dialog.
    pub fn new(dialog_id: impl Into<String>) -> Self {
        let (state, _) = watch::channel(DialogState {
            dialog_id: dialog_id.into(),
            visibility: DialogVisibility::Hidden,
        });
        Self { state }
    }

    /// Subscribes to dialog state changes.
    pub fn subscribe(&self) -> watch::Receiver<DialogState> {
        self.state.subscribe()
    }

    /// Returns the current dialog state.
    pub fn state(&self) -> DialogState {
        self.state.borrow().clone()
    }

    /// Returns the dialog identifier.
    pub fn dialog_id(&self) -> String {
        self.state.borrow().dialog_id.clone()
    }

    /// Returns true unless the dialog is hidden.
    pub fn is_visible(&self) -> bool {
        self.state.borrow().visibility.is_visible()
    }

    /// Shows the dialog before any attempt has started.
    pub fn show(&self, max_retries: u32) {
        self.set(DialogVisibility::Shown {
            attempt: 0,
            max_retries,
        });
    }

    /// Shows the current attempt number.
    pub fn update(&self, attempt: u32, max_retries: u32) {
        self.set(DialogVisibility::Shown {
            attempt,
            max_retries,
        });
    }

    /// Hides the dialog.
    pub fn hide(&self) {
        self.set(DialogVisibility::Hidden);
    }

    /// Shows the "could not reconnect" variant.
    pub fn failed(&self) {
        self.set(DialogVisibility::Failed);
    }

    /// Shows the "circuit rejected, reload" variant.
    pub fn rejected(&self) {
        self.set(DialogVisibility::Rejected);
    }

    fn set(&self, visibility: DialogVisibility) {
        self.state.send_modify(|state| state.visibility = visibility);
    }
}

/// The built-in handler: shows the dialog on loss and hides it on resume.
#[derive(Debug)]
pub struct DefaultReconnectionHandler {
    dialog: ReconnectDialog,
}

impl DefaultReconnectionHandler {
    /// Creates a handler driving a dialog with the given id.
    pub fn new(dialog_id: impl Into<String>) -> Self {
        Self {
            dialog: ReconnectDialog::new(dialog_id),
        }
    }

    /// Returns the dialog this handler drives.
    pub fn dialog(&self) -> &ReconnectDialog {
        &self.dialog
    }
}

impl ReconnectionHandler for DefaultReconnectionHandler {
    fn on_connection_down(&self, options: &ReconnectionOptions, _error: Option<&TransportError>) {
        self.dialog.show(options.max_retries());
    }

    fn on_connection_up(&self) {
        self.dialog.hide();
    }

    fn on_reconnect_attempt(&self, attempt: u32, max_retries: u32) {
        self.dialog.update(attempt, max_retries);
    }

    fn on_reconnect_failed(&self) {
        self.dialog.failed();
    }

    fn on_circuit_rejected(&self) {
        self.dialog.rejected();
    }
}
