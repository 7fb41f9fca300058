use crate::config::{ReconnectionOptions, ReconnectionOptionsBuilder, RetryInterval};
use crate::error::{ConfigError, TransportError};
use crate::events::ReconnectEvent;
use crate::handler::{DefaultReconnectionHandler, ReconnectionHandler};
use crate::observer::CircuitHandler;
use crate::state::CircuitState;
use circuit_resilience_core::{EventListeners, FnListener};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type WrapDefault =
    Box<dyn FnOnce(Arc<DefaultReconnectionHandler>) -> Arc<dyn ReconnectionHandler> + Send>;

enum HandlerChoice {
    Default,
    Custom(Arc<dyn ReconnectionHandler>),
    WrapDefault(WrapDefault),
}

/// Everything the hosting shell supplies when starting a circuit manager.
///
/// # Examples
///
/// ```
/// use circuit_resilience_reconnect::CircuitStartOptions;
/// use std::time::Duration;
///
/// let options = CircuitStartOptions::builder()
///     .name("dashboard")
///     .max_retries(5)
///     .retry_interval(Duration::from_secs(2))
///     .on_retries_exhausted(|attempts| eprintln!("gave up after {attempts} attempts"))
///     .build()
///     .unwrap();
///
/// assert_eq!(options.reconnection_options().max_retries(), 5);
/// ```
pub struct CircuitStartOptions {
    pub(crate) name: String,
    pub(crate) reconnection: ReconnectionOptions,
    pub(crate) handler: Arc<dyn ReconnectionHandler>,
    pub(crate) default_handler: Arc<DefaultReconnectionHandler>,
    pub(crate) circuit_handlers: Vec<Arc<dyn CircuitHandler>>,
    pub(crate) event_listeners: EventListeners<ReconnectEvent>,
}

impl CircuitStartOptions {
    /// Creates a new builder.
    pub fn builder() -> CircuitStartOptionsBuilder {
        CircuitStartOptionsBuilder::new()
    }

    /// Returns the instance name used in events, logs and metric labels.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the reconnection policy.
    pub fn reconnection_options(&self) -> &ReconnectionOptions {
        &self.reconnection
    }

    /// Returns the built-in handler, whether or not it is the active one.
    pub fn default_reconnection_handler(&self) -> &Arc<DefaultReconnectionHandler> {
        &self.default_handler
    }
}

impl fmt::Debug for CircuitStartOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitStartOptions")
            .field("name", &self.name)
            .field("reconnection", &self.reconnection)
            .field("circuit_handlers", &self.circuit_handlers.len())
            .field("event_listeners", &self.event_listeners.len())
            .finish()
    }
}

/// Builder for [`CircuitStartOptions`].
pub struct CircuitStartOptionsBuilder {
    name: String,
    reconnection: ReconnectionOptionsBuilder,
    handler: HandlerChoice,
    circuit_handlers: Vec<Arc<dyn CircuitHandler>>,
    event_listeners: EventListeners<ReconnectEvent>,
}

impl CircuitStartOptionsBuilder {
    /// Creates a builder with the default policy and handler.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            reconnection: ReconnectionOptions::builder(),
            handler: HandlerChoice::Default,
            circuit_handlers: Vec::new(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the instance name used in events, logs and metric labels.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the whole reconnection policy.
    pub fn reconnection_options(mut self, options: ReconnectionOptions) -> Self {
        self.reconnection = options.to_builder();
        self
    }

    /// Sets the maximum number of attempts per loss event.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.reconnection = self.reconnection.max_retries(max_retries);
        self
    }

    /// Sets a fixed delay between attempts.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.reconnection = self.reconnection.retry_interval(interval);
        self
    }

    /// Sets the retry interval policy.
    pub fn retry_interval_policy(mut self, interval: RetryInterval) -> Self {
        self.reconnection = self.reconnection.retry_interval_policy(interval);
        self
    }

    /// Sets the identifier of the reconnection dialog.
    pub fn dialog_id(mut self, dialog_id: impl Into<String>) -> Self {
        self.reconnection = self.reconnection.dialog_id(dialog_id);
        self
    }

    /// Replaces the default reconnection handler.
    pub fn reconnection_handler<H>(mut self, handler: H) -> Self
    where
        H: ReconnectionHandler + 'static,
    {
        self.handler = HandlerChoice::Custom(Arc::new(handler));
        self
    }

    /// Replaces the default handler with one built around it, so the custom
    /// handler can delegate to the default dialog.
    ///
    /// # Examples
    ///
    /// ```
    /// use circuit_resilience_reconnect::{
    ///     CircuitStartOptions, DefaultReconnectionHandler, ReconnectionHandler,
    ///     ReconnectionOptions, TransportError,
    /// };
    /// use std::sync::Arc;
    ///
    /// struct Logging(Arc<DefaultReconnectionHandler>);
    ///
    /// impl ReconnectionHandler for Logging {
    ///     fn on_connection_down(&self, options: &ReconnectionOptions, error: Option<&TransportError>) {
    ///         eprintln!("connection lost: {error:?}");
    ///         self.0.on_connection_down(options, error);
    ///     }
    ///
    ///     fn on_connection_up(&self) {
    ///         self.0.on_connection_up();
    ///     }
    /// }
    ///
    /// let options = CircuitStartOptions::builder()
    ///     .reconnection_handler_with(Logging)
    ///     .build()
    ///     .unwrap();
    /// # let _ = options;
    /// ```
    pub fn reconnection_handler_with<F, H>(mut self, wrap: F) -> Self
    where
        F: FnOnce(Arc<DefaultReconnectionHandler>) -> H + Send + 'static,
        H: ReconnectionHandler + 'static,
    {
        self.handler = HandlerChoice::WrapDefault(Box::new(move |default| {
            Arc::new(wrap(default)) as Arc<dyn ReconnectionHandler>
        }));
        self
    }

    /// Registers a circuit handler. Handlers are notified in registration order.
    pub fn circuit_handler<H>(mut self, handler: H) -> Self
    where
        H: CircuitHandler + 'static,
    {
        self.circuit_handlers.push(Arc::new(handler));
        self
    }

    /// Registers a callback for every state transition.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ReconnectEvent| {
                if let ReconnectEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback when the connection is lost.
    pub fn on_connection_lost<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&TransportError>) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ReconnectEvent| {
                if let ReconnectEvent::ConnectionLost { cause, .. } = event {
                    f(cause.as_ref());
                }
            }));
        self
    }

    /// Registers a callback when an attempt is scheduled.
    ///
    /// # Callback Signature
    /// `Fn(u32, Duration)` - the attempt number and the delay before it.
    pub fn on_attempt<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ReconnectEvent| {
                if let ReconnectEvent::AttemptStarted { attempt, delay, .. } = event {
                    f(*attempt, *delay);
                }
            }));
        self
    }

    /// Registers a callback when an attempt fails.
    pub fn on_attempt_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, &TransportError) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ReconnectEvent| {
                if let ReconnectEvent::AttemptFailed { attempt, error, .. } = event {
                    f(*attempt, error);
                }
            }));
        self
    }

    /// Registers a callback when the circuit is resumed, with the number of
    /// attempts it took.
    pub fn on_reconnected<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ReconnectEvent| {
                if let ReconnectEvent::Reconnected { attempts, .. } = event {
                    f(*attempts);
                }
            }));
        self
    }

    /// Registers a callback when every attempt failed.
    pub fn on_retries_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &ReconnectEvent| {
                if let ReconnectEvent::RetriesExhausted { attempts, .. } = event {
                    f(*attempts);
                }
            }));
        self
    }

    /// Registers a listener for every lifecycle event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&ReconnectEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Validates and builds the start options.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the reconnection policy is invalid.
    pub fn build(self) -> Result<CircuitStartOptions, ConfigError> {
        let reconnection = self.reconnection.build()?;
        let default_handler = Arc::new(DefaultReconnectionHandler::new(reconnection.dialog_id()));

        let handler = match self.handler {
            HandlerChoice::Default => {
                Arc::clone(&default_handler) as Arc<dyn ReconnectionHandler>
            }
            HandlerChoice::Custom(handler) => handler,
            HandlerChoice::WrapDefault(wrap) => wrap(Arc::clone(&default_handler)),
        };

        Ok(CircuitStartOptions {
            name: self.name,
            reconnection,
            handler,
            default_handler,
            circuit_handlers: self.circuit_handlers,
            event_listeners: self.event_listeners,
        })
    }
}

impl Default for CircuitStartOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CircuitStartOptionsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handler = match self.handler {
            HandlerChoice::Default => "default",
            HandlerChoice::Custom(_) => "custom",
            HandlerChoice::WrapDefault(_) => "wrapped default",
        };
        f.debug_struct("CircuitStartOptionsBuilder")
            .field("name", &self.name)
            .field("reconnection", &self.reconnection)
            .field("handler", &handler)
            .field("circuit_handlers", &self.circuit_handlers.len())
            .finish()
    }
}
