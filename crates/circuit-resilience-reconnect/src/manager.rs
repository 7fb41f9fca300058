//! The circuit lifecycle manager.
//!
//! All mutable state lives behind one mutex. Every operation mutates it,
//! queues the notifications its transition produces, releases the lock and
//! then drains the queue. Callbacks therefore never run under the lock, may
//! call back into the manager, and are delivered in the order the transitions
//! happened.

use crate::config::ReconnectionOptions;
use crate::error::TransportError;
use crate::events::ReconnectEvent;
use crate::handler::{DefaultReconnectionHandler, ReconnectionHandler};
use crate::observer::{CircuitEvent, CircuitEventType, CircuitHandler, CircuitObservers};
use crate::start::CircuitStartOptions;
use crate::state::{CircuitSnapshot, CircuitState};
use crate::transport::{attempt_resume, AttemptOutcome, CircuitId, Connection, Connector};
use circuit_resilience_core::{contain, EventListeners, ListenerId};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};

/// Work produced by a transition, dispatched after the lock is released.
enum Notification {
    Event(ReconnectEvent),
    ConnectionDown(Option<TransportError>),
    ConnectionUp,
    ReconnectAttempt(u32),
    ReconnectFailed,
    CircuitRejected,
    Circuit(CircuitEventType),
}

struct Shared<C> {
    state: CircuitState,
    /// Bumped by every loss event, disconnect and manual reconnect. Suspended
    /// work compares its captured value before acting.
    generation: u64,
    /// Bumped whenever the watched connection changes.
    epoch: u64,
    attempts: u32,
    connection: Option<C>,
    retry_task: Option<JoinHandle<()>>,
    watch_task: Option<JoinHandle<()>>,
    lost_at: Option<Instant>,
    pending: VecDeque<Notification>,
    draining: bool,
}

impl<C> Shared<C> {
    fn push(&mut self, notification: Notification) {
        self.pending.push_back(notification);
    }
}

struct Inner<K: Connector> {
    name: String,
    circuit_id: CircuitId,
    options: ReconnectionOptions,
    handler: Arc<dyn ReconnectionHandler>,
    default_handler: Arc<DefaultReconnectionHandler>,
    events: EventListeners<ReconnectEvent>,
    connector: K,
    runtime: Handle,
    shared: Mutex<Shared<K::Connection>>,
    observers: Mutex<CircuitObservers>,
}

impl<K: Connector> Drop for Inner<K> {
    fn drop(&mut self) {
        let shared = self
            .shared
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = shared.retry_task.take() {
            task.abort();
        }
        if let Some(task) = shared.watch_task.take() {
            task.abort();
        }
    }
}

/// Keeps one circuit alive across transport interruptions.
///
/// The manager starts in [`CircuitState::Connected`] with the connection the
/// bootstrapping code established. When that connection closes (or
/// [`connection_lost`](Self::connection_lost) is called) it moves to
/// [`CircuitState::Reconnecting`], tells the reconnection handler, and runs a
/// bounded sequence of resume attempts on a background task. The sequence ends
/// in [`CircuitState::Connected`] (observers get `circuit-opened`) or
/// [`CircuitState::Disconnected`] (observers get `circuit-closed`).
///
/// Cloning is cheap; all clones drive the same circuit.
///
/// # Examples
///
/// ```no_run
/// use circuit_resilience_reconnect::{CircuitManager, CircuitStartOptions, Connector};
///
/// # async fn example<K: Connector>(connector: K, connection: K::Connection) {
/// let options = CircuitStartOptions::builder()
///     .name("app")
///     .max_retries(5)
///     .build()
///     .unwrap();
///
/// let manager = CircuitManager::new(options, connector, connection, "circuit-token");
///
/// // Later, on intentional teardown:
/// manager.disconnect();
///
/// // Or try to get the circuit back by hand:
/// let resumed = manager.reconnect(None).await;
/// # let _ = resumed;
/// # }
/// ```
pub struct CircuitManager<K: Connector> {
    inner: Arc<Inner<K>>,
}

impl<K: Connector> Clone for CircuitManager<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Connector> CircuitManager<K> {
    /// Starts managing `circuit_id`, currently attached to `connection`.
    ///
    /// Start options are validated when they are built, so construction
    /// cannot fail.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(
        options: CircuitStartOptions,
        connector: K,
        connection: K::Connection,
        circuit_id: impl Into<CircuitId>,
    ) -> Self {
        let CircuitStartOptions {
            name,
            reconnection,
            handler,
            default_handler,
            circuit_handlers,
            event_listeners,
        } = options;

        let mut observers = CircuitObservers::new();
        for circuit_handler in circuit_handlers {
            observers.add_handler(circuit_handler);
        }

        let manager = Self {
            inner: Arc::new(Inner {
                name,
                circuit_id: circuit_id.into(),
                options: reconnection,
                handler,
                default_handler,
                events: event_listeners,
                connector,
                runtime: Handle::current(),
                shared: Mutex::new(Shared {
                    state: CircuitState::Connected,
                    generation: 0,
                    epoch: 0,
                    attempts: 0,
                    connection: None,
                    retry_task: None,
                    watch_task: None,
                    lost_at: None,
                    pending: VecDeque::new(),
                    draining: false,
                }),
                observers: Mutex::new(observers),
            }),
        };

        {
            let mut shared = manager.lock();
            manager.install(&mut shared, connection);
        }

        #[cfg(feature = "metrics")]
        gauge!("circuit_state", "circuit" => manager.inner.name.clone(), "state" => CircuitState::Connected.as_str())
            .set(1.0);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            circuit = %manager.inner.name,
            circuit_id = %manager.inner.circuit_id,
            max_retries = manager.inner.options.max_retries(),
            "circuit manager started"
        );

        manager
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Returns a point-in-time view of the manager.
    pub fn snapshot(&self) -> CircuitSnapshot {
        let shared = self.lock();
        CircuitSnapshot {
            state: shared.state,
            circuit_id: self.inner.circuit_id.clone(),
            generation: shared.generation,
            attempts: shared.attempts,
            has_connection: shared.connection.is_some(),
        }
    }

    /// Returns the circuit this manager keeps alive.
    pub fn circuit_id(&self) -> &CircuitId {
        &self.inner.circuit_id
    }

    /// Returns the instance name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the reconnection policy.
    pub fn options(&self) -> &ReconnectionOptions {
        &self.inner.options
    }

    /// Returns the built-in handler so a custom handler can delegate to it.
    pub fn default_reconnection_handler(&self) -> Arc<DefaultReconnectionHandler> {
        Arc::clone(&self.inner.default_handler)
    }

    /// Registers a callback for `circuit-opened` or `circuit-closed`.
    pub fn add_event_listener<F>(&self, kind: CircuitEventType, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observers().add_event_listener(kind, listener)
    }

    /// Removes a callback. Removing one that is not registered does nothing.
    pub fn remove_event_listener(&self, kind: CircuitEventType, id: ListenerId) -> bool {
        self.observers().remove_event_listener(kind, id)
    }

    /// Registers a circuit handler after construction.
    pub fn add_circuit_handler<H>(&self, handler: H) -> ListenerId
    where
        H: CircuitHandler + 'static,
    {
        self.observers().add_handler(Arc::new(handler))
    }

    /// Removes a circuit handler registered with
    /// [`add_circuit_handler`](Self::add_circuit_handler).
    pub fn remove_circuit_handler(&self, id: ListenerId) -> bool {
        self.observers().remove_handler(id)
    }

    /// Reports that the transport was lost.
    ///
    /// Starts a reconnection sequence when connected. While a sequence is
    /// running the signal is coalesced into it; once disconnected it is
    /// ignored.
    pub fn connection_lost(&self, cause: Option<TransportError>) {
        self.handle_loss(cause, None);
    }

    /// Tears the circuit down immediately.
    ///
    /// Cancels any pending wait or attempt, closes the held connection and
    /// moves to [`CircuitState::Disconnected`]. No reconnection handler
    /// callback runs; observers get `circuit-closed` if the state changed.
    pub fn disconnect(&self) {
        {
            let mut shared = self.lock();
            shared.generation += 1;
            shared.epoch += 1;
            if let Some(task) = shared.retry_task.take() {
                task.abort();
            }
            if let Some(task) = shared.watch_task.take() {
                task.abort();
            }
            if let Some(connection) = shared.connection.take() {
                self.close_in_background(connection);
            }

            let from_state = shared.state;
            if from_state == CircuitState::Disconnected {
                #[cfg(feature = "tracing")]
                tracing::debug!(circuit = %self.inner.name, "disconnect on a disconnected circuit");
                return;
            }

            shared.lost_at = None;
            self.transition(&mut shared, CircuitState::Disconnected);
            shared.push(Notification::Event(ReconnectEvent::Disconnected {
                pattern_name: self.inner.name.clone(),
                timestamp: Instant::now(),
                from_state,
            }));
            shared.push(Notification::Circuit(CircuitEventType::Closed));
        }
        self.drain();
    }

    /// Tries to resume the circuit by hand.
    ///
    /// Returns `true` right away when already connected. Otherwise cancels any
    /// automatic sequence and makes one attempt, first on `existing` (or the
    /// connection the manager still holds), then on a fresh connection.
    /// Returns `false` and leaves the state unchanged when the attempt fails,
    /// except that a cancelled automatic sequence ends in
    /// [`CircuitState::Disconnected`].
    pub async fn reconnect(&self, existing: Option<K::Connection>) -> bool {
        let (generation, existing) = {
            let mut shared = self.lock();
            if shared.state == CircuitState::Connected {
                #[cfg(feature = "tracing")]
                tracing::debug!(circuit = %self.inner.name, "reconnect on a connected circuit");
                if let Some(connection) = existing {
                    self.close_in_background(connection);
                }
                return true;
            }

            shared.generation += 1;
            shared.attempts += 1;
            if let Some(task) = shared.retry_task.take() {
                task.abort();
            }
            let held = shared.connection.take();
            let existing = match (existing, held) {
                (Some(supplied), Some(held)) => {
                    self.close_in_background(held);
                    Some(supplied)
                }
                (supplied, held) => supplied.or(held),
            };

            #[cfg(feature = "tracing")]
            tracing::info!(
                circuit = %self.inner.name,
                generation = shared.generation,
                supplied = existing.is_some(),
                "manual reconnect"
            );

            (shared.generation, existing)
        };

        let outcome = attempt_resume(&self.inner.connector, &self.inner.circuit_id, existing).await;
        let resumed = self.apply_manual_outcome(generation, outcome);
        self.drain();
        resumed
    }

    fn handle_loss(&self, cause: Option<TransportError>, epoch: Option<u64>) {
        {
            let mut shared = self.lock();
            if epoch.is_some_and(|epoch| epoch != shared.epoch) {
                #[cfg(feature = "tracing")]
                tracing::debug!(circuit = %self.inner.name, "close signal from a replaced connection");
                return;
            }

            match shared.state {
                CircuitState::Connected => {
                    shared.generation += 1;
                    shared.attempts = 0;
                    shared.lost_at = Some(Instant::now());
                    let generation = shared.generation;

                    #[cfg(feature = "tracing")]
                    tracing::warn!(circuit = %self.inner.name, cause = ?cause, "connection lost");

                    self.transition(&mut shared, CircuitState::Reconnecting);
                    shared.push(Notification::Event(ReconnectEvent::ConnectionLost {
                        pattern_name: self.inner.name.clone(),
                        timestamp: Instant::now(),
                        cause: cause.clone(),
                        generation,
                    }));
                    shared.push(Notification::ConnectionDown(cause));

                    let task = self
                        .inner
                        .runtime
                        .spawn(Self::retry_loop(Arc::downgrade(&self.inner), generation));
                    shared.retry_task = Some(task);
                }
                CircuitState::Reconnecting => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(circuit = %self.inner.name, "loss coalesced into running sequence");

                    shared.push(Notification::Event(ReconnectEvent::LossCoalesced {
                        pattern_name: self.inner.name.clone(),
                        timestamp: Instant::now(),
                        cause,
                    }));
                }
                CircuitState::Disconnected => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(circuit = %self.inner.name, "loss ignored on a disconnected circuit");
                    return;
                }
            }
        }
        self.drain();
    }

    /// Runs one reconnection sequence.
    ///
    /// Holds the manager only weakly between attempts, so dropping the last
    /// handle ends the sequence.
    async fn retry_loop(inner: Weak<Inner<K>>, generation: u64) {
        let mut previous = 0;
        loop {
            let attempt = previous + 1;
            let delay = {
                let Some(manager) = Self::upgrade(&inner) else {
                    return;
                };
                let Some(delay) = manager.inner.options.delay_before(previous) else {
                    manager.retries_exhausted(generation, previous);
                    return;
                };
                if !manager.begin_attempt(generation, attempt, delay) {
                    return;
                }
                delay
            };

            tokio::time::sleep(delay).await;

            let Some(manager) = Self::upgrade(&inner) else {
                return;
            };
            let Some(existing) = manager.take_connection(generation) else {
                return;
            };
            let outcome =
                attempt_resume(&manager.inner.connector, &manager.inner.circuit_id, existing).await;
            match outcome {
                AttemptOutcome::Resumed(connection) => {
                    manager.attempt_resumed(generation, attempt, connection);
                    return;
                }
                AttemptOutcome::Rejected => {
                    manager.attempt_rejected(generation, attempt);
                    return;
                }
                AttemptOutcome::Failed(error) => {
                    if !manager.attempt_failed(generation, attempt, error) {
                        return;
                    }
                }
            }
            previous = attempt;
        }
    }

    fn upgrade(inner: &Weak<Inner<K>>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    fn begin_attempt(&self, generation: u64, attempt: u32, delay: Duration) -> bool {
        {
            let mut shared = self.lock();
            if shared.generation != generation {
                return false;
            }
            shared.attempts = attempt;
            let max_retries = self.inner.options.max_retries();

            #[cfg(feature = "tracing")]
            tracing::debug!(
                circuit = %self.inner.name,
                attempt,
                max_retries,
                delay_ms = delay.as_millis() as u64,
                "scheduling reconnection attempt"
            );

            shared.push(Notification::ReconnectAttempt(attempt));
            shared.push(Notification::Event(ReconnectEvent::AttemptStarted {
                pattern_name: self.inner.name.clone(),
                timestamp: Instant::now(),
                attempt,
                max_retries,
                delay,
            }));
        }
        self.drain();
        true
    }

    /// Takes the held connection for an attempt. `None` means the sequence is
    /// stale.
    fn take_connection(&self, generation: u64) -> Option<Option<K::Connection>> {
        let mut shared = self.lock();
        if shared.generation != generation {
            return None;
        }
        Some(shared.connection.take())
    }

    fn attempt_resumed(&self, generation: u64, attempts: u32, connection: K::Connection) {
        {
            let mut shared = self.lock();
            if shared.generation != generation {
                self.discard_stale(&mut shared, generation, Some(connection));
            } else {
                shared.retry_task = None;
                self.resume(&mut shared, attempts, connection);
            }
        }
        self.drain();
    }

    fn attempt_rejected(&self, generation: u64, attempts: u32) {
        {
            let mut shared = self.lock();
            if shared.generation != generation {
                self.discard_stale(&mut shared, generation, None);
            } else {
                shared.retry_task = None;
                self.reject(&mut shared, attempts);
            }
        }
        self.drain();
    }

    /// Records a failed attempt. Returns false if the sequence is stale.
    fn attempt_failed(&self, generation: u64, attempt: u32, error: TransportError) -> bool {
        let current = {
            let mut shared = self.lock();
            if shared.generation != generation {
                self.discard_stale(&mut shared, generation, None);
                false
            } else {
                self.record_failure(&mut shared, attempt, error);
                true
            }
        };
        self.drain();
        current
    }

    fn retries_exhausted(&self, generation: u64, attempts: u32) {
        {
            let mut shared = self.lock();
            if shared.generation != generation {
                return;
            }
            shared.retry_task = None;
            self.transition(&mut shared, CircuitState::Disconnected);
            let _elapsed = self.finish_sequence(&mut shared);

            #[cfg(feature = "tracing")]
            tracing::warn!(
                circuit = %self.inner.name,
                attempts,
                elapsed = ?_elapsed,
                "reconnection attempts exhausted"
            );

            shared.push(Notification::Event(ReconnectEvent::RetriesExhausted {
                pattern_name: self.inner.name.clone(),
                timestamp: Instant::now(),
                attempts,
            }));
            shared.push(Notification::ReconnectFailed);
            shared.push(Notification::Circuit(CircuitEventType::Closed));
        }
        self.drain();
    }

    fn apply_manual_outcome(
        &self,
        generation: u64,
        outcome: AttemptOutcome<K::Connection>,
    ) -> bool {
        let mut shared = self.lock();
        if shared.generation != generation {
            let connection = match outcome {
                AttemptOutcome::Resumed(connection) => Some(connection),
                _ => None,
            };
            self.discard_stale(&mut shared, generation, connection);
            return false;
        }

        let attempts = shared.attempts;
        match outcome {
            AttemptOutcome::Resumed(connection) => {
                self.resume(&mut shared, attempts, connection);
                true
            }
            AttemptOutcome::Rejected => {
                self.reject(&mut shared, attempts);
                false
            }
            AttemptOutcome::Failed(error) => {
                self.record_failure(&mut shared, attempts, error);
                if shared.state != CircuitState::Disconnected {
                    self.transition(&mut shared, CircuitState::Disconnected);
                    let _elapsed = self.finish_sequence(&mut shared);
                    shared.push(Notification::ReconnectFailed);
                    shared.push(Notification::Circuit(CircuitEventType::Closed));
                }
                false
            }
        }
    }

    fn resume(&self, shared: &mut Shared<K::Connection>, attempts: u32, connection: K::Connection) {
        self.install(shared, connection);
        self.transition(shared, CircuitState::Connected);
        let _elapsed = self.finish_sequence(shared);

        #[cfg(feature = "tracing")]
        tracing::info!(circuit = %self.inner.name, attempts, elapsed = ?_elapsed, "circuit resumed");

        #[cfg(feature = "metrics")]
        self.record_attempt("success");

        shared.push(Notification::Event(ReconnectEvent::Reconnected {
            pattern_name: self.inner.name.clone(),
            timestamp: Instant::now(),
            attempts,
        }));
        shared.push(Notification::ConnectionUp);
        shared.push(Notification::Circuit(CircuitEventType::Opened));
    }

    fn reject(&self, shared: &mut Shared<K::Connection>, attempts: u32) {
        let closing = shared.state != CircuitState::Disconnected;
        if closing {
            self.transition(shared, CircuitState::Disconnected);
            let _elapsed = self.finish_sequence(shared);
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(circuit = %self.inner.name, attempts, "host rejected the circuit");

        #[cfg(feature = "metrics")]
        self.record_attempt("rejected");

        shared.push(Notification::Event(ReconnectEvent::CircuitRejected {
            pattern_name: self.inner.name.clone(),
            timestamp: Instant::now(),
            attempts,
        }));
        shared.push(Notification::CircuitRejected);
        if closing {
            shared.push(Notification::Circuit(CircuitEventType::Closed));
        }
    }

    fn record_failure(&self, shared: &mut Shared<K::Connection>, attempt: u32, error: TransportError) {
        #[cfg(feature = "tracing")]
        tracing::debug!(circuit = %self.inner.name, attempt, error = %error, "reconnection attempt failed");

        #[cfg(feature = "metrics")]
        self.record_attempt("failure");

        shared.push(Notification::Event(ReconnectEvent::AttemptFailed {
            pattern_name: self.inner.name.clone(),
            timestamp: Instant::now(),
            attempt,
            error,
        }));
    }

    fn discard_stale(
        &self,
        shared: &mut Shared<K::Connection>,
        generation: u64,
        connection: Option<K::Connection>,
    ) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            circuit = %self.inner.name,
            generation,
            current = shared.generation,
            "discarding result of a cancelled attempt"
        );

        if let Some(connection) = connection {
            self.close_in_background(connection);
        }
        shared.push(Notification::Event(ReconnectEvent::StaleResultDiscarded {
            pattern_name: self.inner.name.clone(),
            timestamp: Instant::now(),
            generation,
        }));
    }

    fn transition(&self, shared: &mut Shared<K::Connection>, to_state: CircuitState) {
        let from_state = shared.state;
        if from_state == to_state {
            return;
        }
        shared.state = to_state;

        shared.push(Notification::Event(ReconnectEvent::StateTransition {
            pattern_name: self.inner.name.clone(),
            timestamp: Instant::now(),
            from_state,
            to_state,
        }));

        #[cfg(feature = "tracing")]
        tracing::info!(circuit = %self.inner.name, from = %from_state, to = %to_state, "circuit state transition");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuit_transitions_total",
                "circuit" => self.inner.name.clone(),
                "from" => from_state.as_str(),
                "to" => to_state.as_str()
            )
            .increment(1);

            gauge!("circuit_state", "circuit" => self.inner.name.clone(), "state" => from_state.as_str())
                .set(0.0);
            gauge!("circuit_state", "circuit" => self.inner.name.clone(), "state" => to_state.as_str())
                .set(1.0);
        }
    }

    /// Ends the timing of the current sequence.
    fn finish_sequence(&self, shared: &mut Shared<K::Connection>) -> Option<Duration> {
        let elapsed = shared.lost_at.take().map(|lost_at| lost_at.elapsed());

        #[cfg(feature = "metrics")]
        if let Some(elapsed) = elapsed {
            histogram!("circuit_reconnect_duration_seconds", "circuit" => self.inner.name.clone())
                .record(elapsed.as_secs_f64());
        }

        elapsed
    }

    #[cfg(feature = "metrics")]
    fn record_attempt(&self, outcome: &'static str) {
        counter!(
            "circuit_reconnect_attempts_total",
            "circuit" => self.inner.name.clone(),
            "outcome" => outcome
        )
        .increment(1);
    }

    /// Holds `connection` and watches it for closure.
    fn install(&self, shared: &mut Shared<K::Connection>, connection: K::Connection) {
        shared.epoch += 1;
        let epoch = shared.epoch;
        let closed = connection.closed();
        let weak = Arc::downgrade(&self.inner);

        let watcher = self.inner.runtime.spawn(async move {
            let cause = closed.await;
            if let Some(manager) = Self::upgrade(&weak) {
                manager.handle_loss(cause, Some(epoch));
            }
        });
        if let Some(previous) = shared.watch_task.replace(watcher) {
            previous.abort();
        }
        if let Some(previous) = shared.connection.replace(connection) {
            self.close_in_background(previous);
        }
    }

    fn close_in_background(&self, mut connection: K::Connection) {
        self.inner.runtime.spawn(async move {
            connection.close().await;
        });
    }

    fn drain(&self) {
        {
            let mut shared = self.lock();
            if shared.draining || shared.pending.is_empty() {
                return;
            }
            shared.draining = true;
        }

        loop {
            let next = {
                let mut shared = self.lock();
                let next = shared.pending.pop_front();
                if next.is_none() {
                    shared.draining = false;
                }
                next
            };
            match next {
                Some(notification) => self.dispatch(notification),
                None => return,
            }
        }
    }

    fn dispatch(&self, notification: Notification) {
        let options = &self.inner.options;
        match notification {
            Notification::Event(event) => {
                self.inner.events.emit(&event);
            }
            Notification::ConnectionDown(cause) => {
                self.call_handler("on_connection_down", |h| {
                    h.on_connection_down(options, cause.as_ref())
                });
            }
            Notification::ConnectionUp => {
                self.call_handler("on_connection_up", |h| h.on_connection_up());
            }
            Notification::ReconnectAttempt(attempt) => {
                self.call_handler("on_reconnect_attempt", |h| {
                    h.on_reconnect_attempt(attempt, options.max_retries())
                });
            }
            Notification::ReconnectFailed => {
                self.call_handler("on_reconnect_failed", |h| h.on_reconnect_failed());
            }
            Notification::CircuitRejected => {
                self.call_handler("on_circuit_rejected", |h| h.on_circuit_rejected());
            }
            Notification::Circuit(kind) => {
                let observers = self.observers().clone();
                observers.notify(&CircuitEvent::new(kind, &self.inner.name));
            }
        }
    }

    fn call_handler<F>(&self, _hook: &'static str, f: F)
    where
        F: FnOnce(&dyn ReconnectionHandler),
    {
        let handler = self.inner.handler.as_ref();
        if let Err(_fault) = contain(|| f(handler)) {
            #[cfg(feature = "tracing")]
            tracing::error!(
                circuit = %self.inner.name,
                hook = _hook,
                error = %_fault,
                "reconnection handler panicked"
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared<K::Connection>> {
        self.inner
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn observers(&self) -> MutexGuard<'_, CircuitObservers> {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: Connector> fmt::Debug for CircuitManager<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitManager")
            .field("name", &self.inner.name)
            .field("circuit_id", &self.inner.circuit_id)
            .field("state", &self.state())
            .finish()
    }
}

/// Type-erased control surface of a circuit manager, used by the process-wide
/// slot in [`global`](crate::global).
pub trait CircuitControl: Send + Sync {
    /// Returns the managed circuit.
    fn circuit_id(&self) -> &CircuitId;

    /// Returns the current lifecycle state.
    fn state(&self) -> CircuitState;

    /// Returns a point-in-time view of the manager.
    fn snapshot(&self) -> CircuitSnapshot;

    /// Tears the circuit down immediately.
    fn disconnect(&self);

    /// Tries to resume the circuit by hand using the held connection or a
    /// fresh one.
    fn reconnect_now(&self) -> BoxFuture<'_, bool>;

    /// Returns the built-in reconnection handler.
    fn default_reconnection_handler(&self) -> Arc<DefaultReconnectionHandler>;

    /// Registers a circuit observer callback.
    fn add_event_listener(
        &self,
        kind: CircuitEventType,
        listener: Box<dyn Fn() + Send + Sync>,
    ) -> ListenerId;

    /// Removes a circuit observer callback.
    fn remove_event_listener(&self, kind: CircuitEventType, id: ListenerId) -> bool;
}

impl<K: Connector> CircuitControl for CircuitManager<K> {
    fn circuit_id(&self) -> &CircuitId {
        CircuitManager::circuit_id(self)
    }

    fn state(&self) -> CircuitState {
        CircuitManager::state(self)
    }

    fn snapshot(&self) -> CircuitSnapshot {
        CircuitManager::snapshot(self)
    }

    fn disconnect(&self) {
        CircuitManager::disconnect(self)
    }

    fn reconnect_now(&self) -> BoxFuture<'_, bool> {
        Box::pin(self.reconnect(None))
    }

    fn default_reconnection_handler(&self) -> Arc<DefaultReconnectionHandler> {
        CircuitManager::default_reconnection_handler(self)
    }

    fn add_event_listener(
        &self,
        kind: CircuitEventType,
        listener: Box<dyn Fn() + Send + Sync>,
    ) -> ListenerId {
        CircuitManager::add_event_listener(self, kind, listener)
    }

    fn remove_event_listener(&self, kind: CircuitEventType, id: ListenerId) -> bool {
        CircuitManager::remove_event_listener(self, kind, id)
    }
}
