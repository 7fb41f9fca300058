//! Scripted transport and recording handlers shared by the circuit tests.

#![allow(dead_code)]

use circuit_resilience_reconnect::{
    CircuitHandler, CircuitId, CircuitManager, CircuitStartOptions, CircuitStartOptionsBuilder,
    CircuitState, Connection, Connector, ReconnectionHandler, ReconnectionOptions, TransportError,
};
use futures::future::{BoxFuture, FutureExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// What the host does with the next connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// The connection is refused.
    Refuse,
    /// The connection opens but the host no longer has the circuit.
    Reject,
    /// The connection opens and the circuit resumes.
    Accept,
    /// Like `Accept`, after the given delay.
    SlowAccept(Duration),
}

struct HostState {
    script: VecDeque<Step>,
    fallback: Step,
    connect_times: Vec<Instant>,
    resumes: usize,
    closes: usize,
    live: Option<(Arc<AtomicBool>, Arc<Notify>)>,
}

/// A scripted circuit host acting as the connector.
#[derive(Clone)]
pub(crate) struct MockHost {
    state: Arc<Mutex<HostState>>,
}

impl MockHost {
    /// A host that refuses every connection unless scripted otherwise.
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                script: VecDeque::new(),
                fallback: Step::Refuse,
                connect_times: Vec::new(),
                resumes: 0,
                closes: 0,
                live: None,
            })),
        }
    }

    pub(crate) fn with_script(self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.state.lock().unwrap().script.extend(steps);
        self
    }

    pub(crate) fn with_fallback(self, step: Step) -> Self {
        self.state.lock().unwrap().fallback = step;
        self
    }

    pub(crate) fn push(&self, step: Step) {
        self.state.lock().unwrap().script.push_back(step);
    }

    /// The connection established before the manager starts.
    pub(crate) fn initial_connection(&self) -> MockConnection {
        self.connection(true)
    }

    /// An open, caller-held connection answering resumes with `resume`.
    pub(crate) fn handle(&self, resume: bool) -> MockConnection {
        self.connection(resume)
    }

    /// A caller-held connection that is closed and cannot be restarted.
    pub(crate) fn dead_handle(&self) -> MockConnection {
        let connection = self.connection(true);
        connection.open.store(false, Ordering::SeqCst);
        connection
    }

    /// Drops the most recently opened connection from the host side.
    pub(crate) fn drop_connection(&self) {
        let live = self.state.lock().unwrap().live.clone();
        if let Some((open, hangup)) = live {
            open.store(false, Ordering::SeqCst);
            hangup.notify_one();
        }
    }

    pub(crate) fn connects(&self) -> usize {
        self.state.lock().unwrap().connect_times.len()
    }

    pub(crate) fn connect_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().connect_times.clone()
    }

    pub(crate) fn resumes(&self) -> usize {
        self.state.lock().unwrap().resumes
    }

    pub(crate) fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    fn connection(&self, resume: bool) -> MockConnection {
        let open = Arc::new(AtomicBool::new(true));
        let hangup = Arc::new(Notify::new());
        self.state.lock().unwrap().live = Some((Arc::clone(&open), Arc::clone(&hangup)));
        MockConnection {
            host: self.clone(),
            open,
            hangup,
            resume,
        }
    }
}

impl Connector for MockHost {
    type Connection = MockConnection;

    fn connect<'a>(
        &'a self,
        _circuit: &'a CircuitId,
    ) -> BoxFuture<'a, Result<MockConnection, TransportError>> {
        let step = {
            let mut state = self.state.lock().unwrap();
            state.connect_times.push(Instant::now());
            let fallback = state.fallback;
            state.script.pop_front().unwrap_or(fallback)
        };

        async move {
            match step {
                Step::Refuse => Err(TransportError::connect("connection refused")),
                Step::Reject => Ok(self.connection(false)),
                Step::Accept => Ok(self.connection(true)),
                Step::SlowAccept(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(self.connection(true))
                }
            }
        }
        .boxed()
    }
}

pub(crate) struct MockConnection {
    host: MockHost,
    open: Arc<AtomicBool>,
    hangup: Arc<Notify>,
    resume: bool,
}

impl Connection for MockConnection {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn start(&mut self) -> BoxFuture<'_, Result<(), TransportError>> {
        async { Err(TransportError::connect("channel cannot be restarted")) }.boxed()
    }

    fn resume_circuit<'a>(
        &'a mut self,
        _circuit: &'a CircuitId,
    ) -> BoxFuture<'a, Result<bool, TransportError>> {
        self.host.state.lock().unwrap().resumes += 1;
        let resume = self.resume;
        async move { Ok(resume) }.boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        self.open.store(false, Ordering::SeqCst);
        self.host.state.lock().unwrap().closes += 1;
        async {}.boxed()
    }

    fn closed(&self) -> BoxFuture<'static, Option<TransportError>> {
        let hangup = Arc::clone(&self.hangup);
        async move {
            hangup.notified().await;
            Some(TransportError::closed("connection reset"))
        }
        .boxed()
    }
}

/// Shared, ordered record of callbacks.
#[derive(Clone, Default)]
pub(crate) struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }
}

/// Records every reconnection handler callback.
pub(crate) struct RecordingHandler(pub(crate) Log);

impl ReconnectionHandler for RecordingHandler {
    fn on_connection_down(&self, _options: &ReconnectionOptions, error: Option<&TransportError>) {
        match error {
            Some(err) => self.0.push(format!("down:{}", err.message())),
            None => self.0.push("down"),
        }
    }

    fn on_connection_up(&self) {
        self.0.push("up");
    }

    fn on_reconnect_attempt(&self, attempt: u32, _max_retries: u32) {
        self.0.push(format!("attempt:{attempt}"));
    }

    fn on_reconnect_failed(&self) {
        self.0.push("failed");
    }

    fn on_circuit_rejected(&self) {
        self.0.push("rejected");
    }
}

/// Records circuit notifications as `"{name}:opened"` / `"{name}:closed"`.
pub(crate) struct RecordingObserver {
    pub(crate) name: &'static str,
    pub(crate) log: Log,
}

impl CircuitHandler for RecordingObserver {
    fn on_circuit_opened(&self) {
        self.log.push(format!("{}:opened", self.name));
    }

    fn on_circuit_closed(&self) {
        self.log.push(format!("{}:closed", self.name));
    }
}

/// Start options with a recording handler and one recording observer.
pub(crate) fn recording_options(
    max_retries: u32,
    interval: Duration,
    log: &Log,
) -> CircuitStartOptionsBuilder {
    CircuitStartOptions::builder()
        .name("test")
        .max_retries(max_retries)
        .retry_interval(interval)
        .dialog_id("x")
        .reconnection_handler(RecordingHandler(log.clone()))
        .circuit_handler(RecordingObserver {
            name: "observer",
            log: log.clone(),
        })
}

pub(crate) fn start(host: &MockHost, options: CircuitStartOptionsBuilder) -> CircuitManager<MockHost> {
    let options = options.build().expect("valid start options");
    CircuitManager::new(options, host.clone(), host.initial_connection(), "circuit-1")
}

/// Lets spawned tasks run without advancing the clock past any timer.
pub(crate) async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Waits until the manager reaches `state`.
///
/// Settles first so that a loss signalled just before the call has been
/// observed by the connection watcher.
pub(crate) async fn wait_for(manager: &CircuitManager<MockHost>, state: CircuitState) {
    settle().await;
    tokio::time::timeout(Duration::from_secs(3600), async {
        while manager.state() != state {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("manager never reached {state}"));
}

/// Waits until the host has seen `count` connection attempts.
pub(crate) async fn wait_for_connects(host: &MockHost, count: usize) {
    tokio::time::timeout(Duration::from_secs(3600), async {
        while host.connects() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("host never saw {count} connects"));
}
