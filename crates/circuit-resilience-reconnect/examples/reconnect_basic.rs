//! Basic circuit reconnection example.
//!
//! Run with: cargo run --example reconnect_basic -p circuit-resilience-reconnect
//!
//! A simulated host drops the connection, refuses the next two connection
//! attempts and then accepts. The manager resumes the circuit on the third
//! attempt while the default dialog reports progress.

use circuit_resilience_reconnect::{
    CircuitEventType, CircuitId, CircuitManager, CircuitStartOptions, Connection, ServiceConnector,
    TransportError,
};
use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// A channel to the simulated host.
struct SimulatedChannel {
    open: bool,
    hangup: Arc<Notify>,
}

impl Connection for SimulatedChannel {
    fn is_open(&self) -> bool {
        self.open
    }

    fn start(&mut self) -> BoxFuture<'_, Result<(), TransportError>> {
        async { Err(TransportError::connect("stale channel cannot restart")) }.boxed()
    }

    fn resume_circuit<'a>(
        &'a mut self,
        circuit: &'a CircuitId,
    ) -> BoxFuture<'a, Result<bool, TransportError>> {
        async move {
            println!("  host: resuming circuit {circuit}");
            Ok(true)
        }
        .boxed()
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        self.open = false;
        async {}.boxed()
    }

    fn closed(&self) -> BoxFuture<'static, Option<TransportError>> {
        let hangup = Arc::clone(&self.hangup);
        async move {
            hangup.notified().await;
            Some(TransportError::closed("connection reset by peer"))
        }
        .boxed()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .init();

    println!("Circuit reconnection example\n");

    let connects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connects);
    let connector = ServiceConnector::new(tower::service_fn(move |_circuit: CircuitId| {
        let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if attempt <= 2 {
                println!("  host: refusing connection #{attempt}");
                Err(TransportError::connect("host unreachable"))
            } else {
                println!("  host: accepting connection #{attempt}");
                Ok(SimulatedChannel {
                    open: true,
                    hangup: Arc::new(Notify::new()),
                })
            }
        }
    }));

    let options = CircuitStartOptions::builder()
        .name("example")
        .max_retries(5)
        .retry_interval(Duration::from_millis(200))
        .on_state_transition(|from, to| println!("state: {from} -> {to}"))
        .on_attempt(|attempt, delay| println!("attempt {attempt} in {delay:?}"))
        .on_attempt_failed(|attempt, error| println!("attempt {attempt} failed: {error}"))
        .build()?;

    let hangup = Arc::new(Notify::new());
    let initial = SimulatedChannel {
        open: true,
        hangup: Arc::clone(&hangup),
    };
    let manager = CircuitManager::new(options, connector, initial, "circuit-42");

    let opened = Arc::new(Notify::new());
    let signal = Arc::clone(&opened);
    manager.add_event_listener(CircuitEventType::Opened, move || signal.notify_one());

    let mut dialog = manager.default_reconnection_handler().dialog().subscribe();
    tokio::spawn(async move {
        while dialog.changed().await.is_ok() {
            let state = dialog.borrow_and_update().clone();
            println!("dialog {}: {:?}", state.dialog_id, state.visibility);
        }
    });

    println!("Dropping the connection...\n");
    hangup.notify_one();

    opened.notified().await;
    println!("\nCircuit resumed: {:?}", manager.snapshot());

    manager.disconnect();
    println!("After disconnect: {}", manager.state());

    Ok(())
}
