//! Automatic reconnection sequences.

use super::common::*;
use circuit_resilience_reconnect::{
    CircuitStartOptions, CircuitState, ReconnectEvent, ResilienceEvent, TransportError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn starts_connected() {
    let host = MockHost::new();
    let log = Log::default();
    let manager = start(&host, recording_options(3, Duration::from_secs(1), &log));

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.state, CircuitState::Connected);
    assert_eq!(snapshot.circuit_id.as_str(), "circuit-1");
    assert_eq!(snapshot.generation, 0);
    assert!(snapshot.has_connection);
    assert!(log.entries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn continuous_failure_makes_exactly_max_retries_attempts() {
    let host = MockHost::new();
    let log = Log::default();
    let manager = start(&host, recording_options(3, Duration::from_millis(1000), &log));

    let lost_at = Instant::now();
    host.drop_connection();
    wait_for(&manager, CircuitState::Disconnected).await;

    // Nothing else happens afterwards.
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(host.connects(), 3);
    let times = host.connect_times();
    assert!(times[0] - lost_at >= Duration::from_millis(1000));
    for pair in times.windows(2) {
        assert!(
            pair[1] - pair[0] >= Duration::from_millis(1000),
            "attempts must be spaced by the retry interval"
        );
    }

    assert_eq!(
        log.entries(),
        vec![
            "down:connection reset",
            "attempt:1",
            "attempt:2",
            "attempt:3",
            "failed",
            "observer:closed",
        ]
    );
    assert_eq!(log.count("up"), 0);
    assert_eq!(manager.snapshot().attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn fail_once_then_succeed() {
    let host = MockHost::new().with_script([Step::Refuse, Step::Accept]);
    let log = Log::default();
    let manager = start(&host, recording_options(3, Duration::from_millis(1000), &log));

    host.drop_connection();
    wait_for(&manager, CircuitState::Connected).await;

    assert_eq!(host.connects(), 2);
    assert_eq!(host.resumes(), 1);
    assert_eq!(log.count("down:connection reset"), 1);
    assert_eq!(log.count("up"), 1);
    assert_eq!(log.count("observer:opened"), 1);
    assert_eq!(log.count("observer:closed"), 0);
    assert_eq!(
        log.entries(),
        vec![
            "down:connection reset",
            "attempt:1",
            "attempt:2",
            "up",
            "observer:opened",
        ]
    );

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.attempts, 2);
    assert!(snapshot.has_connection);
}

#[tokio::test(start_paused = true)]
async fn loss_while_reconnecting_is_coalesced() {
    let host = MockHost::new();
    let log = Log::default();
    let coalesced = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&coalesced);
    let options = recording_options(2, Duration::from_millis(500), &log).on_event(move |event| {
        if matches!(event, ReconnectEvent::LossCoalesced { .. }) {
            *counter.lock().unwrap() += 1;
        }
    });
    let manager = start(&host, options);

    host.drop_connection();
    settle().await;
    assert_eq!(manager.state(), CircuitState::Reconnecting);

    manager.connection_lost(Some(TransportError::closed("second signal")));
    manager.connection_lost(None);

    wait_for(&manager, CircuitState::Disconnected).await;

    assert_eq!(log.count("down:connection reset"), 1);
    assert_eq!(log.count("down:second signal"), 0);
    assert_eq!(host.connects(), 2);
    assert_eq!(*coalesced.lock().unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn loss_after_disconnect_is_ignored() {
    let host = MockHost::new();
    let log = Log::default();
    let manager = start(&host, recording_options(3, Duration::from_secs(1), &log));

    manager.disconnect();
    manager.connection_lost(Some(TransportError::closed("late signal")));
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(manager.state(), CircuitState::Disconnected);
    assert_eq!(host.connects(), 0);
    assert_eq!(log.entries(), vec!["observer:closed"]);
}

#[tokio::test(start_paused = true)]
async fn first_attempt_delay_is_capped() {
    let host = MockHost::new().with_fallback(Step::Accept);
    let log = Log::default();
    let manager = start(&host, recording_options(3, Duration::from_secs(20), &log));

    let lost_at = Instant::now();
    host.drop_connection();
    wait_for(&manager, CircuitState::Connected).await;

    let first = host.connect_times()[0] - lost_at;
    assert!(first >= Duration::from_secs(3));
    assert!(first < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn rejected_circuit_stops_the_sequence() {
    let host = MockHost::new().with_script([Step::Refuse, Step::Reject]);
    let log = Log::default();
    let manager = start(&host, recording_options(5, Duration::from_millis(100), &log));

    host.drop_connection();
    wait_for(&manager, CircuitState::Disconnected).await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(host.connects(), 2);
    assert_eq!(
        log.entries(),
        vec![
            "down:connection reset",
            "attempt:1",
            "attempt:2",
            "rejected",
            "observer:closed",
        ]
    );
    // The rejected connection is not kept.
    settle().await;
    assert_eq!(host.closes(), 1);
    assert!(!manager.snapshot().has_connection);
}

#[tokio::test(start_paused = true)]
async fn resumed_connection_is_watched() {
    let host = MockHost::new().with_fallback(Step::Accept);
    let log = Log::default();
    let manager = start(&host, recording_options(3, Duration::from_millis(100), &log));

    host.drop_connection();
    wait_for(&manager, CircuitState::Connected).await;

    host.drop_connection();
    settle().await;
    assert_eq!(manager.state(), CircuitState::Reconnecting);
    wait_for(&manager, CircuitState::Connected).await;

    assert_eq!(log.count("down:connection reset"), 2);
    assert_eq!(log.count("up"), 2);
    assert_eq!(log.count("observer:opened"), 2);
    assert_eq!(manager.snapshot().generation, 2);
}

#[tokio::test(start_paused = true)]
async fn custom_interval_can_end_the_sequence_early() {
    let host = MockHost::new();
    let log = Log::default();
    let options = CircuitStartOptions::builder()
        .max_retries(10)
        .retry_interval_policy(circuit_resilience_reconnect::RetryInterval::custom(
            |previous, _max| (previous < 2).then(|| Duration::from_millis(250)),
        ))
        .reconnection_handler(RecordingHandler(log.clone()));
    let manager = start(&host, options);

    host.drop_connection();
    wait_for(&manager, CircuitState::Disconnected).await;

    assert_eq!(host.connects(), 2);
    assert_eq!(log.count("failed"), 1);
}

#[tokio::test(start_paused = true)]
async fn lifecycle_events_follow_transitions() {
    let host = MockHost::new().with_script([Step::Refuse, Step::Accept]);
    let log = Log::default();
    let events = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&events);
    let options = recording_options(3, Duration::from_millis(100), &log).on_event(move |event| {
        assert_eq!(event.pattern_name(), "test");
        recorded.lock().unwrap().push(event.event_type());
    });
    let manager = start(&host, options);

    host.drop_connection();
    wait_for(&manager, CircuitState::Connected).await;

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "state_transition",
            "connection_lost",
            "attempt_started",
            "attempt_failed",
            "attempt_started",
            "state_transition",
            "reconnected",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn state_transition_callback_sees_each_change() {
    let host = MockHost::new();
    let log = Log::default();
    let transitions = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&transitions);
    let options = recording_options(1, Duration::from_millis(100), &log)
        .on_state_transition(move |from, to| recorded.lock().unwrap().push((from, to)));
    let manager = start(&host, options);

    host.drop_connection();
    wait_for(&manager, CircuitState::Disconnected).await;

    assert_eq!(
        *transitions.lock().unwrap(),
        vec![
            (CircuitState::Connected, CircuitState::Reconnecting),
            (CircuitState::Reconnecting, CircuitState::Disconnected),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn progress_callbacks_report_attempts() {
    let host = MockHost::new().with_script([Step::Refuse, Step::Refuse, Step::Accept]);
    let log = Log::default();
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let failures = Arc::new(Mutex::new(Vec::new()));
    let reconnected = Arc::new(Mutex::new(None));

    let (a, f, r) = (
        Arc::clone(&attempts),
        Arc::clone(&failures),
        Arc::clone(&reconnected),
    );
    let options = recording_options(5, Duration::from_secs(2), &log)
        .on_attempt(move |attempt, delay| a.lock().unwrap().push((attempt, delay)))
        .on_attempt_failed(move |attempt, error| {
            f.lock().unwrap().push((attempt, error.message().to_string()))
        })
        .on_reconnected(move |count| *r.lock().unwrap() = Some(count));
    let manager = start(&host, options);

    host.drop_connection();
    wait_for(&manager, CircuitState::Connected).await;

    assert_eq!(
        *attempts.lock().unwrap(),
        vec![
            (1, Duration::from_secs(2)),
            (2, Duration::from_secs(2)),
            (3, Duration::from_secs(2)),
        ]
    );
    assert_eq!(
        *failures.lock().unwrap(),
        vec![
            (1, "connection refused".to_string()),
            (2, "connection refused".to_string()),
        ]
    );
    assert_eq!(*reconnected.lock().unwrap(), Some(3));
}
