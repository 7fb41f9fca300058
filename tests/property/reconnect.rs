//! Property tests for the reconnection sequence.
//!
//! Invariants tested:
//! - Continuous failure makes exactly `max_retries` attempts
//! - Attempts are spaced by at least the retry interval
//! - `on_connection_down` fires once per loss event
//! - `on_connection_up` fires iff the sequence succeeds

use crate::common::*;
use circuit_resilience_reconnect::{CircuitState, MAX_FIRST_RETRY_INTERVAL, TransportError};
use proptest::prelude::*;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::time::Instant;

fn paused_runtime() -> Runtime {
    Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: continuous failure ends in Disconnected after exactly n attempts
    #[test]
    fn exhausts_after_exactly_max_retries(
        max_retries in 1u32..=10,
        interval_ms in 0u64..5_000,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let interval = Duration::from_millis(interval_ms);
            let host = MockHost::new();
            let log = Log::default();
            let manager = start(&host, recording_options(max_retries, interval, &log));

            let lost_at = Instant::now();
            host.drop_connection();
            wait_for(&manager, CircuitState::Disconnected).await;
            tokio::time::sleep(interval * 2 + Duration::from_secs(1)).await;

            assert_eq!(host.connects(), max_retries as usize);
            assert_eq!(log.count("down:connection reset"), 1);
            assert_eq!(log.count("failed"), 1);
            assert_eq!(log.count("observer:closed"), 1);
            assert_eq!(log.count("up"), 0);

            let times = host.connect_times();
            assert!(times[0] - lost_at >= interval.min(MAX_FIRST_RETRY_INTERVAL));
            for pair in times.windows(2) {
                assert!(pair[1] - pair[0] >= interval);
            }
        });
    }

    /// Property: k failures followed by a success resumes on attempt k + 1
    #[test]
    fn resumes_after_k_failures(
        (max_retries, failures) in (1u32..=10).prop_flat_map(|n| (Just(n), 0..n)),
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let host = MockHost::new()
                .with_script((0..failures).map(|_| Step::Refuse))
                .with_fallback(Step::Accept);
            let log = Log::default();
            let manager = start(&host, recording_options(max_retries, Duration::from_millis(250), &log));

            host.drop_connection();
            wait_for(&manager, CircuitState::Connected).await;

            assert_eq!(host.connects(), failures as usize + 1);
            assert_eq!(manager.snapshot().attempts, failures + 1);
            assert_eq!(log.count("down:connection reset"), 1);
            assert_eq!(log.count("up"), 1);
            assert_eq!(log.count("observer:opened"), 1);
            assert_eq!(log.count("observer:closed"), 0);
        });
    }

    /// Property: extra loss signals during a sequence never add a down callback
    #[test]
    fn extra_loss_signals_are_coalesced(
        max_retries in 1u32..=5,
        extra_signals in 0usize..5,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let host = MockHost::new();
            let log = Log::default();
            let manager = start(&host, recording_options(max_retries, Duration::from_millis(100), &log));

            host.drop_connection();
            settle().await;
            for _ in 0..extra_signals {
                manager.connection_lost(Some(TransportError::closed("duplicate")));
            }
            wait_for(&manager, CircuitState::Disconnected).await;

            assert_eq!(log.count("down:connection reset"), 1);
            assert_eq!(log.count("down:duplicate"), 0);
            assert_eq!(host.connects(), max_retries as usize);
        });
    }
}
