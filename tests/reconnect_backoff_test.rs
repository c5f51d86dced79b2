//! Reconnection behaviour against a scripted transport.
//!
//! All tests run on a paused clock, so backoff delays elapse instantly while
//! `tokio::time::Instant` still reports the virtual time that passed.

mod common;

use std::sync::Arc;
use std::time::Duration;

use benchscope::adapters::{ConnectOutcome, TungsteniteTransport};
use benchscope::stream::{BackoffPolicy, ConnectionState, TelemetryClient, RETRIES_EXHAUSTED};
use common::*;
use tokio::time::Instant;

fn retrying(attempt: u32) -> impl FnMut(&ConnectionState) -> bool {
    move |state: &ConnectionState| matches!(state, ConnectionState::Retrying { attempt: a, .. } if *a == attempt)
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_connects_and_opens() {
    let (transport, client) = harness();
    let subscription = client.subscribe(ENDPOINT, BackoffPolicy::default());
    assert_eq!(subscription.state(), ConnectionState::Connecting);

    wait_for_state(&subscription, |s| s.is_open()).await;
    assert!(subscription.is_connected());
    assert_eq!(transport.endpoints(), vec![ENDPOINT.to_string()]);
    assert!(subscription.snapshot().is_none());
    assert!(subscription.last_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_failures_back_off_exponentially() {
    let (transport, client) = harness();
    transport.refuse_next(3);
    let started = Instant::now();
    let subscription = client.subscribe(ENDPOINT, BackoffPolicy::default());

    let mut delays = Vec::new();
    for attempt in 1..=3 {
        let state = wait_for_state(&subscription, retrying(attempt)).await;
        delays.push(retry_delay(&state));
    }
    assert_eq!(
        delays,
        vec![
            Duration::from_millis(2000),
            Duration::from_millis(4000),
            Duration::from_millis(8000)
        ]
    );

    wait_for_state(&subscription, |s| s.is_open()).await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(14), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(14_100), "elapsed {:?}", elapsed);
    assert_eq!(transport.connect_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_last_error_tracks_failures_and_clears_on_open() {
    let (transport, client) = harness();
    transport.refuse_next(1);
    let subscription = client.subscribe(ENDPOINT, BackoffPolicy::default());

    wait_for_state(&subscription, retrying(1)).await;
    assert_eq!(
        subscription.last_error().as_deref(),
        Some("Failed to create WebSocket connection")
    );

    wait_for_state(&subscription, |s| s.is_open()).await;
    assert!(subscription.last_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_ceiling_reaches_failed_and_stops() {
    let (transport, client) = harness();
    transport.refuse_next(5);
    let subscription = client.subscribe(ENDPOINT, BackoffPolicy::default());

    // The fifth failure still schedules a retry; the ceiling applies when it
    // comes due.
    let mut last_retry = retrying(5);
    let state = wait_for_state(&subscription, |s| s.is_failed() || last_retry(s)).await;
    assert!(
        matches!(state, ConnectionState::Retrying { attempt: 5, .. }),
        "Expected Retrying before Failed, got {:?}",
        state
    );
    assert_ne!(subscription.last_error().as_deref(), Some(RETRIES_EXHAUSTED));

    let state = wait_for_state(&subscription, |s| s.is_failed()).await;
    match state {
        ConnectionState::Failed { reason } => {
            assert!(reason.starts_with("gave up after 5 consecutive failures"));
        }
        other => panic!("Expected Failed, got {:?}", other),
    }
    assert_eq!(transport.connect_count(), 5);
    assert_eq!(subscription.last_error().as_deref(), Some(RETRIES_EXHAUSTED));

    // No automatic retries once failed.
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(transport.connect_count(), 5);
    assert!(subscription.state().is_failed());
}

#[tokio::test(start_paused = true)]
async fn test_manual_reconnect_from_failed() {
    let (transport, client) = harness();
    transport.refuse_next(2);
    let policy = BackoffPolicy::default().with_max_attempts(2);
    let subscription = client.subscribe(ENDPOINT, policy);
    wait_for_state(&subscription, |s| s.is_failed()).await;

    subscription.reconnect();
    wait_for_state(&subscription, |s| s.is_open()).await;
    assert_eq!(transport.connect_count(), 3);
    assert!(subscription.last_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_success_resets_backoff() {
    let (transport, client) = harness();
    transport.refuse_next(3);
    let subscription = client.subscribe(ENDPOINT, BackoffPolicy::default());
    wait_for_state(&subscription, |s| s.is_open()).await;

    transport.session(0).unwrap().drop_connection();
    let state = wait_for_state(&subscription, |s| !s.is_open()).await;
    match state {
        ConnectionState::Retrying { attempt, delay, .. } => {
            assert_eq!(attempt, 1);
            assert_eq!(delay, Duration::from_millis(2000));
        }
        other => panic!("Expected Retrying, got {:?}", other),
    }

    wait_for_state(&subscription, |s| s.is_open()).await;
    assert_eq!(transport.session_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stream_error_after_open_retries() {
    let (transport, client) = harness();
    let subscription = client.subscribe(ENDPOINT, BackoffPolicy::default());
    wait_for_state(&subscription, |s| s.is_open()).await;

    transport.session(0).unwrap().fail("connection reset by peer");
    wait_for_state(&subscription, retrying(1)).await;
    assert_eq!(
        subscription.last_error().as_deref(),
        Some("WebSocket connection error")
    );
    assert!(transport.session(0).unwrap().is_released());
}

#[tokio::test(start_paused = true)]
async fn test_fixed_policy_uses_constant_delay() {
    let (transport, client) = harness();
    transport.refuse_next(3);
    let subscription = client.subscribe(ENDPOINT, BackoffPolicy::fixed(Duration::from_millis(750)));

    for attempt in 1..=3 {
        let state = wait_for_state(&subscription, retrying(attempt)).await;
        assert_eq!(retry_delay(&state), Duration::from_millis(750));
    }
    wait_for_state(&subscription, |s| s.is_open()).await;
}

#[tokio::test(start_paused = true)]
async fn test_delays_respect_cap() {
    let (transport, client) = harness();
    transport.refuse_next(4);
    let policy = BackoffPolicy::exponential(
        Duration::from_millis(2000),
        2.0,
        Duration::from_millis(5000),
    )
    .with_max_attempts(10);
    let subscription = client.subscribe(ENDPOINT, policy);

    let mut delays = Vec::new();
    for attempt in 1..=4 {
        let state = wait_for_state(&subscription, retrying(attempt)).await;
        delays.push(retry_delay(&state).as_millis());
    }
    assert_eq!(delays, vec![2000, 4000, 5000, 5000]);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_while_retrying_skips_the_wait() {
    let (transport, client) = harness();
    transport.refuse_next(1);
    let subscription = client.subscribe(ENDPOINT, BackoffPolicy::default());
    wait_for_state(&subscription, retrying(1)).await;

    let started = Instant::now();
    subscription.reconnect();
    wait_for_state(&subscription, |s| s.is_open()).await;
    assert!(started.elapsed() < Duration::from_millis(2000));
    assert_eq!(transport.connect_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_is_noop_while_open() {
    let (transport, client) = harness();
    let subscription = client.subscribe(ENDPOINT, BackoffPolicy::default());
    wait_for_state(&subscription, |s| s.is_open()).await;

    subscription.reconnect();
    settle().await;
    assert!(subscription.is_connected());
    assert_eq!(transport.connect_count(), 1);
    assert!(!transport.session(0).unwrap().is_released());
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_is_noop_while_connecting() {
    let (transport, client) = harness();
    transport.push_outcome(ConnectOutcome::Hang);
    let subscription = client.subscribe(ENDPOINT, BackoffPolicy::default());
    settle().await;

    subscription.reconnect();
    settle().await;
    assert_eq!(subscription.state(), ConnectionState::Connecting);
    assert_eq!(transport.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_endpoint_fails_without_retrying() {
    let client = TelemetryClient::new(Arc::new(TungsteniteTransport::new()));
    let subscription = client.subscribe("http://localhost:7000/metrics", BackoffPolicy::default());

    let state = wait_for_state(&subscription, |s| s.is_failed()).await;
    match state {
        ConnectionState::Failed { reason } => assert!(reason.contains("http://localhost:7000")),
        other => panic!("Expected Failed, got {:?}", other),
    }
    assert!(subscription
        .last_error()
        .unwrap()
        .contains("not a valid WebSocket URL"));
}
