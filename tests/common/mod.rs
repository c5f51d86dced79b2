//! Common test utilities for integration tests.
//!
//! # Example
//!
//! ```ignore
//! let (transport, client) = harness();
//! let subscription = client.subscribe(ENDPOINT, BackoffPolicy::default());
//! let state = wait_for_state(&subscription, |s| s.is_open()).await;
//! ```

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use benchscope::adapters::MockTransport;
use benchscope::metrics::MetricsSnapshot;
use benchscope::stream::{ConnectionState, Subscription, TelemetryClient};

pub const ENDPOINT: &str = "ws://localhost:7000/metrics";

/// Virtual time a test may wait before it is considered hung.
pub const WAIT_LIMIT: Duration = Duration::from_secs(600);

/// Scripted transport plus a client that uses it.
pub fn harness() -> (MockTransport, TelemetryClient) {
    let transport = MockTransport::new();
    let client = TelemetryClient::new(Arc::new(transport.clone()));
    (transport, client)
}

pub fn metrics_frame(payload: &str) -> String {
    format!(r#"{{"type":"metrics_update","payload":{}}}"#, payload)
}

pub fn progress_frame(payload: &str) -> String {
    format!(r#"{{"type":"benchmark_progress","payload":{}}}"#, payload)
}

/// Wait until the subscription's state satisfies `predicate`.
pub async fn wait_for_state(
    subscription: &Subscription,
    predicate: impl FnMut(&ConnectionState) -> bool,
) -> ConnectionState {
    let mut view = subscription.view();
    tokio::time::timeout(WAIT_LIMIT, view.wait_for_state(predicate))
        .await
        .expect("timed out waiting for state")
        .expect("subscription closed")
}

/// Wait until a published snapshot satisfies `predicate`.
pub async fn wait_for_snapshot(
    subscription: &Subscription,
    mut predicate: impl FnMut(&MetricsSnapshot) -> bool,
) -> Arc<MetricsSnapshot> {
    let mut rx = subscription.watch_snapshot();
    let snapshot = tokio::time::timeout(
        WAIT_LIMIT,
        rx.wait_for(|snapshot| snapshot.as_deref().is_some_and(&mut predicate)),
    )
    .await
    .expect("timed out waiting for snapshot")
    .expect("subscription closed");
    snapshot.clone().expect("predicate matched a snapshot")
}

/// Let spawned tasks run without advancing the clock meaningfully.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub fn retry_delay(state: &ConnectionState) -> Duration {
    match state {
        ConnectionState::Retrying { delay, .. } => *delay,
        other => panic!("Expected Retrying, got {:?}", other),
    }
}
