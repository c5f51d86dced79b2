//! Frames flowing from an open stream into the published snapshot.

mod common;

use std::sync::Arc;
use std::time::Duration;

use benchscope::stream::{BackoffPolicy, ConnectionState};
use benchscope::adapters::MockSessionHandle;
use common::*;

async fn open_stream() -> (
    benchscope::adapters::MockTransport,
    benchscope::stream::Subscription,
    MockSessionHandle,
) {
    let (transport, client) = harness();
    let subscription = client.subscribe(ENDPOINT, BackoffPolicy::default());
    wait_for_state(&subscription, |s| s.is_open()).await;
    let session = transport.session(0).unwrap();
    (transport, subscription, session)
}

#[tokio::test(start_paused = true)]
async fn test_fields_merge_independently() {
    let (_transport, subscription, session) = open_stream().await;

    session.send_text(metrics_frame(r#"{"cpu_usage": 42}"#));
    session.send_text(metrics_frame(
        r#"{"gpu_metrics": [{"gpu_utilization": 80, "gpu_memory_used": 12, "gpu_memory_total": 24, "gpu_temp": 66, "power_draw": 310}]}"#,
    ));

    let snapshot = wait_for_snapshot(&subscription, |s| s.version == 2).await;
    assert_eq!(snapshot.cpu_usage, Some(42.0));
    assert_eq!(snapshot.gpu_metrics.len(), 1);
    assert_eq!(snapshot.gpu_metrics[0].gpu_utilization, 80.0);
    assert_eq!(snapshot.gpu_metrics[0].memory_used_percent(), Some(50.0));
    assert_eq!(snapshot.average_gpu_utilization(), Some(80.0));
}

#[tokio::test(start_paused = true)]
async fn test_accelerator_list_replaced_wholesale() {
    let (_transport, subscription, session) = open_stream().await;

    session.send_text(metrics_frame(
        r#"{"gpu_metrics": [{"gpu_utilization": 10}, {"gpu_utilization": 20}]}"#,
    ));
    session.send_text(metrics_frame(r#"{"gpu_metrics": [{"gpu_utilization": 90}]}"#));

    let snapshot = wait_for_snapshot(&subscription, |s| s.version == 2).await;
    assert_eq!(snapshot.accelerator_count(), 1);
    assert_eq!(snapshot.gpu_metrics[0].gpu_utilization, 90.0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_type_changes_nothing() {
    let (_transport, subscription, session) = open_stream().await;
    session.send_text(metrics_frame(r#"{"cpu_usage": 42}"#));
    let before = wait_for_snapshot(&subscription, |s| s.version == 1).await;

    let mut snapshots = subscription.watch_snapshot();
    snapshots.borrow_and_update();
    let mut states = subscription.watch_state();
    states.borrow_and_update();

    session.send_text(r#"{"type":"unknown_type","payload":{"cpu_usage": 99}}"#);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!snapshots.has_changed().unwrap());
    assert!(!states.has_changed().unwrap());
    assert!(Arc::ptr_eq(&before, &subscription.snapshot().unwrap()));
    assert_eq!(subscription.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_are_dropped() {
    let (_transport, subscription, session) = open_stream().await;

    session.send_text("not json at all");
    session.send_text(r#"{"payload": {"cpu_usage": 1}}"#);
    session.send_text(r#"{"type": "metrics_update", "payload": 5}"#);
    session.send_binary(vec![0, 1, 2]);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(subscription.snapshot().is_none());
    assert!(subscription.is_connected());

    session.send_text(metrics_frame(r#"{"memory_used": 8, "memory_total": 32}"#));
    let snapshot = wait_for_snapshot(&subscription, |_| true).await;
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.memory_used_percent(), Some(25.0));
}

#[tokio::test(start_paused = true)]
async fn test_wrong_typed_field_is_ignored() {
    let (_transport, subscription, session) = open_stream().await;

    session.send_text(metrics_frame(r#"{"cpu_usage": 30, "gpu_temp": 70}"#));
    session.send_text(metrics_frame(r#"{"cpu_usage": "high", "gpu_temp": 75}"#));

    let snapshot = wait_for_snapshot(&subscription, |s| s.version == 2).await;
    assert_eq!(snapshot.cpu_usage, Some(30.0));
    assert_eq!(snapshot.gpu_temp, Some(75.0));
}

#[tokio::test(start_paused = true)]
async fn test_dashboard_layout_frames() {
    let (_transport, subscription, session) = open_stream().await;

    session.send_text(
        r#"{"type":"metrics_update","timestamp":"2024-05-01T08:00:00.000000","metrics":{"tokens_per_second":120.5,"latency":0.8}}"#,
    );
    let snapshot = wait_for_snapshot(&subscription, |_| true).await;
    assert_eq!(snapshot.tokens_per_second, Some(120.5));
    assert_eq!(snapshot.history.len(), 1);
    let sample = snapshot.history.latest().unwrap();
    assert_eq!(sample.timestamp.to_rfc3339(), "2024-05-01T08:00:00+00:00");
}

#[tokio::test(start_paused = true)]
async fn test_history_grows_per_throughput_frame() {
    let (_transport, subscription, session) = open_stream().await;

    for tps in [100, 200, 300] {
        session.send_text(metrics_frame(&format!(r#"{{"tokens_per_second": {}}}"#, tps)));
    }
    session.send_text(metrics_frame(r#"{"cpu_usage": 5}"#));

    let snapshot = wait_for_snapshot(&subscription, |s| s.version == 4).await;
    assert_eq!(snapshot.history.len(), 3);
    assert_eq!(snapshot.history.average_tokens_per_second(), Some(200.0));
    assert_eq!(snapshot.history.peak_tokens_per_second(), Some(300.0));
}

#[tokio::test(start_paused = true)]
async fn test_server_history_replaces_local_samples() {
    let (_transport, subscription, session) = open_stream().await;

    session.send_text(metrics_frame(r#"{"tokens_per_second": 999}"#));
    session.send_text(metrics_frame(
        r#"{
            "tokens_per_second": 130,
            "historical": [
                {"timestamp": "2024-03-01T12:30:00", "tokens_per_second": 110, "latency": 41},
                {"timestamp": null, "tokens_per_second": 500},
                {"timestamp": "2024-03-01T12:30:05", "tokens_per_second": 130, "latency": 39}
            ]
        }"#,
    ));

    let snapshot = wait_for_snapshot(&subscription, |s| s.version == 2).await;
    let tps: Vec<Option<f64>> = snapshot.history.iter().map(|s| s.tokens_per_second).collect();
    assert_eq!(tps, vec![Some(110.0), Some(130.0)]);
    assert_eq!(snapshot.history.average_latency(), Some(40.0));
    assert_eq!(snapshot.tokens_per_second, Some(130.0));

    // Later frames without a series keep appending locally.
    session.send_text(metrics_frame(r#"{"tokens_per_second": 150}"#));
    let snapshot = wait_for_snapshot(&subscription, |s| s.version == 3).await;
    assert_eq!(snapshot.history.len(), 3);
    assert_eq!(snapshot.history.latest().unwrap().tokens_per_second, Some(150.0));
}

#[tokio::test(start_paused = true)]
async fn test_benchmark_progress_merges() {
    let (_transport, subscription, session) = open_stream().await;

    session.send_text(progress_frame(r#"{"completed": 5, "total": 20}"#));
    session.send_text(progress_frame(r#"{"completed": 10, "current_tps": 88.0}"#));

    let snapshot = wait_for_snapshot(&subscription, |s| s.version == 2).await;
    let progress = snapshot.progress.as_ref().unwrap();
    assert_eq!(progress.completed, 10);
    assert_eq!(progress.total, 20);
    assert_eq!(progress.current_tps, 88.0);
    assert_eq!(progress.percent_complete(), 50.0);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_survives_reconnect() {
    let (transport, subscription, session) = open_stream().await;
    session.send_text(metrics_frame(r#"{"cpu_usage": 42}"#));
    wait_for_snapshot(&subscription, |s| s.version == 1).await;

    session.drop_connection();
    wait_for_state(&subscription, |s| s.is_pending()).await;
    assert_eq!(subscription.snapshot().unwrap().cpu_usage, Some(42.0));

    wait_for_state(&subscription, |s| s.is_open()).await;
    transport
        .session(1)
        .unwrap()
        .send_text(metrics_frame(r#"{"gpu_temp": 70}"#));
    let snapshot = wait_for_snapshot(&subscription, |s| s.version == 2).await;
    assert_eq!(snapshot.cpu_usage, Some(42.0));
    assert_eq!(snapshot.gpu_temp, Some(70.0));
}

#[tokio::test(start_paused = true)]
async fn test_history_capacity_from_client() {
    let (transport, client) = harness();
    let client = client.with_history_capacity(2);
    let subscription = client.subscribe(ENDPOINT, BackoffPolicy::default());
    wait_for_state(&subscription, |s| s.is_open()).await;
    let session = transport.session(0).unwrap();

    for tps in [1, 2, 3] {
        session.send_text(metrics_frame(&format!(r#"{{"tokens_per_second": {}}}"#, tps)));
    }
    let snapshot = wait_for_snapshot(&subscription, |s| s.version == 3).await;
    let kept: Vec<Option<f64>> = snapshot.history.iter().map(|s| s.tokens_per_second).collect();
    assert_eq!(kept, vec![Some(2.0), Some(3.0)]);
}
