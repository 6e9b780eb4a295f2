//! Runtime lifecycle: builder validation and shutdown coordination.

use crate::mock_infrastructure::{pair, service, test_config, UNREACHABLE};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::time::{timeout, Duration};
use waypoint_core::runtime::{RuntimeError, WaypointRuntime};

#[tokio::test]
async fn test_builder_rejects_pair_with_unknown_service() {
    let config = test_config(
        vec![service("indexer", &[UNREACHABLE.to_string()])],
        vec![pair("blocks", "indexer", "node")],
    );

    let result = WaypointRuntime::builder().with_config(config).build();

    match result {
        Err(RuntimeError::ConfigValidation(msg)) => assert!(msg.contains("node")),
        Err(other) => panic!("expected ConfigValidation, got {other}"),
        Ok(_) => panic!("expected ConfigValidation, got a runtime"),
    }
}

#[tokio::test]
async fn test_builder_rejects_invalid_endpoint_url() {
    let config = test_config(vec![service("indexer", &["ftp://indexer.example".to_string()])], vec![]);

    let result = WaypointRuntime::builder().with_config(config).build();
    assert!(matches!(result, Err(RuntimeError::ConfigValidation(_))));
}

#[tokio::test]
async fn test_all_shutdown_receivers_are_notified() {
    let runtime = WaypointRuntime::builder()
        .with_config(test_config(vec![service("indexer", &[UNREACHABLE.to_string()])], vec![]))
        .build()
        .unwrap();

    let notified = Arc::new(AtomicUsize::new(0));
    let mut tasks = Vec::new();
    for _ in 0..3 {
        let mut rx = runtime.shutdown_receiver();
        let notified = notified.clone();
        tasks.push(tokio::spawn(async move {
            if rx.recv().await.is_ok() {
                notified.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    runtime.shutdown().await;
    for task in tasks {
        timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }
    assert_eq!(notified.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_shutdown_stops_prober_even_when_endpoints_are_down() {
    let runtime = WaypointRuntime::builder()
        .with_config(test_config(vec![service("indexer", &[UNREACHABLE.to_string()])], vec![]))
        .enable_prober()
        .build()
        .unwrap();
    assert!(runtime.has_prober_task());

    tokio::time::sleep(Duration::from_millis(50)).await;

    timeout(Duration::from_secs(5), runtime.shutdown())
        .await
        .expect("shutdown completes while probes fail");
}
