//! Background prober against real HTTP endpoints.

use crate::mock_infrastructure::{
    build_runtime, endpoint_health, service, service_with_liveness, test_config,
    RestMockBuilder, UNREACHABLE,
};
use std::time::Duration;
use waypoint_core::{runtime::WaypointRuntime, upstream::AttemptOutcome};

#[tokio::test]
async fn test_probe_round_hits_liveness_path_and_records_outcomes() {
    let mut node = RestMockBuilder::new().await;
    node.mock_liveness("/status", 1).await;

    let runtime = build_runtime(test_config(
        vec![service_with_liveness("node", &[node.url(), UNREACHABLE.to_string()], "/status")],
        vec![],
    ));

    let reports = runtime.prober().probe_all().await;

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].service, "node");
    assert_eq!(reports[0].healthy, 1);
    assert_eq!(reports[0].failed, 1);

    assert_eq!(endpoint_health(&runtime, "node", 0).total_successes, 1);
    assert_eq!(endpoint_health(&runtime, "node", 1).consecutive_failures, 1);
    assert_eq!(
        endpoint_health(&runtime, "node", 1).last_outcome,
        Some(AttemptOutcome::TransportError)
    );
    node.assert_all().await;
}

#[tokio::test]
async fn test_probe_success_lifts_quarantine() {
    let mut node = RestMockBuilder::new().await;
    node.mock_liveness("/", 1).await;

    let runtime = build_runtime(test_config(vec![service("node", &[node.url()])], vec![]));

    let svc = runtime.registry().service("node").unwrap();
    for _ in 0..3 {
        svc.endpoints()[0].record_failure(AttemptOutcome::HttpError, None, runtime.registry().policy());
    }
    assert!(endpoint_health(&runtime, "node", 0).quarantined);

    runtime.prober().probe_all().await;

    let health = endpoint_health(&runtime, "node", 0);
    assert!(!health.quarantined);
    assert_eq!(health.consecutive_failures, 0);
}

#[tokio::test]
async fn test_probe_failures_never_surface() {
    let runtime = build_runtime(test_config(
        vec![service("indexer", &[UNREACHABLE.to_string()])],
        vec![],
    ));

    for _ in 0..4 {
        let reports = runtime.prober().probe_all().await;
        assert_eq!(reports[0].failed, 1);
    }

    let health = endpoint_health(&runtime, "indexer", 0);
    assert!(health.quarantined);
    assert_eq!(health.total_failures, 4);
}

#[tokio::test]
async fn test_background_loop_probes_until_shutdown() {
    let mut node = RestMockBuilder::new().await;
    node.mock_liveness("/status", 1).await;

    let runtime = WaypointRuntime::builder()
        .with_config(test_config(
            vec![service_with_liveness("node", &[node.url()], "/status")],
            vec![],
        ))
        .enable_prober()
        .build()
        .unwrap();
    assert!(runtime.has_prober_task());

    let mut probed = false;
    for _ in 0..50 {
        if endpoint_health(&runtime, "node", 0).total_successes > 0 {
            probed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(probed, "first probe round should run without waiting for the interval");

    tokio::time::timeout(Duration::from_secs(5), runtime.shutdown())
        .await
        .expect("prober stops on shutdown");
    node.assert_all().await;
}
