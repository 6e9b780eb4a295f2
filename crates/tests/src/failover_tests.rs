//! Executor failover against real HTTP endpoints.
//!
//! Covers the health contract end to end: a failing endpoint is skipped in
//! favour of a healthy one, accumulates failures until quarantined, and a
//! fully quarantined service still gets attempted.

use crate::mock_infrastructure::{
    blocks_payload, build_runtime, endpoint_health, service, test_config, RestMockBuilder,
    UNREACHABLE,
};
use serde_json::Value;
use waypoint_core::{types::ServiceRequest, upstream::UpstreamError};

#[tokio::test]
async fn test_second_endpoint_answers_when_first_refuses() {
    let mut healthy = RestMockBuilder::new().await;
    healthy.mock_json("/blocks", &blocks_payload(&[1, 2])).await;

    let runtime = build_runtime(test_config(
        vec![service("indexer", &[UNREACHABLE.to_string(), healthy.url()])],
        vec![],
    ));

    let body: Value = runtime
        .executor()
        .execute_json("indexer", &ServiceRequest::get("/blocks"))
        .await
        .expect("failover to second endpoint");

    assert_eq!(body, blocks_payload(&[1, 2]));
    assert_eq!(endpoint_health(&runtime, "indexer", 0).consecutive_failures, 1);
    assert_eq!(endpoint_health(&runtime, "indexer", 1).consecutive_failures, 0);
    assert_eq!(endpoint_health(&runtime, "indexer", 1).total_successes, 1);
}

#[tokio::test]
async fn test_repeated_calls_quarantine_failing_endpoint() {
    let mut healthy = RestMockBuilder::new().await;
    healthy.mock_json("/blocks", &blocks_payload(&[1, 2])).await;

    let runtime = build_runtime(test_config(
        vec![service("indexer", &[UNREACHABLE.to_string(), healthy.url()])],
        vec![],
    ));

    for _ in 0..8 {
        let body: Value = runtime
            .executor()
            .execute_json("indexer", &ServiceRequest::get("/blocks"))
            .await
            .expect("healthy endpoint always answers");
        assert_eq!(body, blocks_payload(&[1, 2]));
    }

    let dead = endpoint_health(&runtime, "indexer", 0);
    assert!(dead.quarantined);
    assert_eq!(dead.consecutive_failures, 3);
    assert!(dead.last_error.is_some());

    let alive = endpoint_health(&runtime, "indexer", 1);
    assert_eq!(alive.consecutive_failures, 0);
    assert_eq!(alive.total_successes, 8);
    assert!(alive.smoothed_latency_ms.is_some());
    assert!(runtime.health_snapshot().all_services_available());
}

#[tokio::test]
async fn test_http_error_is_reported_when_every_endpoint_fails() {
    let mut broken = RestMockBuilder::new().await;
    broken.mock_status("/blocks", 503).await;

    let runtime = build_runtime(test_config(vec![service("node", &[broken.url()])], vec![]));

    let err = runtime
        .executor()
        .execute("node", &ServiceRequest::get("/blocks"))
        .await
        .expect_err("single endpoint returns 503");

    assert!(err.is_exhausted());
    assert_eq!(err.status(), Some(503));
    match err {
        UpstreamError::AllEndpointsFailed { service, attempts, .. } => {
            assert_eq!(service, "node");
            assert_eq!(attempts, 1);
        }
        other => panic!("expected AllEndpointsFailed, got {other:?}"),
    }
    assert_eq!(endpoint_health(&runtime, "node", 0).consecutive_failures, 1);
}

#[tokio::test]
async fn test_fully_quarantined_service_is_still_attempted() {
    let mut flaky = RestMockBuilder::new().await;
    flaky.mock_status("/blocks", 500).await;

    let runtime = build_runtime(test_config(
        vec![service("indexer", &[flaky.url(), UNREACHABLE.to_string()])],
        vec![],
    ));
    let request = ServiceRequest::get("/blocks");

    for _ in 0..3 {
        let err = runtime.executor().execute("indexer", &request).await.unwrap_err();
        assert!(matches!(err, UpstreamError::AllEndpointsFailed { attempts: 2, .. }));
    }
    assert!(endpoint_health(&runtime, "indexer", 0).quarantined);
    assert!(endpoint_health(&runtime, "indexer", 1).quarantined);
    assert!(!runtime.health_snapshot().all_services_available());

    flaky.reset().await;
    flaky.mock_json("/blocks", &blocks_payload(&[9])).await;

    let body: Value = runtime
        .executor()
        .execute_json("indexer", &request)
        .await
        .expect("global reset lets the recovered endpoint answer");
    assert_eq!(body, blocks_payload(&[9]));
    assert_eq!(endpoint_health(&runtime, "indexer", 0).consecutive_failures, 0);
}

#[tokio::test]
async fn test_unknown_service_is_rejected_without_network() {
    let runtime = build_runtime(test_config(vec![service("node", &[UNREACHABLE.to_string()])], vec![]));

    let err = runtime.executor().execute("prices", &ServiceRequest::get("/spot")).await.unwrap_err();

    assert!(matches!(err, UpstreamError::UnknownService(name) if name == "prices"));
    assert_eq!(endpoint_health(&runtime, "node", 0).total_failures, 0);
}
