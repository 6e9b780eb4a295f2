//! Stale-while-revalidate over a live endpoint.
//!
//! Uses a one second freshness window and real time.

use crate::mock_infrastructure::{blocks_payload, build_runtime, service, test_config, RestMockBuilder};
use serde_json::Value;
use std::time::Duration;
use waypoint_core::{
    cache::{CachedBody, Lookup},
    metrics::CacheStatus,
    runtime::WaypointRuntime,
    types::ServiceRequest,
};

const PAST_FRESH_WINDOW: Duration = Duration::from_millis(1_100);

fn body_of(lookup: &Lookup<CachedBody>) -> Value {
    serde_json::from_slice(&lookup.value().body).unwrap()
}

async fn wait_for_refresh(runtime: &WaypointRuntime, key: &str) {
    for _ in 0..100 {
        if !runtime.revalidator().is_refreshing(key) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("refresh of {key} did not finish");
}

#[tokio::test]
async fn test_stale_entry_is_served_then_refreshed() {
    let mut indexer = RestMockBuilder::new().await;
    indexer.mock_json_expect("/blocks/latest", &blocks_payload(&[1]), 1).await;

    let runtime = build_runtime(test_config(vec![service("indexer", &[indexer.url()])], vec![]));
    let request = ServiceRequest::get("/blocks/latest");
    let key = request.cache_key("indexer");

    let first = runtime.fetch_cached("indexer", &request).await.unwrap();
    assert_eq!(first.status(), CacheStatus::Miss);

    let second = runtime.fetch_cached("indexer", &request).await.unwrap();
    assert_eq!(second.status(), CacheStatus::Fresh);
    indexer.assert_all().await;

    indexer.reset().await;
    indexer.mock_json("/blocks/latest", &blocks_payload(&[2])).await;
    tokio::time::sleep(PAST_FRESH_WINDOW).await;

    let stale = runtime.fetch_cached("indexer", &request).await.unwrap();
    assert_eq!(stale.status(), CacheStatus::Stale);
    assert_eq!(body_of(&stale), blocks_payload(&[1]));

    wait_for_refresh(&runtime, &key).await;

    let refreshed = runtime.fetch_cached("indexer", &request).await.unwrap();
    assert_eq!(refreshed.status(), CacheStatus::Fresh);
    assert_eq!(body_of(&refreshed), blocks_payload(&[2]));
}

#[tokio::test]
async fn test_failed_refresh_keeps_serving_stale_entry() {
    let mut indexer = RestMockBuilder::new().await;
    indexer.mock_json("/blocks/latest", &blocks_payload(&[1])).await;

    let runtime = build_runtime(test_config(vec![service("indexer", &[indexer.url()])], vec![]));
    let request = ServiceRequest::get("/blocks/latest");
    let key = request.cache_key("indexer");

    runtime.fetch_cached("indexer", &request).await.unwrap();

    indexer.reset().await;
    indexer.mock_status("/blocks/latest", 500).await;
    tokio::time::sleep(PAST_FRESH_WINDOW).await;

    let stale = runtime.fetch_cached("indexer", &request).await.unwrap();
    assert_eq!(stale.status(), CacheStatus::Stale);
    wait_for_refresh(&runtime, &key).await;

    let again = runtime.fetch_cached("indexer", &request).await.unwrap();
    assert!(matches!(again, Lookup::Stale(_)));
    assert_eq!(body_of(&again), blocks_payload(&[1]));
    assert!(runtime.cache().stats().refresh_failures >= 1);
}

#[tokio::test]
async fn test_error_surfaces_only_without_cached_value() {
    let mut indexer = RestMockBuilder::new().await;
    indexer.mock_status("/blocks/latest", 503).await;

    let runtime = build_runtime(test_config(vec![service("indexer", &[indexer.url()])], vec![]));
    let request = ServiceRequest::get("/blocks/latest");

    let err = runtime.fetch_cached("indexer", &request).await.unwrap_err();
    assert!(err.is_exhausted());
    assert!(runtime.cache().get(&request.cache_key("indexer")).is_none());
}

#[tokio::test]
async fn test_distinct_paths_are_cached_separately() {
    let mut indexer = RestMockBuilder::new().await;
    indexer.mock_json_expect("/blocks/1", &blocks_payload(&[1]), 1).await;
    indexer.mock_json_expect("/blocks/2", &blocks_payload(&[2]), 1).await;

    let runtime = build_runtime(test_config(vec![service("indexer", &[indexer.url()])], vec![]));

    for _ in 0..2 {
        let one = runtime.fetch_cached("indexer", &ServiceRequest::get("/blocks/1")).await.unwrap();
        let two = runtime.fetch_cached("indexer", &ServiceRequest::get("/blocks/2")).await.unwrap();
        assert_eq!(body_of(&one), blocks_payload(&[1]));
        assert_eq!(body_of(&two), blocks_payload(&[2]));
    }

    assert_eq!(runtime.cache().len(), 2);
    indexer.assert_all().await;
}
