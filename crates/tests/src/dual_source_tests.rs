//! Dual-source resolution between an indexer and a chain node.

use crate::mock_infrastructure::{
    build_runtime, pair, service, test_config, RestMockBuilder, UNREACHABLE,
};
use serde_json::{json, Value};
use std::sync::Arc;
use waypoint_core::{
    runtime::WaypointRuntime,
    types::ServiceRequest,
    upstream::{is_usable_json, non_empty_field, SourceKind, UpstreamError},
};

fn runtime_for(indexer: &RestMockBuilder, node: &RestMockBuilder) -> Arc<WaypointRuntime> {
    build_runtime(test_config(
        vec![service("indexer", &[indexer.url()]), service("node", &[node.url()])],
        vec![pair("txs", "indexer", "node")],
    ))
}

#[tokio::test]
async fn test_usable_fallback_beats_empty_primary() {
    let mut indexer = RestMockBuilder::new().await;
    indexer.mock_json("/txs", &json!({ "items": [] })).await;
    let mut node = RestMockBuilder::new().await;
    node.mock_json("/txs", &json!({ "items": [1, 2, 3] })).await;

    let runtime = runtime_for(&indexer, &node);
    let resolved = runtime
        .resolver()
        .resolve::<Value, _>("indexer", "node", &ServiceRequest::get("/txs"), is_usable_json)
        .await
        .unwrap();

    assert_eq!(resolved.source, SourceKind::Fallback);
    assert_eq!(resolved.value, json!({ "items": [1, 2, 3] }));
}

#[tokio::test]
async fn test_primary_answers_when_fallback_is_down() {
    let mut indexer = RestMockBuilder::new().await;
    indexer.mock_json("/txs", &json!({ "items": ["0xabc"] })).await;

    let runtime = build_runtime(test_config(
        vec![
            service("indexer", &[indexer.url()]),
            service("node", &[UNREACHABLE.to_string()]),
        ],
        vec![],
    ));
    let resolved = runtime
        .resolver()
        .resolve::<Value, _>("indexer", "node", &ServiceRequest::get("/txs"), is_usable_json)
        .await
        .unwrap();

    assert_eq!(resolved.source, SourceKind::Primary);
    assert_eq!(resolved.value["items"][0], "0xabc");
}

#[tokio::test]
async fn test_no_usable_source_when_both_are_empty_or_failing() {
    let mut indexer = RestMockBuilder::new().await;
    indexer.mock_json("/txs", &json!({ "items": [] })).await;
    let mut node = RestMockBuilder::new().await;
    node.mock_status("/txs", 502).await;

    let runtime = runtime_for(&indexer, &node);
    let err = runtime
        .resolver()
        .resolve::<Value, _>("indexer", "node", &ServiceRequest::get("/txs"), is_usable_json)
        .await
        .unwrap_err();

    assert!(matches!(err, UpstreamError::NoUsableSource { .. }));
    assert!(err.is_exhausted());
}

#[tokio::test]
async fn test_split_requests_with_field_predicate() {
    let mut indexer = RestMockBuilder::new().await;
    indexer.mock_json("/v1/account/txs", &json!({ "result": { "txs": [] } })).await;
    let mut node = RestMockBuilder::new().await;
    node.mock_json(
        "/cosmos/tx/v1beta1/txs",
        &json!({ "result": { "txs": [{ "hash": "AB12" }] }, "pagination": null }),
    )
    .await;

    let runtime = runtime_for(&indexer, &node);
    let resolved = runtime
        .resolver()
        .resolve_split::<Value, _>(
            "indexer",
            &ServiceRequest::get("/v1/account/txs"),
            "node",
            &ServiceRequest::get("/cosmos/tx/v1beta1/txs?events=transfer"),
            non_empty_field("result/txs"),
        )
        .await
        .unwrap();

    assert_eq!(resolved.source, SourceKind::Fallback);
    assert_eq!(resolved.value["result"]["txs"][0]["hash"], "AB12");
}

#[tokio::test]
async fn test_configured_pair_resolves_through_cache() {
    let mut indexer = RestMockBuilder::new().await;
    indexer.mock_json_expect("/txs", &json!({ "items": [7] }), 1).await;
    let mut node = RestMockBuilder::new().await;
    node.mock_json("/txs", &json!({ "items": [] })).await;

    let runtime = runtime_for(&indexer, &node);

    let first = runtime.resolve_pair("txs", "/txs").await.unwrap();
    assert_eq!(first.value().origin, "primary");
    let body: Value = serde_json::from_slice(&first.value().body).unwrap();
    assert_eq!(body["items"][0], 7);

    let second = runtime.resolve_pair("txs", "/txs").await.unwrap();
    assert_eq!(second.value().origin, "primary");

    indexer.assert_all().await;
}
