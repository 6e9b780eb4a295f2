//! The HTTP gateway end to end: router, middleware and runtime over mock endpoints.

use crate::mock_infrastructure::{
    blocks_payload, build_runtime, pair, service, test_config, RestMockBuilder, UNREACHABLE,
};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use mockito::Matcher;
use serde_json::{json, Value};
use server::create_app;
use tower::ServiceExt;

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header<'a>(response: &'a Response, name: &str) -> &'a str {
    response.headers().get(name).and_then(|v| v.to_str().ok()).unwrap_or_default()
}

#[tokio::test]
async fn test_service_route_caches_and_tags_responses() {
    let mut indexer = RestMockBuilder::new().await;
    indexer.mock_json_expect("/blocks/latest", &blocks_payload(&[42]), 1).await;

    let app = create_app(build_runtime(test_config(
        vec![service("indexer", &[UNREACHABLE.to_string(), indexer.url()])],
        vec![],
    )));

    let first = get(&app, "/services/indexer/blocks/latest").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(header(&first, "x-cache-status"), "miss");
    assert_eq!(header(&first, "x-served-by"), indexer.url());
    assert!(!header(&first, "x-request-id").is_empty());
    assert_eq!(json_body(first).await, blocks_payload(&[42]));

    let second = get(&app, "/services/indexer/blocks/latest").await;
    assert_eq!(header(&second, "x-cache-status"), "fresh");

    indexer.assert_all().await;
}

#[tokio::test]
async fn test_query_string_is_forwarded() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/txs")
        .match_query(Matcher::UrlEncoded("limit".into(), "5".into()))
        .with_status(200)
        .with_body(r#"{"txs":["a"]}"#)
        .create_async()
        .await;

    let app = create_app(build_runtime(test_config(vec![service("indexer", &[server.url()])], vec![])));

    let response = get(&app, "/services/indexer/txs?limit=5").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "txs": ["a"] }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_request_id_is_propagated() {
    let mut indexer = RestMockBuilder::new().await;
    indexer.mock_json("/blocks", &blocks_payload(&[1])).await;
    let app = create_app(build_runtime(test_config(vec![service("indexer", &[indexer.url()])], vec![])));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/services/indexer/blocks")
                .header("x-request-id", "explorer-req-7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(header(&response, "x-request-id"), "explorer-req-7");
}

#[tokio::test]
async fn test_failures_map_to_gateway_statuses() {
    let app = create_app(build_runtime(test_config(
        vec![service("node", &[UNREACHABLE.to_string()])],
        vec![],
    )));

    let unknown = get(&app, "/services/prices/spot").await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(unknown).await["kind"], "unknown_service");

    let exhausted = get(&app, "/services/node/blocks").await;
    assert_eq!(exhausted.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(exhausted).await["kind"], "all_endpoints_failed");

    let no_pair = get(&app, "/pairs/blocks/blocks").await;
    assert_eq!(no_pair.status(), StatusCode::NOT_FOUND);

    let no_route = get(&app, "/rpc").await;
    assert_eq!(no_route.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pair_route_reports_winning_source() {
    let mut indexer = RestMockBuilder::new().await;
    indexer.mock_json("/blocks", &json!({ "blocks": [] })).await;
    let mut node = RestMockBuilder::new().await;
    node.mock_json("/blocks", &blocks_payload(&[5, 6])).await;

    let app = create_app(build_runtime(test_config(
        vec![service("indexer", &[indexer.url()]), service("node", &[node.url()])],
        vec![pair("blocks", "indexer", "node")],
    )));

    let response = get(&app, "/pairs/blocks/blocks").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-source"), "fallback");
    assert_eq!(json_body(response).await, blocks_payload(&[5, 6]));
}

#[tokio::test]
async fn test_health_turns_degraded_once_a_service_is_quarantined() {
    let mut indexer = RestMockBuilder::new().await;
    indexer.mock_json("/blocks", &blocks_payload(&[1])).await;

    let app = create_app(build_runtime(test_config(
        vec![service("indexer", &[indexer.url()]), service("node", &[UNREACHABLE.to_string()])],
        vec![],
    )));

    let healthy = get(&app, "/health").await;
    assert_eq!(healthy.status(), StatusCode::OK);
    assert_eq!(json_body(healthy).await["status"], "healthy");

    for _ in 0..3 {
        let response = get(&app, "/services/node/blocks").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    let degraded = get(&app, "/health").await;
    assert_eq!(degraded.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(degraded).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"][1]["quarantined_endpoints"], 1);
    assert_eq!(body["services"][1]["endpoints"][0]["consecutive_failures"], 3);
}

#[tokio::test]
async fn test_metrics_route_serves_prometheus_text() {
    let mut indexer = RestMockBuilder::new().await;
    indexer.mock_json("/blocks", &blocks_payload(&[1])).await;
    let app = create_app(build_runtime(test_config(vec![service("indexer", &[indexer.url()])], vec![])));

    get(&app, "/services/indexer/blocks").await;
    let response = get(&app, "/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(header(&response, "content-type").starts_with("text/plain"));
}
