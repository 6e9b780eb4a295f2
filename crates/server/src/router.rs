use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};
use waypoint_core::{
    cache::{CachedBody, Lookup},
    runtime::WaypointRuntime,
    types::ServiceRequest,
    upstream::UpstreamError,
};

const JSON: &str = "application/json";

/// Joins a wildcard capture and optional raw query back into a request path.
fn request_path(path: &str, query: Option<&str>) -> String {
    let path = format!("/{}", path.trim_start_matches('/'));
    match query {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path,
    }
}

fn error_response(error: &UpstreamError) -> Response {
    let status = match error {
        UpstreamError::UnknownService(_) | UpstreamError::UnknownDualSource(_) => {
            StatusCode::NOT_FOUND
        }
        UpstreamError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    let body = serde_json::json!({ "error": error.to_string(), "kind": error.as_str() });
    (status, [("content-type", JSON)], body.to_string()).into_response()
}

fn lookup_response(lookup: Lookup<CachedBody>, origin_header: &'static str) -> Response {
    let status = lookup.status();
    let CachedBody { body, origin } = lookup.into_value();
    (
        StatusCode::OK,
        [
            ("content-type", JSON.to_string()),
            ("x-cache-status", status.as_str().to_string()),
            (origin_header, origin),
        ],
        body,
    )
        .into_response()
}

/// Proxies `GET /services/{service}/{*path}` through the cache and executor.
///
/// The response carries `x-cache-status` and `x-served-by` (the endpoint URL
/// that produced the body).
pub async fn handle_service(
    State(runtime): State<Arc<WaypointRuntime>>,
    Path((service, path)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Response {
    let request = ServiceRequest::get(request_path(&path, query.as_deref()));
    match runtime.fetch_cached(&service, &request).await {
        Ok(lookup) => {
            debug!(service = %service, path = %request.path, cache = lookup.status().as_str(), "served");
            lookup_response(lookup, "x-served-by")
        }
        Err(e) => {
            warn!(service = %service, path = %request.path, error = %e, "request failed");
            error_response(&e)
        }
    }
}

/// Resolves `GET /pairs/{pair}/{*path}` against a configured dual-source pair.
///
/// `x-source` is `primary` or `fallback`.
pub async fn handle_pair(
    State(runtime): State<Arc<WaypointRuntime>>,
    Path((pair, path)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Response {
    let path = request_path(&path, query.as_deref());
    match runtime.resolve_pair(&pair, &path).await {
        Ok(lookup) => lookup_response(lookup, "x-source"),
        Err(e) => {
            warn!(pair = %pair, path = %path, error = %e, "resolution failed");
            error_response(&e)
        }
    }
}

#[allow(clippy::unused_async)]
pub async fn handle_metrics(State(runtime): State<Arc<WaypointRuntime>>) -> impl IntoResponse {
    let prometheus_metrics = runtime.metrics_collector().get_prometheus_metrics();

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        prometheus_metrics,
    )
}

/// Health snapshot; 503 when any service has every endpoint quarantined.
#[allow(clippy::unused_async)]
pub async fn handle_health(State(runtime): State<Arc<WaypointRuntime>>) -> impl IntoResponse {
    let snapshot = runtime.health_snapshot();
    let healthy = snapshot.all_services_available();

    let health_status = serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "services": snapshot.services,
        "cache": runtime.cache().stats(),
        "timestamp": snapshot.generated_at.to_rfc3339(),
    });

    (
        if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE },
        [("content-type", JSON)],
        Bytes::from(serde_json::to_vec(&health_status).unwrap_or_default()),
    )
}
