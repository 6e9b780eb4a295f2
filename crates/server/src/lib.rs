//! HTTP gateway over the waypoint data-access layer.
//!
//! | Route                          | Purpose                                          |
//! |--------------------------------|--------------------------------------------------|
//! | `GET /health`                  | health snapshot, 503 when a service is down      |
//! | `GET /metrics`                 | Prometheus exposition                            |
//! | `GET /services/{service}/...`  | cached, failover-aware proxy to one service      |
//! | `GET /pairs/{pair}/...`        | dual-source resolution for a configured pair     |

pub mod middleware;
pub mod router;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use waypoint_core::runtime::WaypointRuntime;

/// Builds the gateway router.
///
/// `/health` and `/metrics` bypass the concurrency limit so they stay
/// reachable while the data routes are saturated.
pub fn create_app(runtime: Arc<WaypointRuntime>) -> Router {
    let max_concurrent = runtime.config().server.max_concurrent_requests;
    let (set_request_id, propagate_request_id) = middleware::request_id_layers();

    let public = Router::new()
        .route("/health", get(router::handle_health))
        .route("/metrics", get(router::handle_metrics))
        .with_state(runtime.clone());

    let data = Router::new()
        .route("/services/{service}/{*path}", get(router::handle_service))
        .route("/pairs/{pair}/{*path}", get(router::handle_pair))
        .with_state(runtime)
        .layer(ConcurrencyLimitLayer::new(max_concurrent))
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(CompressionLayer::new());

    public
        .merge(data)
        .layer(TraceLayer::new_for_http().make_span_with(middleware::request_span::<axum::body::Body>))
        // Layers run bottom-up on the request, so the id is set before it is propagated.
        .layer(propagate_request_id)
        .layer(set_request_id)
}
