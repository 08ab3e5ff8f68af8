//! HTTP router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api;
use crate::state::AppState;

/// Assemble all routes and middleware into a single `Router`.
pub fn build_router(state: Arc<AppState>, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/nodes", get(api::nodes))
        .route("/api/nodes/{node}/range", get(api::node_range))
        .route("/api/nodes/{node}/latest", get(api::node_latest))
        .route(
            "/api/dashboard",
            get(api::dashboard_get).post(api::dashboard_load),
        )
        .route("/api/dashboard/readings", get(api::dashboard_readings))
        .route(
            "/api/dashboard/interruptions",
            get(api::dashboard_interruptions),
        )
        .route("/api/dashboard/quality", get(api::dashboard_quality))
        .route("/api/cache/stats", get(api::cache_stats))
        .route("/api/cache/clear", post(api::cache_clear))
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            warn!(origin, "unparseable CORS origin, allowing any");
            CorsLayer::permissive()
        }
    }
}
