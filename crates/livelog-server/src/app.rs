use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{routes, state::AppState};

/// Construct the Axum [`Router`] with all routes and middleware attached.
///
/// Middleware is applied in outer-to-inner order (outermost runs first on
/// request, last on response):
///
/// 1. `TraceLayer`: structured request/response logging via `tracing`.
/// 2. `CorsLayer`: permissive CORS so dashboards on other origins can poll
///    the live endpoints.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/sites/{site_id}/live/counters",
            get(routes::live::get_counters),
        )
        .route(
            "/api/sites/{site_id}/live/visits",
            get(routes::live::get_visits),
        )
        .route(
            "/api/sites/{site_id}/live/visitors/{visitor_id}/adjacent",
            get(routes::live::get_adjacent_visitor),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
