use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    app::health_check,
    metrics::metrics,
    permissions::{check_route, my_permissions, refresh},
};
use crate::middleware::route_guard::route_guard;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    // Every path that is not an API route is a portal page; the shell's
    // index.html handles client-side routing.
    let portal_shell = ServeDir::new(&state.static_dir)
        .fallback(ServeFile::new(state.static_dir.join("index.html")));

    let permissions_api = Router::new()
        .route("/me", get(my_permissions))
        .route("/check", get(check_route))
        .route("/refresh", post(refresh));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .nest("/api/permissions", permissions_api)
        .nest_service("/static", ServeDir::new(&state.static_dir))
        .fallback_service(portal_shell)
        .layer(from_fn_with_state(state.clone(), route_guard))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        // Add tracing layer
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
