use super::{AppState, handlers};
use axum::Router;
use axum::routing::{get, post, put};
use axum_prometheus::PrometheusMetricLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the options router with all routes and shared state.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/options", get(handlers::get_options))
        .route("/options/currency", put(handlers::put_currency))
        .route("/options/refresh", post(handlers::post_refresh))
        .route("/annotate", post(handlers::post_annotate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Adds request metrics and the `/metrics` endpoint. Installs the global
/// Prometheus recorder, so call it once per process.
pub fn with_metrics(router: Router) -> Router {
    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    router
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(prometheus_layer)
}
