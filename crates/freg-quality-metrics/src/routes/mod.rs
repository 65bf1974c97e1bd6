//! HTTP routes for the exporter.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers::{self, MetricsState};
use crate::middleware::http_metrics_middleware;
use crate::registry::MetricRegistry;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registry the jobs write into and `/metrics` renders.
    pub registry: Arc<MetricRegistry>,

    /// Exporter configuration.
    pub config: Config,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/` - Landing text
/// - `/health/alive` - Liveness probe
/// - `/health/ready` - Readiness probe
/// - `/metrics` - Registry series plus the exporter's own metrics
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::welcome))
        .route("/health/alive", get(handlers::alive))
        .route("/health/ready", get(handlers::ready))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(MetricsState {
            registry: Arc::clone(&state.registry),
            handle: metrics_handle,
        });

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::registry::MetricValue;
    use axum::{body::Body, http::Request, http::StatusCode};
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn test_router(registry: Arc<MetricRegistry>) -> Router {
        let config = Config::from_vars(&HashMap::new()).expect("default config is valid");
        let state = Arc::new(AppState { registry, config });
        let handle = PrometheusBuilder::new().build_recorder().handle();
        build_routes(state, handle)
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_welcome_route() {
        let (status, body) = get_body(test_router(Arc::default()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Welcome");
    }

    #[tokio::test]
    async fn test_health_routes_return_ok() {
        for uri in ["/health/alive", "/health/ready"] {
            let (status, _) = get_body(test_router(Arc::default()), uri).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_metrics_route_renders_registry() {
        let registry = Arc::new(MetricRegistry::new("freg_"));
        registry
            .upsert(
                "freg_total_rows",
                "Total rows",
                &["database"],
                &["inndata"],
                MetricValue::Gauge(42.0),
            )
            .unwrap();

        let response = test_router(registry)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            crate::registry::TEXT_CONTENT_TYPE
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("# TYPE freg_total_rows gauge"));
        assert!(body.contains("freg_total_rows{database=\"inndata\"} 42"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (status, _) = get_body(test_router(Arc::default()), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
