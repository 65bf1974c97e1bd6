//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is unauthenticated to allow Prometheus to scrape metrics.
//! Series carry aggregate counts only, never identity numbers.

use crate::registry::{MetricRegistry, TEXT_CONTENT_TYPE};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// State of the `/metrics` route.
#[derive(Clone)]
pub struct MetricsState {
    pub registry: Arc<MetricRegistry>,
    pub handle: PrometheusHandle,
}

/// Handler for GET /metrics
///
/// Returns the registry's series followed by the exporter's own metrics:
/// ```text
/// # HELP freg_group_by The number of rows by group
/// # TYPE freg_group_by gauge
/// freg_group_by{group="bosatt",database="inndata",table="v_status",column="status"} 5400000
/// ```
#[tracing::instrument(skip_all, name = "fqm.metrics.scrape")]
pub async fn metrics_handler(State(state): State<MetricsState>) -> impl IntoResponse {
    let mut body = state.registry.render();
    body.push_str(&state.handle.render());
    ([(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], body)
}
