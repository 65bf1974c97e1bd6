//! Service self-metrics.
//!
//! These describe the exporter itself, not the data it republishes, and are
//! recorded through the `metrics` facade into the process-wide Prometheus
//! recorder:
//! - `fqm_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! - `method`: 7 values max
//! - `endpoint`: the fixed routes plus `/other`
//! - `status`: success, error, timeout
//! - `job`: bounded by the job catalogue

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the process-wide Prometheus recorder and return its handle.
///
/// Must be called before any self-metric is recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("fqm_http_request".to_string()),
            &[0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.000],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Job runs are dominated by BigQuery round trips
        .set_buckets_for_metric(
            Matcher::Prefix("fqm_job_run".to_string()),
            &[0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000, 30.000, 60.000, 120.000],
        )
        .map_err(|e| format!("Failed to set job run buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record HTTP request completion
///
/// Metric: `fqm_http_requests_total`, `fqm_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("fqm_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("fqm_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.to_string(),
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Record one scheduled job run
///
/// Metric: `fqm_job_runs_total`, `fqm_job_run_duration_seconds`
/// Labels: `job`, `status` (success, error, skipped)
///
/// Skipped runs have no duration.
pub fn record_job_run(job: &str, status: &'static str, duration: Option<Duration>) {
    if let Some(duration) = duration {
        histogram!("fqm_job_run_duration_seconds", "job" => job.to_string())
            .record(duration.as_secs_f64());
    }

    counter!("fqm_job_runs_total",
        "job" => job.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a failed job run by error family
///
/// Metric: `fqm_job_errors_total`
/// Labels: `job`, `error_type`
pub fn record_job_error(job: &str, error_type: &'static str) {
    counter!("fqm_job_errors_total",
        "job" => job.to_string(),
        "error_type" => error_type
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Unknown paths collapse to `/other` to bound cardinality.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health/ready" => "/health/ready",
        "/health/alive" => "/health/alive",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}
