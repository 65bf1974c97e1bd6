//! Health check handlers.
//!
//! - `/health/alive`: liveness probe, 200 while the process serves requests
//! - `/health/ready`: readiness probe, 200 once the router is up
//!
//! Neither probe touches the data source: a failing BigQuery only degrades
//! the affected series and must not take the exporter out of rotation.

use axum::http::StatusCode;

/// Liveness probe handler.
pub async fn alive() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe handler.
pub async fn ready() -> StatusCode {
    StatusCode::OK
}

/// Landing route.
pub async fn welcome() -> &'static str {
    "Welcome"
}
