//! Health endpoint integration tests.
//!
//! Tests the probe and landing routes using the `TestServer` harness.

use fqm_test_utils::TestServer;
use freg_quality_metrics::registry::MetricRegistry;
use std::sync::Arc;

/// Test that the liveness probe returns 200.
#[tokio::test]
async fn test_alive_returns_200() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn(Arc::new(MetricRegistry::new("freg_"))).await?;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health/alive", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

/// Test that the readiness probe returns 200 without touching any data source.
#[tokio::test]
async fn test_ready_returns_200() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn(Arc::new(MetricRegistry::new("freg_"))).await?;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health/ready", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);

    Ok(())
}

/// Test that the landing route answers with a welcome text.
#[tokio::test]
async fn test_root_returns_welcome() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn(Arc::new(MetricRegistry::new("freg_"))).await?;

    let response = reqwest::get(server.url()).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "Welcome");

    Ok(())
}

/// Test that non-existent routes return 404.
#[tokio::test]
async fn test_unknown_route_returns_404() -> Result<(), anyhow::Error> {
    let server = TestServer::spawn(Arc::new(MetricRegistry::new("freg_"))).await?;

    let response = reqwest::get(format!("{}/v1/nonexistent", server.url())).await?;

    assert_eq!(response.status(), 404);

    Ok(())
}
