//! Test server harness for E2E testing
//!
//! Provides TestServer for spawning real exporter instances in tests.

use freg_quality_metrics::config::Config;
use freg_quality_metrics::registry::MetricRegistry;
use freg_quality_metrics::routes::{self, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the exporter's HTTP surface in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_scrape() -> Result<()> {
///     let registry = Arc::new(MetricRegistry::new("freg_"));
///     let server = TestServer::spawn(registry).await?;
///
///     let response = reqwest::get(format!("{}/health/alive", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestServer {
    addr: SocketAddr,
    registry: Arc<MetricRegistry>,
    config: Config,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Spawn a server over `registry` with the default configuration.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Use a standalone Prometheus recorder (never installed globally)
    /// - Start the HTTP server in the background
    pub async fn spawn(registry: Arc<MetricRegistry>) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::new();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string());
        vars.insert("METRIC_PREFIX".to_string(), registry.prefix().to_string());
        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to build test config: {}", e))?;

        Self::spawn_with_config(registry, config).await
    }

    /// Spawn a server over `registry` with an explicit configuration.
    pub async fn spawn_with_config(
        registry: Arc<MetricRegistry>,
        config: Config,
    ) -> Result<Self, anyhow::Error> {
        let state = Arc::new(AppState {
            registry: Arc::clone(&registry),
            config: config.clone(),
        });

        // Each test server gets its own recorder so tests stay isolated.
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            registry,
            config,
            handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the registry the server renders
    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Get reference to the server configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// GET `/metrics` and return the body.
    pub async fn scrape(&self) -> Result<String, anyhow::Error> {
        let response = reqwest::get(format!("{}/metrics", self.url())).await?;
        if !response.status().is_success() {
            anyhow::bail!("scrape returned {}", response.status());
        }
        Ok(response.text().await?)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
