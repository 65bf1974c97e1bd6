//! Freg Quality Metrics
//!
//! Exporter entry point.
//!
//! # Startup Flow
//!
//! 1. Initialize tracing
//! 2. Load configuration from environment
//! 3. Install the Prometheus recorder for self-metrics
//! 4. Build the registry and publish the polling interval
//! 5. Build the BigQuery client
//! 6. Register the job catalogue and start the scheduler
//! 7. Serve HTTP until a shutdown signal, then cancel the jobs

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use freg_quality_metrics::config::{Config, LogFormat};
use freg_quality_metrics::datasource::token::TokenProvider;
use freg_quality_metrics::datasource::{BigQueryClient, DataSource};
use freg_quality_metrics::jobs::{default_jobs, JobContext};
use freg_quality_metrics::observability::metrics::init_metrics_recorder;
use freg_quality_metrics::registry::MetricRegistry;
use freg_quality_metrics::routes::{self, AppState};
use freg_quality_metrics::scheduler::Scheduler;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Log format has to be known before tracing is up
    let log_format = std::env::var("LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse::<LogFormat>().ok())
        .unwrap_or_default();
    init_tracing(log_format);

    info!("Starting Freg Quality Metrics");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        gcp_project = %config.gcp_project,
        bind_address = %config.bind_address,
        interval_minutes = config.interval_minutes,
        metric_prefix = %config.metric_prefix,
        validate_idents_locally = config.validate_idents_locally,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let registry = Arc::new(MetricRegistry::new(config.metric_prefix.clone()));
    registry.set_interval(config.interval_minutes)?;

    let tokens = match config.bigquery_access_token.clone() {
        Some(token) => {
            info!("Using static BigQuery access token");
            TokenProvider::fixed(token)
        }
        None => {
            info!(metadata_url = %config.gce_metadata_url, "Using metadata server tokens");
            TokenProvider::metadata(config.gce_metadata_url.clone())?
        }
    };
    let client = BigQueryClient::new(
        config.bigquery_api_url.clone(),
        config.gcp_project.clone(),
        tokens,
    )?;
    let source: Arc<dyn DataSource> = Arc::new(client);

    let ctx = JobContext::new(Arc::clone(&registry), source, config.gcp_project.clone())
        .with_century_rule(config.ident_century_rule);

    let mut scheduler = Scheduler::new(config.job_overlap);
    for job in default_jobs(config.validate_idents_locally) {
        scheduler.register_periodic(job, config.interval(), true)?;
    }
    info!(jobs = ?scheduler.job_names(), "Jobs registered");

    let cancel_token = CancellationToken::new();
    let job_handles = scheduler.start(ctx, cancel_token.clone());

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;
    let drain_period = config.drain_period();

    let state = Arc::new(AppState {
        registry: Arc::clone(&registry),
        config,
    });
    let app = routes::build_routes(state, metrics_handle);

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(error = %e, %addr, "Failed to bind HTTP listener");
        e
    })?;
    info!("Freg Quality Metrics listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(drain_period))
        .await?;

    cancel_token.cancel();
    for handle in job_handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Job loop ended abnormally");
        }
    }

    info!("Freg Quality Metrics shutdown complete");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "freg_quality_metrics=info,fqm=info,tower_http=info".into());

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal(drain_period: Duration) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_period.is_zero() {
        info!("Skipping drain period (DRAIN_SECONDS=0)");
    } else {
        warn!("Draining connections for {} seconds...", drain_period.as_secs());
        tokio::time::sleep(drain_period).await;
        info!("Drain period complete");
    }
}
