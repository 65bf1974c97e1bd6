//! Registry concurrency integration tests.
//!
//! Many writers upsert while scrapes render, and every scrape must see a
//! consistent exposition with exactly one header per series.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use fqm_test_utils::TestServer;
use freg_quality_metrics::errors::MetricsError;
use freg_quality_metrics::registry::{MetricRegistry, MetricValue};
use futures::future::join_all;
use std::sync::Arc;

const WRITERS: usize = 8;
const ROUNDS: usize = 50;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_and_scrapes() {
    let registry = Arc::new(MetricRegistry::new("freg_"));
    let server = TestServer::spawn(Arc::clone(&registry)).await.unwrap();

    let writers = (0..WRITERS).map(|writer| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let group = format!("group_{writer}");
            for round in 0..ROUNDS {
                registry
                    .upsert(
                        "freg_group_by",
                        "The number of rows by group",
                        &["group"],
                        &[group.as_str()],
                        MetricValue::Gauge(round as f64),
                    )
                    .unwrap();
                registry.count_call().unwrap();
                tokio::task::yield_now().await;
            }
        })
    });

    let scrapes = (0..10).map(|_| {
        let url = format!("{}/metrics", server.url());
        tokio::spawn(async move {
            let body = reqwest::get(url).await.unwrap().text().await.unwrap();
            assert!(body.matches("# TYPE freg_group_by gauge").count() <= 1);
            assert!(body.matches("# TYPE freg_metrics_calls gauge").count() <= 1);
        })
    });

    for result in join_all(writers).await {
        result.unwrap();
    }
    for result in join_all(scrapes).await {
        result.unwrap();
    }

    assert_eq!(registry.sample_count("freg_group_by"), Some(WRITERS));
    assert_eq!(
        registry.get::<&str>("freg_metrics_calls", &[]),
        Some(MetricValue::Gauge((WRITERS * ROUNDS) as f64))
    );

    let body = server.scrape().await.unwrap();
    for writer in 0..WRITERS {
        assert!(body.contains(&format!(
            "freg_group_by{{group=\"group_{writer}\"}} {}",
            ROUNDS - 1
        )));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_conflicting_schemas_register_once() {
    let registry = Arc::new(MetricRegistry::new("freg_"));

    let attempts = (0..16).map(|i| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let labels: &[&str] = if i % 2 == 0 { &["group"] } else { &["column"] };
            registry.upsert(
                "freg_contested",
                "Contested series",
                labels,
                &["x"],
                MetricValue::Gauge(1.0),
            )
        })
    });

    let results: Vec<Result<(), MetricsError>> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let ok = results.iter().filter(|r| r.is_ok()).count();
    let mismatched = results
        .iter()
        .filter(|r| matches!(r, Err(MetricsError::SchemaMismatch { .. })))
        .count();
    assert_eq!(ok, 8);
    assert_eq!(mismatched, 8);
    assert_eq!(registry.series_count(), 1);
    assert_eq!(registry.sample_count("freg_contested"), Some(1));
}
