//! # FQM Test Utilities
//!
//! Shared test utilities for the freg-quality-metrics exporter.
//!
//! This crate provides:
//! - Server test harness (TestServer for E2E tests)
//! - Row fixtures shaped like the pre-aggregated quality tables
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fqm_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let registry = Arc::new(MetricRegistry::new("freg_"));
//!     let server = TestServer::spawn(Arc::clone(&registry)).await?;
//!
//!     let body = server.scrape().await?;
//!     assert!(body.contains("freg_metrics_interval"));
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use fixtures::*;
pub use server_harness::*;
