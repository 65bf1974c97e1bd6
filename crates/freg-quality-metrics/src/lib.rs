//! Freg Quality Metrics Library
//!
//! Prometheus exporter for data-quality metrics of the Norwegian population
//! register. Periodic jobs query pre-aggregated quality tables in BigQuery
//! and publish the results as gauges on `/metrics`.
//!
//! # Modules
//!
//! - `ident` - Identity-number (fnr/dnr) classification
//! - `registry` - Idempotent metric registry and text exposition
//! - `datasource` - BigQuery client, typed rows, and a scriptable mock
//! - `jobs` - Query-to-series adapters
//! - `scheduler` - Periodic job execution
//! - `routes` / `handlers` / `middleware` - HTTP surface
//! - `observability` - Exporter self-metrics

pub mod config;
pub mod datasource;
pub mod errors;
pub mod handlers;
pub mod ident;
pub mod jobs;
pub mod middleware;
pub mod observability;
pub mod registry;
pub mod routes;
pub mod scheduler;
