//! Observability for the exporter's own behavior.

pub mod metrics;
