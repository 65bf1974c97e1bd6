//! HTTP request handlers.

pub mod health;
pub mod metrics;

pub use health::{alive, ready, welcome};
pub use metrics::{metrics_handler, MetricsState};
