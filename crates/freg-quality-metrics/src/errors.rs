//! Error types for the quality metrics exporter.
//!
//! Identity-number validation outcomes are NOT errors; they are ordinary
//! values of [`crate::ident::ValidationResult`]. Everything here is a fault:
//! either a caller disagreeing with a registered series shape, or a failure
//! talking to the data source.

use crate::registry::SeriesKind;
use thiserror::Error;

/// Exporter error type.
///
/// Groups into three families:
/// - Registry faults: InvalidMetricName, InvalidLabelName, SchemaMismatch,
///   KindMismatch, LabelCardinality, NameCollision
/// - Data source faults: DataSource, Authentication
/// - Row mapping faults: MissingColumn, InvalidColumn
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Invalid metric name: {0}")]
    InvalidMetricName(String),

    #[error("Invalid label name '{label}' for series {series}")]
    InvalidLabelName { series: String, label: String },

    #[error(
        "Label schema mismatch for series {series}: \
         registered {registered:?}, requested {requested:?}"
    )]
    SchemaMismatch {
        series: String,
        registered: Vec<String>,
        requested: Vec<String>,
    },

    #[error(
        "Kind mismatch for series {series}: registered {registered}, requested {requested}"
    )]
    KindMismatch {
        series: String,
        registered: SeriesKind,
        requested: SeriesKind,
    },

    #[error("Series {series} expects {expected} label values, got {actual}")]
    LabelCardinality {
        series: String,
        expected: usize,
        actual: usize,
    },

    #[error("Series {series} would be exposed as {exposed}, already used by {existing}")]
    NameCollision {
        series: String,
        existing: String,
        exposed: String,
    },

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Missing column in query result: {0}")]
    MissingColumn(String),

    #[error("Invalid value in column {column}: {reason}")]
    InvalidColumn { column: String, reason: String },

    #[error("Scheduling error: {0}")]
    Scheduling(String),
}

impl MetricsError {
    /// Bounded label value describing the error family (for metrics recording).
    pub fn error_type(&self) -> &'static str {
        match self {
            MetricsError::InvalidMetricName(_)
            | MetricsError::InvalidLabelName { .. }
            | MetricsError::SchemaMismatch { .. }
            | MetricsError::KindMismatch { .. }
            | MetricsError::LabelCardinality { .. }
            | MetricsError::NameCollision { .. } => "registry",
            MetricsError::DataSource(_) => "data_source",
            MetricsError::Authentication(_) => "authentication",
            MetricsError::MissingColumn(_) | MetricsError::InvalidColumn { .. } => "row_mapping",
            MetricsError::Scheduling(_) => "scheduling",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_families() {
        assert_eq!(
            MetricsError::InvalidMetricName("1bad".to_string()).error_type(),
            "registry"
        );
        assert_eq!(
            MetricsError::SchemaMismatch {
                series: "freg_group_by".to_string(),
                registered: vec!["group".to_string()],
                requested: vec!["key".to_string()],
            }
            .error_type(),
            "registry"
        );
        assert_eq!(
            MetricsError::DataSource("timeout".to_string()).error_type(),
            "data_source"
        );
        assert_eq!(
            MetricsError::Authentication("no token".to_string()).error_type(),
            "authentication"
        );
        assert_eq!(
            MetricsError::MissingColumn("antall".to_string()).error_type(),
            "row_mapping"
        );
        assert_eq!(
            MetricsError::Scheduling("zero interval".to_string()).error_type(),
            "scheduling"
        );
    }

    #[test]
    fn test_schema_mismatch_display_names_both_schemas() {
        let err = MetricsError::SchemaMismatch {
            series: "freg_total_rows".to_string(),
            registered: vec!["database".to_string(), "table".to_string()],
            requested: vec!["table".to_string(), "database".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("freg_total_rows"));
        assert!(msg.contains("[\"database\", \"table\"]"));
        assert!(msg.contains("[\"table\", \"database\"]"));
    }
}
