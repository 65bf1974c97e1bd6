//! Prometheus text exposition (format 0.0.4).
//!
//! Snapshots are converted to `prometheus` protobuf families and written by
//! the crate's [`TextEncoder`], which owns escaping and value formatting.

use super::{MetricValue, Sample, SeriesKind, SeriesSnapshot};
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use tracing::error;

/// Content type of [`render_snapshots`] output.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Name a series is exposed under.
pub(super) fn exposed_name(name: &str, kind: SeriesKind) -> String {
    match kind {
        SeriesKind::Gauge => name.to_string(),
        SeriesKind::Info => format!("{name}_info"),
    }
}

/// Convert one snapshot to a gauge family.
///
/// Info series become a `<name>_info` gauge whose labels are the series
/// labels followed by the (sorted) info keys, with value 1. Returns `None`
/// for a series without samples, which the encoder rejects.
pub fn to_metric_family(series: &SeriesSnapshot) -> Option<MetricFamily> {
    if series.samples.is_empty() {
        return None;
    }
    let mut family = MetricFamily::default();
    family.set_name(exposed_name(&series.name, series.kind));
    family.set_help(series.help.clone());
    family.set_field_type(MetricType::GAUGE);
    for sample in &series.samples {
        family.mut_metric().push(to_metric(&series.label_names, sample));
    }
    Some(family)
}

fn to_metric(label_names: &[String], sample: &Sample) -> Metric {
    let mut metric = Metric::default();
    for (name, value) in label_names.iter().zip(&sample.label_values) {
        metric.mut_label().push(label_pair(name, value));
    }
    let value = match &sample.value {
        MetricValue::Gauge(v) => *v,
        MetricValue::Info(info) => {
            for (key, value) in info {
                metric.mut_label().push(label_pair(key, value));
            }
            1.0
        }
    };
    let mut gauge = Gauge::default();
    gauge.set_value(value);
    metric.set_gauge(gauge);
    metric
}

fn label_pair(name: &str, value: &str) -> LabelPair {
    let mut pair = LabelPair::default();
    pair.set_name(name.to_string());
    pair.set_value(value.to_string());
    pair
}

/// Render series in the text exposition format.
///
/// A family the encoder refuses is logged and left out; the rest of the
/// scrape is still served.
pub fn render_snapshots(snapshots: &[SeriesSnapshot]) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    for family in snapshots.iter().filter_map(to_metric_family) {
        let mut encoded = Vec::new();
        match encoder.encode(std::slice::from_ref(&family), &mut encoded) {
            Ok(()) => buffer.extend_from_slice(&encoded),
            Err(e) => error!(
                target: "fqm.registry",
                series = %family.get_name(),
                error = %e,
                "Failed to encode series"
            ),
        }
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!(target: "fqm.registry", error = %e, "Exposition is not valid UTF-8");
        String::new()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::super::MetricRegistry;
    use super::*;

    #[test]
    fn test_render_gauge_with_labels() {
        let registry = MetricRegistry::new("freg_");
        registry
            .upsert(
                "freg_total_rows",
                "Total number of rows",
                &["database", "table", "column"],
                &["inndata", "v_status", "status"],
                MetricValue::Gauge(120.0),
            )
            .unwrap();

        assert_eq!(
            registry.render(),
            "# HELP freg_total_rows Total number of rows\n\
             # TYPE freg_total_rows gauge\n\
             freg_total_rows{database=\"inndata\",table=\"v_status\",column=\"status\"} 120\n"
        );
    }

    #[test]
    fn test_render_unlabeled_gauge() {
        let registry = MetricRegistry::new("freg_");
        registry.set_interval(5).unwrap();
        assert_eq!(
            registry.render(),
            "# HELP freg_metrics_interval Interval of metrics scheduler (in minutes)\n\
             # TYPE freg_metrics_interval gauge\n\
             freg_metrics_interval 5\n"
        );
    }

    #[test]
    fn test_render_info_series() {
        let registry = MetricRegistry::new("freg_");
        registry
            .upsert(
                "freg_latest_timestamp",
                "Latest timestamp",
                &["database"],
                &["kildedata"],
                MetricValue::info([("timestamp", "2024-03-01 12:00:00")]),
            )
            .unwrap();

        let rendered = registry.render();
        assert!(rendered.starts_with(
            "# HELP freg_latest_timestamp_info Latest timestamp\n\
             # TYPE freg_latest_timestamp_info gauge\n"
        ));
        assert!(rendered.contains(
            "freg_latest_timestamp_info{database=\"kildedata\",\
             timestamp=\"2024-03-01 12:00:00\"} 1\n"
        ));
    }

    #[test]
    fn test_render_escapes_label_values_and_help() {
        let registry = MetricRegistry::new("");
        registry
            .upsert(
                "odd",
                "line one\nline \\two",
                &["group"],
                &["a \"quoted\"\\\nvalue"],
                MetricValue::Gauge(1.0),
            )
            .unwrap();

        let rendered = registry.render();
        assert!(rendered.contains("# HELP odd line one\\nline \\\\two\n"));
        assert!(rendered.contains("odd{group=\"a \\\"quoted\\\"\\\\\\nvalue\"} 1\n"));
    }

    #[test]
    fn test_render_fractional_and_nan_values() {
        let registry = MetricRegistry::new("");
        for (group, value) in [("half", 0.25), ("negative", -3.0), ("unknown", f64::NAN)] {
            registry
                .upsert("ratio", "Ratio", &["group"], &[group], MetricValue::Gauge(value))
                .unwrap();
        }

        let rendered = registry.render();
        assert!(rendered.contains("ratio{group=\"half\"} 0.25\n"));
        assert!(rendered.contains("ratio{group=\"negative\"} -3\n"));
        assert!(rendered.contains("ratio{group=\"unknown\"} NaN\n"));
    }

    #[test]
    fn test_family_keeps_label_order_and_appends_info_keys() {
        let snapshot = SeriesSnapshot {
            name: "freg_latest_timestamp".to_string(),
            help: "Latest timestamp".to_string(),
            kind: SeriesKind::Info,
            label_names: vec!["table".to_string(), "database".to_string()],
            samples: vec![Sample {
                label_values: vec!["v_status".to_string(), "inndata".to_string()],
                value: MetricValue::info([("timestamp", "t"), ("source", "s")]),
            }],
        };

        let family = to_metric_family(&snapshot).unwrap();
        assert_eq!(family.get_name(), "freg_latest_timestamp_info");
        assert_eq!(family.get_field_type(), MetricType::GAUGE);
        let metric = &family.get_metric()[0];
        let labels: Vec<&str> = metric.get_label().iter().map(|l| l.get_name()).collect();
        assert_eq!(labels, vec!["table", "database", "source", "timestamp"]);
        assert_eq!(metric.get_gauge().get_value(), 1.0);
    }

    #[test]
    fn test_series_without_samples_is_skipped() {
        let snapshot = SeriesSnapshot {
            name: "empty".to_string(),
            help: "Nothing yet".to_string(),
            kind: SeriesKind::Gauge,
            label_names: vec![],
            samples: vec![],
        };
        assert!(to_metric_family(&snapshot).is_none());
        assert_eq!(render_snapshots(&[snapshot]), "");
    }

    #[test]
    fn test_render_empty_registry() {
        assert_eq!(MetricRegistry::new("freg_").render(), "");
    }
}
