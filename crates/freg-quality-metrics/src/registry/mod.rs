//! Metric registry.
//!
//! Holds every exported series and its label schema. Series are created
//! lazily by the first [`MetricRegistry::upsert`] and are then only updated:
//! a `(name, label values)` pair maps to exactly one current value.
//!
//! The label schema and the kind (gauge or info) of a series are fixed at
//! first registration. A later call that disagrees is a caller fault and
//! fails loudly without touching the series.
//!
//! # Concurrency
//!
//! All series live behind a single `RwLock`. Writers (jobs) take the write
//! lock for the duration of one upsert; readers (the `/metrics` handler)
//! copy a [`SeriesSnapshot`] under the read lock, so a scrape never observes
//! a half-applied upsert.

mod exposition;

pub use exposition::{render_snapshots, TEXT_CONTENT_TYPE};

use crate::datasource::SourceCoordinates;
use crate::errors::MetricsError;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Polling interval of the scheduler, in minutes.
pub const INTERVAL_SERIES: &str = "metrics_interval";

/// Number of calls made to the external data source.
pub const CALLS_SERIES: &str = "metrics_calls";

/// Seconds spent by each job run.
pub const TIME_USED_SERIES: &str = "metrics_time_used";

/// Label schema of [`TIME_USED_SERIES`].
pub const TIME_USED_LABELS: [&str; 4] = ["name", "database", "table", "column"];

/// Kind of a series, fixed at first registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Gauge,
    Info,
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesKind::Gauge => f.write_str("gauge"),
            SeriesKind::Info => f.write_str("info"),
        }
    }
}

/// Current value of one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// Plain numeric value.
    Gauge(f64),
    /// Small string-to-string mapping, exposed as `<name>_info` with value 1.
    Info(BTreeMap<String, String>),
}

impl MetricValue {
    /// Build an info value from key/value pairs.
    pub fn info<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        MetricValue::Info(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Kind of series this value belongs to.
    pub fn kind(&self) -> SeriesKind {
        match self {
            MetricValue::Gauge(_) => SeriesKind::Gauge,
            MetricValue::Info(_) => SeriesKind::Info,
        }
    }

    /// Numeric value, `None` for info values.
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            MetricValue::Gauge(v) => Some(*v),
            MetricValue::Info(_) => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Gauge(value)
    }
}

/// One labeled value of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub label_values: Vec<String>,
    pub value: MetricValue,
}

/// Read-only copy of one series, as handed to the exposition layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSnapshot {
    pub name: String,
    pub help: String,
    pub kind: SeriesKind,
    pub label_names: Vec<String>,
    /// Sorted by label values.
    pub samples: Vec<Sample>,
}

#[derive(Debug)]
struct Series {
    help: String,
    kind: SeriesKind,
    label_names: Vec<String>,
    samples: BTreeMap<Vec<String>, MetricValue>,
}

impl Series {
    /// Check a request against the registered shape.
    fn check_shape<N: AsRef<str>>(
        &self,
        name: &str,
        label_names: &[N],
        kind: SeriesKind,
        value_count: usize,
    ) -> Result<(), MetricsError> {
        let same_schema = self
            .label_names
            .iter()
            .map(String::as_str)
            .eq(label_names.iter().map(AsRef::as_ref));
        if !same_schema {
            return Err(MetricsError::SchemaMismatch {
                series: name.to_string(),
                registered: self.label_names.clone(),
                requested: to_strings(label_names),
            });
        }
        if self.kind != kind {
            return Err(MetricsError::KindMismatch {
                series: name.to_string(),
                registered: self.kind,
                requested: kind,
            });
        }
        check_cardinality(name, self.label_names.len(), value_count)
    }
}

/// Registry of exported series.
///
/// Owned by the server context and shared with every job through an `Arc`.
#[derive(Debug)]
pub struct MetricRegistry {
    prefix: String,
    series: RwLock<BTreeMap<String, Series>>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new("")
    }
}

impl MetricRegistry {
    /// Create an empty registry. `prefix` is prepended by [`Self::qualified`].
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            series: RwLock::new(BTreeMap::new()),
        }
    }

    /// Prefix applied to built-in series names.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full series name for a prefix-less suffix, e.g. `group_by` -> `freg_group_by`.
    pub fn qualified(&self, suffix: &str) -> String {
        format!("{}{}", self.prefix, suffix)
    }

    /// Create or update the value of one labeled sample.
    ///
    /// The first call for `name` registers the series with `help`,
    /// `label_names` and the kind of `value`. Later calls must agree on the
    /// label names (same names, same order) and on the kind; their `help` is
    /// ignored.
    ///
    /// # Errors
    ///
    /// - `InvalidMetricName` / `InvalidLabelName` for malformed identifiers
    /// - `SchemaMismatch` when `label_names` differ from the registered schema
    /// - `KindMismatch` when a gauge series receives an info value or vice versa
    /// - `LabelCardinality` when `label_values` and `label_names` differ in length
    /// - `NameCollision` when a new series would be exposed under the name of
    ///   an existing one
    ///
    /// On error nothing is created or modified.
    pub fn upsert<N, V>(
        &self,
        name: &str,
        help: &str,
        label_names: &[N],
        label_values: &[V],
        value: MetricValue,
    ) -> Result<(), MetricsError>
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let mut series = self.write();
        let entry = Self::resolve(&mut series, name, help, label_names, label_values, &value)?;
        entry.samples.insert(to_strings(label_values), value);
        Ok(())
    }

    /// Add `delta` to a gauge sample, creating series and sample as needed.
    ///
    /// Returns the new value. Same errors as [`Self::upsert`].
    pub fn increment<N, V>(
        &self,
        name: &str,
        help: &str,
        label_names: &[N],
        label_values: &[V],
        delta: f64,
    ) -> Result<f64, MetricsError>
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let mut series = self.write();
        let shape = MetricValue::Gauge(delta);
        let entry = Self::resolve(&mut series, name, help, label_names, label_values, &shape)?;
        let current = entry
            .samples
            .entry(to_strings(label_values))
            .or_insert(MetricValue::Gauge(0.0));
        let updated = current.as_gauge().unwrap_or(0.0) + delta;
        *current = MetricValue::Gauge(updated);
        Ok(updated)
    }

    /// Validate a request and return the series it targets, registering it
    /// if unknown. Registration happens only after every check has passed.
    fn resolve<'a, N, V>(
        series: &'a mut BTreeMap<String, Series>,
        name: &str,
        help: &str,
        label_names: &[N],
        label_values: &[V],
        value: &MetricValue,
    ) -> Result<&'a mut Series, MetricsError>
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let kind = value.kind();
        if let Some(existing) = series.get(name) {
            existing.check_shape(name, label_names, kind, label_values.len())?;
            check_info_keys(name, &existing.label_names, value)?;
        } else {
            validate_metric_name(name)?;
            for label in label_names {
                validate_label_name(name, label.as_ref())?;
            }
            check_cardinality(name, label_names.len(), label_values.len())?;
            let schema = to_strings(label_names);
            check_info_keys(name, &schema, value)?;
            check_exposed_name(series, name, kind)?;
            series.insert(
                name.to_string(),
                Series {
                    help: help.to_string(),
                    kind,
                    label_names: schema,
                    samples: BTreeMap::new(),
                },
            );
        }
        series
            .get_mut(name)
            .ok_or_else(|| MetricsError::InvalidMetricName(name.to_string()))
    }

    /// Current value of one sample, if present.
    pub fn get<V: AsRef<str>>(&self, name: &str, label_values: &[V]) -> Option<MetricValue> {
        let key = to_strings(label_values);
        self.read()
            .get(name)
            .and_then(|series| series.samples.get(&key).cloned())
    }

    /// Registered label names of a series.
    pub fn label_names(&self, name: &str) -> Option<Vec<String>> {
        self.read()
            .get(name)
            .map(|series| series.label_names.clone())
    }

    /// Number of samples in a series, if the series exists.
    pub fn sample_count(&self, name: &str) -> Option<usize> {
        self.read().get(name).map(|series| series.samples.len())
    }

    /// Number of registered series.
    pub fn series_count(&self) -> usize {
        self.read().len()
    }

    /// Copy every series, sorted by name.
    pub fn snapshot(&self) -> Vec<SeriesSnapshot> {
        self.read()
            .iter()
            .map(|(name, series)| SeriesSnapshot {
                name: name.clone(),
                help: series.help.clone(),
                kind: series.kind,
                label_names: series.label_names.clone(),
                samples: series
                    .samples
                    .iter()
                    .map(|(label_values, value)| Sample {
                        label_values: label_values.clone(),
                        value: value.clone(),
                    })
                    .collect(),
            })
            .collect()
    }

    /// Render every series in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        render_snapshots(&self.snapshot())
    }

    /// Set the scheduler interval gauge.
    pub fn set_interval(&self, minutes: u64) -> Result<(), MetricsError> {
        self.upsert::<&str, &str>(
            &self.qualified(INTERVAL_SERIES),
            "Interval of metrics scheduler (in minutes)",
            &[],
            &[],
            MetricValue::Gauge(minutes as f64),
        )
    }

    /// Count one call to the external data source.
    pub fn count_call(&self) -> Result<f64, MetricsError> {
        self.increment::<&str, &str>(
            &self.qualified(CALLS_SERIES),
            "The total number of calls to BigQuery",
            &[],
            &[],
            1.0,
        )
    }

    /// Record how long one job run took.
    pub fn record_time_used(
        &self,
        job: &str,
        source: &SourceCoordinates,
        elapsed: Duration,
    ) -> Result<(), MetricsError> {
        self.upsert(
            &self.qualified(TIME_USED_SERIES),
            "Time used to generate metric (in seconds)",
            &TIME_USED_LABELS,
            &[
                job,
                source.database.as_str(),
                source.table.as_str(),
                source.column.as_str(),
            ],
            MetricValue::Gauge(elapsed.as_secs_f64()),
        )
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Series>> {
        self.series.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Series>> {
        self.series.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn to_strings<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items.iter().map(|s| s.as_ref().to_string()).collect()
}

fn check_cardinality(name: &str, expected: usize, actual: usize) -> Result<(), MetricsError> {
    if expected == actual {
        Ok(())
    } else {
        Err(MetricsError::LabelCardinality {
            series: name.to_string(),
            expected,
            actual,
        })
    }
}

/// A new series must not be exposed under the same name as an existing one,
/// e.g. info `x` and gauge `x_info`.
fn check_exposed_name(
    series: &BTreeMap<String, Series>,
    name: &str,
    kind: SeriesKind,
) -> Result<(), MetricsError> {
    let exposed = exposition::exposed_name(name, kind);
    let clash = series
        .iter()
        .find(|(other, s)| exposition::exposed_name(other, s.kind) == exposed);
    match clash {
        Some((other, _)) => Err(MetricsError::NameCollision {
            series: name.to_string(),
            existing: other.clone(),
            exposed,
        }),
        None => Ok(()),
    }
}

/// Info keys become labels at exposition time, so they follow label rules.
fn check_info_keys(
    name: &str,
    label_names: &[String],
    value: &MetricValue,
) -> Result<(), MetricsError> {
    let MetricValue::Info(pairs) = value else {
        return Ok(());
    };
    for key in pairs.keys() {
        validate_label_name(name, key)?;
        if label_names.iter().any(|label| label == key) {
            return Err(MetricsError::InvalidLabelName {
                series: name.to_string(),
                label: key.clone(),
            });
        }
    }
    Ok(())
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn validate_metric_name(name: &str) -> Result<(), MetricsError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(MetricsError::InvalidMetricName(name.to_string()))
    }
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, not starting with `__`.
fn validate_label_name(series: &str, label: &str) -> Result<(), MetricsError> {
    let mut chars = label.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    } && !label.starts_with("__");
    if valid {
        Ok(())
    } else {
        Err(MetricsError::InvalidLabelName {
            series: series.to_string(),
            label: label.to_string(),
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const LABELS: [&str; 3] = ["database", "table", "column"];

    fn registry() -> MetricRegistry {
        MetricRegistry::new("freg_")
    }

    #[test]
    fn test_upsert_twice_overwrites_single_entry() {
        let registry = registry();
        let values = ["inndata", "v_status", "status"];

        registry
            .upsert("freg_total_rows", "Total rows", &LABELS, &values, 10.0.into())
            .unwrap();
        registry
            .upsert("freg_total_rows", "Total rows", &LABELS, &values, 42.0.into())
            .unwrap();

        assert_eq!(registry.sample_count("freg_total_rows"), Some(1));
        assert_eq!(
            registry.get("freg_total_rows", &values),
            Some(MetricValue::Gauge(42.0))
        );
    }

    #[test]
    fn test_distinct_tuples_are_separate_samples() {
        let registry = registry();
        registry
            .upsert("freg_group_by", "Rows by group", &["group"], &["bosatt"], 5.0.into())
            .unwrap();
        registry
            .upsert("freg_group_by", "Rows by group", &["group"], &["doed"], 2.0.into())
            .unwrap();

        assert_eq!(registry.sample_count("freg_group_by"), Some(2));
        assert_eq!(registry.series_count(), 1);
    }

    #[test]
    fn test_schema_mismatch_is_rejected_without_mutation() {
        let registry = registry();
        let values = ["inndata", "v_status", "status"];
        registry
            .upsert("freg_total_rows", "Total rows", &LABELS, &values, 10.0.into())
            .unwrap();

        let reordered = ["table", "database", "column"];
        let err = registry
            .upsert("freg_total_rows", "Total rows", &reordered, &values, 99.0.into())
            .unwrap_err();
        assert!(matches!(err, MetricsError::SchemaMismatch { .. }));

        let fewer = ["database", "table"];
        let err = registry
            .upsert("freg_total_rows", "Total rows", &fewer, &["a", "b"], 99.0.into())
            .unwrap_err();
        assert!(matches!(err, MetricsError::SchemaMismatch { .. }));

        assert_eq!(registry.label_names("freg_total_rows").unwrap(), LABELS);
        assert_eq!(registry.sample_count("freg_total_rows"), Some(1));
        assert_eq!(
            registry.get("freg_total_rows", &values),
            Some(MetricValue::Gauge(10.0))
        );
        assert_eq!(registry.get("freg_total_rows", &["a", "b"]), None);
    }

    #[test]
    fn test_label_value_arity_must_match() {
        let registry = registry();
        let err = registry
            .upsert("freg_total_rows", "Total rows", &LABELS, &["only-one"], 1.0.into())
            .unwrap_err();
        assert!(matches!(
            err,
            MetricsError::LabelCardinality {
                expected: 3,
                actual: 1,
                ..
            }
        ));
        // A failed first registration leaves no series behind.
        assert_eq!(registry.series_count(), 0);
    }

    #[test]
    fn test_kind_is_fixed_at_first_registration() {
        let registry = registry();
        registry
            .upsert::<&str, &str>(
                "freg_metrics_timestamp",
                "Timestamp",
                &[],
                &[],
                MetricValue::info([("timestamp", "2024-01-01 00:00:00")]),
            )
            .unwrap();

        let err = registry
            .upsert::<&str, &str>("freg_metrics_timestamp", "Timestamp", &[], &[], 1.0.into())
            .unwrap_err();
        assert!(matches!(
            err,
            MetricsError::KindMismatch {
                registered: SeriesKind::Info,
                requested: SeriesKind::Gauge,
                ..
            }
        ));
    }

    #[test]
    fn test_info_values_overwrite() {
        let registry = registry();
        let labels = ["database"];
        registry
            .upsert(
                "freg_latest_timestamp",
                "Latest",
                &labels,
                &["kildedata"],
                MetricValue::info([("timestamp", "2024-01-01 00:00:00")]),
            )
            .unwrap();
        registry
            .upsert(
                "freg_latest_timestamp",
                "Latest",
                &labels,
                &["kildedata"],
                MetricValue::info([("timestamp", "2024-02-01 00:00:00")]),
            )
            .unwrap();

        assert_eq!(registry.sample_count("freg_latest_timestamp"), Some(1));
        assert_eq!(
            registry.get("freg_latest_timestamp", &["kildedata"]),
            Some(MetricValue::info([("timestamp", "2024-02-01 00:00:00")]))
        );
    }

    #[test]
    fn test_info_key_cannot_shadow_label() {
        let registry = registry();
        let err = registry
            .upsert(
                "freg_latest_timestamp",
                "Latest",
                &["timestamp"],
                &["x"],
                MetricValue::info([("timestamp", "now")]),
            )
            .unwrap_err();
        assert!(matches!(err, MetricsError::InvalidLabelName { .. }));
        assert_eq!(registry.series_count(), 0);
    }

    #[test]
    fn test_gauge_cannot_take_exposed_name_of_info_series() {
        let registry = registry();
        registry
            .upsert::<&str, &str>(
                "freg_latest",
                "Latest",
                &[],
                &[],
                MetricValue::info([("timestamp", "now")]),
            )
            .unwrap();

        let err = registry
            .upsert::<&str, &str>("freg_latest_info", "Other", &[], &[], 1.0.into())
            .unwrap_err();
        match err {
            MetricsError::NameCollision { series, existing, exposed } => {
                assert_eq!(series, "freg_latest_info");
                assert_eq!(existing, "freg_latest");
                assert_eq!(exposed, "freg_latest_info");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.series_count(), 1);
        assert!(registry.increment::<&str, &str>("freg_latest_info", "", &[], &[], 1.0).is_err());
        assert_eq!(registry.render().matches("# TYPE freg_latest_info gauge").count(), 1);
    }

    #[test]
    fn test_info_series_cannot_shadow_existing_gauge() {
        let registry = registry();
        registry
            .upsert::<&str, &str>("freg_latest_info", "Gauge", &[], &[], 1.0.into())
            .unwrap();

        let err = registry
            .upsert::<&str, &str>(
                "freg_latest",
                "Latest",
                &[],
                &[],
                MetricValue::info([("timestamp", "now")]),
            )
            .unwrap_err();
        assert!(matches!(err, MetricsError::NameCollision { .. }));
        assert_eq!(err.error_type(), "registry");
        assert_eq!(registry.series_count(), 1);
        assert_eq!(registry.get::<&str>("freg_latest", &[]), None);
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let registry = registry();
        assert!(matches!(
            registry.upsert::<&str, &str>("1freg", "", &[], &[], 1.0.into()),
            Err(MetricsError::InvalidMetricName(_))
        ));
        assert!(matches!(
            registry.upsert::<&str, &str>("freg-rows", "", &[], &[], 1.0.into()),
            Err(MetricsError::InvalidMetricName(_))
        ));
        assert!(matches!(
            registry.upsert("freg_rows", "", &["bad-label"], &["x"], 1.0.into()),
            Err(MetricsError::InvalidLabelName { .. })
        ));
        assert!(matches!(
            registry.upsert("freg_rows", "", &["__reserved"], &["x"], 1.0.into()),
            Err(MetricsError::InvalidLabelName { .. })
        ));
        assert_eq!(registry.series_count(), 0);
    }

    #[test]
    fn test_increment_accumulates() {
        let registry = registry();
        assert_eq!(registry.count_call().unwrap(), 1.0);
        assert_eq!(registry.count_call().unwrap(), 2.0);
        assert_eq!(registry.count_call().unwrap(), 3.0);
        assert_eq!(
            registry.get::<&str>("freg_metrics_calls", &[]),
            Some(MetricValue::Gauge(3.0))
        );
    }

    #[test]
    fn test_builtin_series_use_prefix() {
        let registry = registry();
        registry.set_interval(5).unwrap();
        registry
            .record_time_used(
                "preagg_group_by_and_count",
                &SourceCoordinates::new("kvalitet", "metrics_count_group_by", ""),
                Duration::from_millis(1500),
            )
            .unwrap();

        assert_eq!(
            registry.get::<&str>("freg_metrics_interval", &[]),
            Some(MetricValue::Gauge(5.0))
        );
        assert_eq!(
            registry.get(
                "freg_metrics_time_used",
                &["preagg_group_by_and_count", "kvalitet", "metrics_count_group_by", ""]
            ),
            Some(MetricValue::Gauge(1.5))
        );
        assert_eq!(
            registry.label_names("freg_metrics_time_used").unwrap(),
            TIME_USED_LABELS
        );
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let registry = registry();
        registry
            .upsert("freg_b", "B", &["k"], &["z"], 1.0.into())
            .unwrap();
        registry
            .upsert("freg_b", "B", &["k"], &["a"], 2.0.into())
            .unwrap();
        registry
            .upsert::<&str, &str>("freg_a", "A", &[], &[], 3.0.into())
            .unwrap();

        let snapshot = registry.snapshot();
        let names: Vec<&str> = snapshot.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["freg_a", "freg_b"]);
        assert_eq!(snapshot[1].samples[0].label_values, vec!["a"]);
        assert_eq!(snapshot[1].samples[1].label_values, vec!["z"]);
    }

    #[test]
    fn test_concurrent_distinct_upserts_are_all_present() {
        const WRITERS: usize = 64;
        let registry = Arc::new(registry());

        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let group = format!("group-{}", i);
                    registry
                        .upsert(
                            "freg_group_by",
                            "Rows by group",
                            &["group"],
                            &[group.as_str()],
                            (i as f64).into(),
                        )
                        .unwrap();
                    // Interleave a reader with each writer.
                    let _ = registry.render();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.sample_count("freg_group_by"), Some(WRITERS));
        for i in 0..WRITERS {
            let group = format!("group-{}", i);
            assert_eq!(
                registry.get("freg_group_by", &[group.as_str()]),
                Some(MetricValue::Gauge(i as f64))
            );
        }
    }

    #[test]
    fn test_concurrent_increments_lose_nothing() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        registry.count_call().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            registry.get::<&str>("freg_metrics_calls", &[]),
            Some(MetricValue::Gauge(1600.0))
        );
    }
}
