//! Jobs.
//!
//! A job is a named unit of work with fixed source coordinates. Each run
//! issues one or more queries through [`JobContext::query`], maps the rows
//! to registry upserts, and on success records its own duration in
//! `metrics_time_used`.
//!
//! Jobs are plain structs implementing [`Job`]; the scheduler owns them as
//! `Arc<dyn Job>`.

mod group_by;
mod nullvals;
mod scalar;
mod timestamp;
mod validity;

pub use group_by::GroupByJob;
pub use nullvals::{NullvalsDiffJob, NullvalsLatestJob};
pub use scalar::TotalAndDistinctJob;
pub use timestamp::LatestTimestampJob;
pub use validity::{IdentValidationJob, ValidIdentsJob};

use crate::datasource::{DataSource, QueryDescriptor, Row, SourceCoordinates};
use crate::errors::MetricsError;
use crate::ident::CenturyRule;
use crate::registry::{MetricRegistry, MetricValue};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Row columns carrying the source coordinates of pre-aggregated rows.
pub const DATABASE_COLUMN: &str = "datasett";
pub const TABLE_COLUMN: &str = "tabell";
pub const VARIABLE_COLUMN: &str = "variabel";

/// Label schema for series keyed by source coordinates.
pub const SOURCE_LABELS: [&str; 3] = ["database", "table", "column"];

/// Everything a job needs to run.
#[derive(Clone)]
pub struct JobContext {
    pub registry: Arc<MetricRegistry>,
    pub source: Arc<dyn DataSource>,
    /// Project that owns the queried datasets.
    pub project: String,
    /// Century rule used by local identity-number validation.
    pub century_rule: CenturyRule,
}

impl JobContext {
    pub fn new(
        registry: Arc<MetricRegistry>,
        source: Arc<dyn DataSource>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            source,
            project: project.into(),
            century_rule: CenturyRule::default(),
        }
    }

    pub fn with_century_rule(mut self, rule: CenturyRule) -> Self {
        self.century_rule = rule;
        self
    }

    /// Run one query, counting it in `metrics_calls` first.
    pub async fn query(&self, name: &str, sql: String) -> Result<Vec<Row>, MetricsError> {
        self.registry.count_call()?;
        debug!(target: "fqm.job", query = %name, "Submitting query");
        self.source.query(&QueryDescriptor::new(name, sql)).await
    }

    /// Full series name for `suffix` under the registry prefix.
    pub fn metric(&self, suffix: &str) -> String {
        self.registry.qualified(suffix)
    }

    /// Upsert a gauge sample.
    pub fn set_gauge<V: AsRef<str>>(
        &self,
        suffix: &str,
        help: &str,
        label_names: &[&str],
        label_values: &[V],
        value: f64,
    ) -> Result<(), MetricsError> {
        self.registry.upsert(
            &self.metric(suffix),
            help,
            label_names,
            label_values,
            MetricValue::Gauge(value),
        )
    }

    /// Upsert an info sample with the single key `timestamp`.
    pub fn set_timestamp_info<V: AsRef<str>>(
        &self,
        suffix: &str,
        help: &str,
        label_names: &[&str],
        label_values: &[V],
        timestamp: String,
    ) -> Result<(), MetricsError> {
        self.registry.upsert(
            &self.metric(suffix),
            help,
            label_names,
            label_values,
            MetricValue::info([("timestamp", timestamp)]),
        )
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("registry", &self.registry.prefix())
            .field("project", &self.project)
            .field("century_rule", &self.century_rule)
            .finish()
    }
}

/// A scheduled unit of work.
#[async_trait]
pub trait Job: Send + Sync {
    /// Stable job name, used as the `name` label of `metrics_time_used`.
    fn name(&self) -> &str;

    /// Where this job reads from.
    fn source(&self) -> &SourceCoordinates;

    /// Query and upsert. Errors abort the rest of the run.
    async fn collect(&self, ctx: &JobContext) -> Result<(), MetricsError>;
}

/// Timing of one job run. Owned by that run only.
#[derive(Debug)]
pub struct JobRunRecord {
    job: String,
    source: SourceCoordinates,
    started: Instant,
}

impl JobRunRecord {
    pub fn start(job: &dyn Job) -> Self {
        Self {
            job: job.name().to_string(),
            source: job.source().clone(),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Consume the record into a `metrics_time_used` upsert.
    pub fn finish(self, registry: &MetricRegistry) -> Result<Duration, MetricsError> {
        let elapsed = self.elapsed();
        registry.record_time_used(&self.job, &self.source, elapsed)?;
        Ok(elapsed)
    }
}

/// Run a job once.
///
/// On success returns the elapsed time, which has also been recorded. On
/// failure nothing further is recorded and the error is returned.
pub async fn run_job(job: &dyn Job, ctx: &JobContext) -> Result<Duration, MetricsError> {
    let record = JobRunRecord::start(job);
    job.collect(ctx).await?;
    record.finish(&ctx.registry)
}

/// Source-coordinate label values of a pre-aggregated row.
pub(crate) fn row_source_labels(row: &Row) -> Result<[String; 3], MetricsError> {
    Ok([
        row.text(DATABASE_COLUMN)?,
        row.text(TABLE_COLUMN)?,
        row.text(VARIABLE_COLUMN)?,
    ])
}

/// The full job catalogue, in registration order.
///
/// `local_validation` adds [`IdentValidationJob`], which pulls raw identity
/// numbers and classifies them in-process.
pub fn default_jobs(local_validation: bool) -> Vec<Arc<dyn Job>> {
    let mut jobs: Vec<Arc<dyn Job>> = vec![
        Arc::new(TotalAndDistinctJob::default()),
        Arc::new(GroupByJob::group_by()),
        Arc::new(ValidIdentsJob::default()),
        Arc::new(LatestTimestampJob::preaggregated()),
        Arc::new(GroupByJob::citizenships()),
        Arc::new(LatestTimestampJob::dsfsit()),
        Arc::new(NullvalsLatestJob::default()),
        Arc::new(NullvalsDiffJob::default()),
        Arc::new(LatestTimestampJob::metrics()),
    ];
    if local_validation {
        jobs.push(Arc::new(IdentValidationJob::default()));
    }
    jobs
}
