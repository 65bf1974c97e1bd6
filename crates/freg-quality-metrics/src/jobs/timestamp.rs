//! Latest-timestamp facts, published as info series with key `timestamp`.

use super::{row_source_labels, Job, JobContext, SOURCE_LABELS};
use crate::datasource::SourceCoordinates;
use crate::errors::MetricsError;
use async_trait::async_trait;

pub const LATEST_TIMESTAMP_COLUMN: &str = "latest_timestamp";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Shape {
    /// One sample per row, labeled by the row's source coordinates.
    PerRow,
    /// A single unlabeled sample: `MAX(column)` of the source table.
    Max { column: &'static str },
}

/// Publishes the most recent timestamp of a source.
#[derive(Debug, Clone)]
pub struct LatestTimestampJob {
    name: &'static str,
    source: SourceCoordinates,
    series: &'static str,
    help: &'static str,
    shape: Shape,
}

impl LatestTimestampJob {
    pub const PREAGGREGATED: &'static str = "preagg_latest_timestamp";
    pub const METRICS: &'static str = "metrics_timestamp";
    pub const DSFSIT: &'static str = "dsfsit_latest_timestamp";

    /// `latest_timestamp{database,table,column}` from `kvalitet.metrics_latest_timestamp`.
    pub fn preaggregated() -> Self {
        Self {
            name: Self::PREAGGREGATED,
            source: SourceCoordinates::new("kvalitet", "metrics_latest_timestamp", ""),
            series: "latest_timestamp",
            help: "The latest timestamp",
            shape: Shape::PerRow,
        }
    }

    /// When the aggregated quality tables were last refreshed.
    pub fn metrics() -> Self {
        Self {
            name: Self::METRICS,
            source: SourceCoordinates::new(
                "kvalitet",
                "metrics_count_total_and_distinct",
                "tidspunkt",
            ),
            series: "metrics_timestamp",
            help: "Timestamp for when metrics was last updated in Bigquery.kvalitet aggregated tables",
            shape: Shape::Max {
                column: "tidspunkt",
            },
        }
    }

    /// Latest run of the DSF_SITUASJONSUTTAK null-value checks.
    pub fn dsfsit() -> Self {
        Self {
            name: Self::DSFSIT,
            source: SourceCoordinates::new("kvalitet", "qa_nullvalue_columns", ""),
            series: "dsfsit_latest_timestamp",
            help: "The latest run of DSF_SITUASJONSUTTAK",
            shape: Shape::Max {
                column: "tidspunkt",
            },
        }
    }

    fn sql(&self, project: &str) -> String {
        let table = self.source.table_ref(project);
        match &self.shape {
            Shape::PerRow => format!(
                "SELECT datasett, tabell, variabel, latest_timestamp FROM {table} \
                 WHERE tidspunkt = (SELECT MAX(tidspunkt) FROM {table})"
            ),
            Shape::Max { column } => {
                format!("SELECT MAX({column}) AS {LATEST_TIMESTAMP_COLUMN} FROM {table}")
            }
        }
    }
}

#[async_trait]
impl Job for LatestTimestampJob {
    fn name(&self) -> &str {
        self.name
    }

    fn source(&self) -> &SourceCoordinates {
        &self.source
    }

    async fn collect(&self, ctx: &JobContext) -> Result<(), MetricsError> {
        let rows = ctx.query(self.name, self.sql(&ctx.project)).await?;
        match self.shape {
            Shape::PerRow => {
                for row in &rows {
                    let labels = row_source_labels(row)?;
                    ctx.set_timestamp_info(
                        self.series,
                        self.help,
                        &SOURCE_LABELS,
                        &labels,
                        row.text(LATEST_TIMESTAMP_COLUMN)?,
                    )?;
                }
            }
            Shape::Max { .. } => {
                if let Some(row) = rows.first() {
                    ctx.set_timestamp_info::<&str>(
                        self.series,
                        self.help,
                        &[],
                        &[],
                        row.text(LATEST_TIMESTAMP_COLUMN)?,
                    )?;
                }
            }
        }
        Ok(())
    }
}
