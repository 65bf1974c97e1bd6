//! BigQuery REST client.
//!
//! Runs standard-SQL queries with `jobs.query` and reads any remaining pages
//! with `jobs.getQueryResults`. Cells are decoded with the result schema:
//!
//! | BigQuery type | Cell |
//! |---|---|
//! | INTEGER, INT64 | `Int` |
//! | FLOAT, FLOAT64, NUMERIC, BIGNUMERIC | `Float` |
//! | BOOLEAN, BOOL | `Bool` |
//! | TIMESTAMP (epoch seconds) | `Timestamp` |
//! | anything else | `Text` |
//!
//! JSON `null` is always `Null`.

use super::token::TokenProvider;
use super::{Cell, DataSource, QueryDescriptor, Row};
use crate::errors::MetricsError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Connect timeout for BigQuery requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How long `getQueryResults` may wait server-side for an unfinished job.
const RESULTS_WAIT_MS: u64 = 10_000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
}

/// Shared shape of `jobs.query` and `jobs.getQueryResults` responses.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    rows: Vec<TableRow>,
    #[serde(default)]
    page_token: Option<String>,
    #[serde(default)]
    job_complete: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldSchema {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// HTTP client for the BigQuery REST API.
#[derive(Debug)]
pub struct BigQueryClient {
    client: Client,
    /// API root, e.g. `https://bigquery.googleapis.com`.
    api_url: String,
    project: String,
    tokens: TokenProvider,
}

impl BigQueryClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::DataSource` if the HTTP client cannot be built.
    pub fn new(
        api_url: impl Into<String>,
        project: impl Into<String>,
        tokens: TokenProvider,
    ) -> Result<Self, MetricsError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                error!(
                    target: "fqm.datasource.bigquery",
                    error = %e,
                    "Failed to build HTTP client"
                );
                MetricsError::DataSource(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            project: project.into(),
            tokens,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn queries_url(&self) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/queries",
            self.api_url, self.project
        )
    }

    async fn start_query(&self, sql: &str) -> Result<QueryResponse, MetricsError> {
        let token = self.tokens.bearer().await?;
        let response = self
            .client
            .post(self.queries_url())
            .bearer_auth(token.expose_secret())
            .json(&QueryRequest {
                query: sql,
                use_legacy_sql: false,
            })
            .send()
            .await
            .map_err(|e| {
                warn!(target: "fqm.datasource.bigquery", error = %e, "BigQuery request failed");
                MetricsError::DataSource(format!("BigQuery request failed: {}", e))
            })?;

        handle_response(response).await
    }

    async fn fetch_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, MetricsError> {
        let token = self.tokens.bearer().await?;
        let url = format!("{}/{}", self.queries_url(), job.job_id);

        let mut params: Vec<(&str, String)> = vec![("timeoutMs", RESULTS_WAIT_MS.to_string())];
        if let Some(location) = &job.location {
            params.push(("location", location.clone()));
        }
        if let Some(page_token) = page_token {
            params.push(("pageToken", page_token.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(token.expose_secret())
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                warn!(
                    target: "fqm.datasource.bigquery",
                    error = %e,
                    "BigQuery results request failed"
                );
                MetricsError::DataSource(format!("BigQuery request failed: {}", e))
            })?;

        handle_response(response).await
    }
}

#[async_trait]
impl DataSource for BigQueryClient {
    #[instrument(skip_all, fields(query = %query.name))]
    async fn query(&self, query: &QueryDescriptor) -> Result<Vec<Row>, MetricsError> {
        debug!(target: "fqm.datasource.bigquery", "Submitting query");

        let mut page = self.start_query(&query.sql).await?;
        let mut schema: Option<TableSchema> = None;
        let mut job: Option<JobReference> = None;
        let mut rows = Vec::new();
        let mut pages = 1usize;

        loop {
            if schema.is_none() {
                schema = page.schema.take();
            }
            if let Some(reference) = page.job_reference.take() {
                job = Some(reference);
            }

            let complete = page.job_complete.unwrap_or(true);
            if complete && !page.rows.is_empty() {
                let fields = schema.as_ref().ok_or_else(|| {
                    MetricsError::DataSource("BigQuery returned rows without a schema".to_string())
                })?;
                for raw in page.rows.drain(..) {
                    rows.push(decode_row(&fields.fields, raw)?);
                }
            }

            let next_token = page.page_token.take();
            if complete && next_token.is_none() {
                break;
            }

            let reference = job.as_ref().ok_or_else(|| {
                MetricsError::DataSource(
                    "BigQuery response is incomplete but has no job reference".to_string(),
                )
            })?;
            // An unfinished job is polled without a page token.
            let token = if complete { next_token.as_deref() } else { None };
            page = self.fetch_results(reference, token).await?;
            pages += 1;
        }

        debug!(
            target: "fqm.datasource.bigquery",
            rows = rows.len(),
            pages = pages,
            "Query complete"
        );
        Ok(rows)
    }
}

/// Map response status codes to errors.
async fn handle_response(response: reqwest::Response) -> Result<QueryResponse, MetricsError> {
    let status = response.status();

    if status.is_success() {
        return response.json().await.map_err(|e| {
            error!(
                target: "fqm.datasource.bigquery",
                error = %e,
                "Failed to parse BigQuery response"
            );
            MetricsError::DataSource(format!("Invalid BigQuery response: {}", e))
        });
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .map(|body| body.error.message)
        .unwrap_or_default();

    if status.as_u16() == 401 || status.as_u16() == 403 {
        warn!(target: "fqm.datasource.bigquery", status = %status, "BigQuery rejected credentials");
        Err(MetricsError::Authentication(format!(
            "BigQuery returned {}: {}",
            status, message
        )))
    } else {
        warn!(
            target: "fqm.datasource.bigquery",
            status = %status,
            message = %message,
            "BigQuery returned an error"
        );
        Err(MetricsError::DataSource(format!(
            "BigQuery returned {}: {}",
            status, message
        )))
    }
}

fn decode_row(fields: &[FieldSchema], raw: TableRow) -> Result<Row, MetricsError> {
    if raw.f.len() != fields.len() {
        return Err(MetricsError::DataSource(format!(
            "BigQuery row has {} cells but schema has {} fields",
            raw.f.len(),
            fields.len()
        )));
    }
    let mut row = Row::new();
    for (field, cell) in fields.iter().zip(raw.f) {
        let decoded = decode_cell(field, cell.v)?;
        row.push(field.name.clone(), decoded);
    }
    Ok(row)
}

fn decode_cell(field: &FieldSchema, value: Value) -> Result<Cell, MetricsError> {
    let text = match value {
        Value::Null => return Ok(Cell::Null),
        Value::String(s) => s,
        Value::Bool(b) => return Ok(Cell::Bool(b)),
        // Nested and repeated values are passed through as JSON text.
        other => other.to_string(),
    };

    let invalid = |reason: String| MetricsError::InvalidColumn {
        column: field.name.clone(),
        reason,
    };

    match field.field_type.as_str() {
        "INTEGER" | "INT64" => text
            .parse::<i64>()
            .map(Cell::Int)
            .map_err(|e| invalid(format!("'{}' is not an integer: {}", text, e))),
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => text
            .parse::<f64>()
            .map(Cell::Float)
            .map_err(|e| invalid(format!("'{}' is not a number: {}", text, e))),
        "BOOLEAN" | "BOOL" => match text.to_ascii_lowercase().as_str() {
            "true" => Ok(Cell::Bool(true)),
            "false" => Ok(Cell::Bool(false)),
            _ => Err(invalid(format!("'{}' is not a boolean", text))),
        },
        "TIMESTAMP" => parse_epoch_seconds(&text)
            .map(Cell::Timestamp)
            .ok_or_else(|| invalid(format!("'{}' is not an epoch timestamp", text))),
        _ => Ok(Cell::Text(text)),
    }
}

/// BigQuery serializes TIMESTAMP as fractional epoch seconds, e.g. `1.7092515E9`.
fn parse_epoch_seconds(text: &str) -> Option<DateTime<Utc>> {
    let seconds = text.parse::<f64>().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let micros = (seconds * 1_000_000.0).round() as i64;
    DateTime::from_timestamp_micros(micros)
}
