//! Exporter configuration.
//!
//! Configuration is loaded from environment variables. Every field has a
//! default. The static BigQuery access token is redacted in Debug output.

use crate::ident::CenturyRule;
use crate::registry::validate_metric_name;
use crate::scheduler::OverlapPolicy;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default project that owns the quality datasets.
pub const DEFAULT_GCP_PROJECT: &str = "dev-freg-3896";

/// Default polling interval in minutes.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default prefix of every exported series.
pub const DEFAULT_METRIC_PREFIX: &str = "freg_";

/// Default BigQuery REST API root.
pub const DEFAULT_BIGQUERY_API_URL: &str = "https://bigquery.googleapis.com";

/// Default GCE metadata server.
pub const DEFAULT_GCE_METADATA_URL: &str = "http://metadata.google.internal";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected 'text' or 'json', got '{}'", other)),
        }
    }
}

/// Exporter configuration.
#[derive(Clone)]
pub struct Config {
    /// Project that owns the queried datasets (default: "dev-freg-3896").
    pub gcp_project: String,

    /// Polling interval in minutes (default: 5).
    pub interval_minutes: u64,

    /// HTTP bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Prefix of every exported series (default: "freg_").
    pub metric_prefix: String,

    /// BigQuery REST API root.
    pub bigquery_api_url: String,

    /// Static bearer token. When unset, tokens come from the metadata server.
    pub bigquery_access_token: Option<SecretString>,

    /// GCE metadata server root.
    pub gce_metadata_url: String,

    /// Whether to run the local identity-number validation job.
    pub validate_idents_locally: bool,

    /// Century rule used by local validation.
    pub ident_century_rule: CenturyRule,

    /// Overlap policy for slow job runs.
    pub job_overlap: OverlapPolicy,

    /// Seconds to wait after a shutdown signal before stopping.
    pub drain_seconds: u64,

    /// Log output format.
    pub log_format: LogFormat,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("gcp_project", &self.gcp_project)
            .field("interval_minutes", &self.interval_minutes)
            .field("bind_address", &self.bind_address)
            .field("metric_prefix", &self.metric_prefix)
            .field("bigquery_api_url", &self.bigquery_api_url)
            .field(
                "bigquery_access_token",
                &self.bigquery_access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("gce_metadata_url", &self.gce_metadata_url)
            .field("validate_idents_locally", &self.validate_idents_locally)
            .field("ident_century_rule", &self.ident_century_rule)
            .field("job_overlap", &self.job_overlap)
            .field("drain_seconds", &self.drain_seconds)
            .field("log_format", &self.log_format)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid interval configuration: {0}")]
    InvalidInterval(String),

    #[error("Invalid metric prefix: {0}")]
    InvalidMetricPrefix(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let gcp_project = vars
            .get("GCP_PROJECT")
            .cloned()
            .unwrap_or_else(|| DEFAULT_GCP_PROJECT.to_string());

        let interval_minutes = if let Some(value_str) = vars.get("INTERVAL_MINUTES") {
            let value: u64 = value_str.trim().parse().map_err(|e| {
                ConfigError::InvalidInterval(format!(
                    "INTERVAL_MINUTES must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidInterval(
                    "INTERVAL_MINUTES must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_INTERVAL_MINUTES
        };

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let metric_prefix = vars
            .get("METRIC_PREFIX")
            .cloned()
            .unwrap_or_else(|| DEFAULT_METRIC_PREFIX.to_string());
        // An empty prefix is allowed; otherwise the prefix itself must be a valid name.
        if !metric_prefix.is_empty() && validate_metric_name(&metric_prefix).is_err() {
            return Err(ConfigError::InvalidMetricPrefix(format!(
                "METRIC_PREFIX must match [a-zA-Z_:][a-zA-Z0-9_:]*, got '{}'",
                metric_prefix
            )));
        }

        let bigquery_api_url = vars
            .get("BIGQUERY_API_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIGQUERY_API_URL.to_string());

        let bigquery_access_token = vars
            .get("BIGQUERY_ACCESS_TOKEN")
            .filter(|token| !token.is_empty())
            .map(|token| SecretString::from(token.clone()));

        let gce_metadata_url = vars
            .get("GCE_METADATA_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_GCE_METADATA_URL.to_string());

        let validate_idents_locally = parse_var(vars, "VALIDATE_IDENTS_LOCALLY", parse_bool)?
            .unwrap_or(false);

        let ident_century_rule =
            parse_var(vars, "IDENT_CENTURY_RULE", str::parse::<CenturyRule>)?.unwrap_or_default();

        let job_overlap =
            parse_var(vars, "JOB_OVERLAP", str::parse::<OverlapPolicy>)?.unwrap_or_default();

        let drain_seconds = parse_var(vars, "DRAIN_SECONDS", |s| {
            s.parse::<u64>().map_err(|e| e.to_string())
        })?
        .unwrap_or(0);

        let log_format =
            parse_var(vars, "LOG_FORMAT", str::parse::<LogFormat>)?.unwrap_or_default();

        Ok(Config {
            gcp_project,
            interval_minutes,
            bind_address,
            metric_prefix,
            bigquery_api_url,
            bigquery_access_token,
            gce_metadata_url,
            validate_idents_locally,
            ident_century_rule,
            job_overlap,
            drain_seconds,
            log_format,
        })
    }

    /// Polling interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn drain_period(&self) -> Duration {
        Duration::from_secs(self.drain_seconds)
    }
}

/// Parse an optional variable. Absent means `Ok(None)`.
fn parse_var<T>(
    vars: &HashMap<String, String>,
    name: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ConfigError> {
    vars.get(name)
        .map(|value| {
            parse(value.trim()).map_err(|reason| ConfigError::InvalidValue {
                name: name.to_string(),
                reason,
            })
        })
        .transpose()
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(format!("expected a boolean, got '{}'", other)),
    }
}
