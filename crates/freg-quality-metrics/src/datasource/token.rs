//! Bearer tokens for the BigQuery REST API.
//!
//! Either a static token from configuration, or a service-account token
//! fetched from the GCE metadata server and cached until shortly before it
//! expires.
//!
//! # Security
//!
//! - Tokens are held as `SecretString` and never logged
//! - Metadata responses are parsed into a type with a redacting `Debug`

use crate::errors::MetricsError;
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Path of the default service-account token on the metadata server.
pub const METADATA_TOKEN_PATH: &str =
    "/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh a cached token this long before it expires.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Default HTTP timeout for metadata requests.
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

/// Token response from the metadata server.
#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

impl std::fmt::Debug for MetadataTokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[derive(Debug)]
struct CachedToken {
    token: SecretString,
    /// Unix seconds.
    expires_at: i64,
}

/// Source of bearer tokens.
#[derive(Debug)]
pub enum TokenProvider {
    /// Fixed token from configuration.
    Static(SecretString),
    /// Token from the GCE metadata server.
    Metadata {
        client: reqwest::Client,
        base_url: String,
        cache: Mutex<Option<CachedToken>>,
    },
}

impl TokenProvider {
    pub fn fixed(token: SecretString) -> Self {
        TokenProvider::Static(token)
    }

    /// Metadata-server provider rooted at `base_url`, e.g. `http://metadata.google.internal`.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::Authentication` if the HTTP client cannot be built.
    pub fn metadata(base_url: impl Into<String>) -> Result<Self, MetricsError> {
        let client = reqwest::Client::builder()
            .timeout(METADATA_TIMEOUT)
            .connect_timeout(METADATA_TIMEOUT)
            .build()
            .map_err(|e| {
                MetricsError::Authentication(format!("Failed to build metadata client: {}", e))
            })?;
        Ok(TokenProvider::Metadata {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache: Mutex::new(None),
        })
    }

    /// Current bearer token, refreshing from the metadata server when needed.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::Authentication` if the metadata server is
    /// unreachable, rejects the request, or answers with an unreadable body.
    pub async fn bearer(&self) -> Result<SecretString, MetricsError> {
        match self {
            TokenProvider::Static(token) => Ok(token.clone()),
            TokenProvider::Metadata {
                client,
                base_url,
                cache,
            } => {
                let mut cached = cache.lock().await;
                let now = chrono::Utc::now().timestamp();
                if let Some(entry) = cached.as_ref() {
                    if entry.expires_at - REFRESH_MARGIN_SECS > now {
                        return Ok(entry.token.clone());
                    }
                }

                let fresh = fetch_metadata_token(client, base_url).await?;
                let token = fresh.token.clone();
                *cached = Some(fresh);
                Ok(token)
            }
        }
    }
}

async fn fetch_metadata_token(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<CachedToken, MetricsError> {
    let url = format!("{}{}", base_url, METADATA_TOKEN_PATH);
    debug!(target: "fqm.datasource.token", url = %url, "Requesting token from metadata server");

    let response = client
        .get(&url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| {
            warn!(target: "fqm.datasource.token", error = %e, "Metadata request failed");
            MetricsError::Authentication(format!("Metadata server unavailable: {}", e))
        })?;

    let status = response.status();
    if !status.is_success() {
        warn!(
            target: "fqm.datasource.token",
            status = %status,
            "Metadata server rejected token request"
        );
        return Err(MetricsError::Authentication(format!(
            "Metadata server returned {}",
            status
        )));
    }

    let body: MetadataTokenResponse = response.json().await.map_err(|e| {
        warn!(
            target: "fqm.datasource.token",
            error = %e,
            "Failed to parse metadata token response"
        );
        MetricsError::Authentication(format!("Invalid metadata token response: {}", e))
    })?;

    let now = chrono::Utc::now().timestamp();
    let expires_at = now.saturating_add(i64::try_from(body.expires_in).unwrap_or(i64::MAX));
    debug!(target: "fqm.datasource.token", expires_in_secs = body.expires_in, "Token acquired");

    Ok(CachedToken {
        token: SecretString::from(body.access_token),
        expires_at,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_static_token_is_returned_as_is() {
        let provider = TokenProvider::fixed(SecretString::from("static-token"));
        assert_eq!(provider.bearer().await.unwrap().expose_secret(), "static-token");
    }

    #[tokio::test]
    async fn test_metadata_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(METADATA_TOKEN_PATH))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "metadata-token",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = TokenProvider::metadata(server.uri()).unwrap();
        assert_eq!(provider.bearer().await.unwrap().expose_secret(), "metadata-token");
        assert_eq!(provider.bearer().await.unwrap().expose_secret(), "metadata-token");
    }

    #[tokio::test]
    async fn test_metadata_token_near_expiry_is_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(METADATA_TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "short-lived",
                "expires_in": 30
            })))
            .expect(2)
            .mount(&server)
            .await;

        let provider = TokenProvider::metadata(server.uri()).unwrap();
        provider.bearer().await.unwrap();
        provider.bearer().await.unwrap();
    }

    #[tokio::test]
    async fn test_metadata_error_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(METADATA_TOKEN_PATH))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let provider = TokenProvider::metadata(server.uri()).unwrap();
        assert!(matches!(
            provider.bearer().await,
            Err(MetricsError::Authentication(_))
        ));
    }

    #[test]
    fn test_metadata_response_debug_redacts_token() {
        let response = MetadataTokenResponse {
            access_token: "secret".to_string(),
            expires_in: 10,
        };
        let debug = format!("{:?}", response);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret"));
    }
}
