//! Session credentials, HTTP client construction and log-safe URL rendering.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::AppError;
use crate::salesforce::API_VERSION;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// User agent string for all bulk API requests.
const CLIENT_USER_AGENT: &str = "stampede-bulk/0.1.0";

/// Default per-request timeout in seconds. Uploads of a full 100 MB batch
/// need the headroom.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// URL Sanitization
// ─────────────────────────────────────────────────────────────────────────────

/// Renders a URL for logs and error values: path only, never scheme, host,
/// query or fragment.
pub fn sanitize_url_for_logs(url: &Url) -> String {
    url.path().to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// SessionCredentials
// ─────────────────────────────────────────────────────────────────────────────

/// An already-established Salesforce session.
///
/// Obtaining the token (OAuth, JWT bearer, username/password) happens outside
/// this crate. The token is wrapped in `SecretString` so it never shows up in
/// `Debug` output or logs.
#[derive(Clone)]
pub struct SessionCredentials {
    /// Instance URL (e.g. "https://na1.salesforce.com").
    pub instance_url: Url,
    /// OAuth access token / session id.
    pub access_token: SecretString,
    /// REST API version (e.g. "v60.0").
    pub api_version: String,
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("instance_url", &self.instance_url.as_str())
            .field("access_token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl SessionCredentials {
    /// Creates credentials for the default API version.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigurationError` if `instance_url` is not an
    /// absolute http(s) URL.
    pub fn new(instance_url: &str, access_token: impl Into<String>) -> Result<Self, AppError> {
        let instance_url = Url::parse(instance_url).map_err(|e| {
            AppError::ConfigurationError(format!("Invalid instance URL: {}", e))
        })?;

        if !matches!(instance_url.scheme(), "http" | "https") {
            return Err(AppError::ConfigurationError(format!(
                "Instance URL must be http(s), got scheme '{}'",
                instance_url.scheme()
            )));
        }

        Ok(Self {
            instance_url,
            access_token: SecretString::from(access_token.into()),
            api_version: API_VERSION.to_string(),
        })
    }

    /// Overrides the REST API version. Accepts "60.0" or "v60.0".
    pub fn with_api_version(mut self, version: &str) -> Self {
        self.api_version = if version.starts_with('v') {
            version.to_string()
        } else {
            format!("v{}", version)
        };
        self
    }

    /// Base URL of the ingest resource:
    /// `{instance}/services/data/{version}/jobs/ingest/`.
    pub fn ingest_base_url(&self) -> Result<Url, AppError> {
        let path = format!("/services/data/{}/jobs/ingest/", self.api_version);
        self.instance_url
            .join(&path)
            .map_err(|e| AppError::Internal(format!("Failed to build ingest URL: {}", e)))
    }

    pub(crate) fn bearer_token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

/// Builds the shared HTTP client with the crate's user agent and timeout.
pub fn build_http_client() -> Result<reqwest::Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}
