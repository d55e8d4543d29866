//! Content service client configuration.
//!
//! Holds the service base URL, the API key, and the per-request timeout.
//! Environment loading lives with the rest of the run configuration in
//! `submitter-sync`; this type only validates what it is given.

use url::Url;
use zeroize::Zeroizing;

/// Default per-request timeout. Bulk uploads of large batches can take a while.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for connecting to the content service.
///
/// Custom `Debug` implementation redacts the `api_key` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct ContentServiceConfig {
    /// Service base URL. Endpoint paths are appended after a single `/`.
    pub base_url: Url,
    /// API key, sent as the basic-auth password.
    pub api_key: Zeroizing<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ContentServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentServiceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ContentServiceConfig {
    /// Validate a base URL and API key, using the default timeout.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingApiKey` for an empty key and
    /// `ConfigError::InvalidUrl` if `base_url` does not parse.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = Zeroizing::new(api_key.into());
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        let base_url = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(base_url.to_string(), e.to_string()))?;
        Ok(Self {
            base_url,
            api_key,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Override the per-request timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Full URL for an endpoint path such as `checkassets`.
    ///
    /// A trailing `/` on the base URL is ignored, so `https://svc/` and
    /// `https://svc` address the same endpoints.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("content service API key is required")]
    MissingApiKey,
    #[error("invalid content service URL {0}: {1}")]
    InvalidUrl(String, String),
}
