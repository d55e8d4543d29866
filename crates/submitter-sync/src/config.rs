//! Run configuration, read from the environment.
//!
//! | Variable                       | Required | Default  |
//! |--------------------------------|----------|----------|
//! | `ENVELOPE_DIR`                 | yes      |          |
//! | `ASSET_DIR`                    | yes      |          |
//! | `CONTENT_SERVICE_URL`          | yes      |          |
//! | `CONTENT_SERVICE_APIKEY`       | yes      |          |
//! | `CONTENT_ID_BASE`              | yes      |          |
//! | `ASSET_BATCH_SIZE`             | no       | 30 MiB   |
//! | `CONTENT_SERVICE_TIMEOUT_SECS` | no       | 60       |
//! | `VERBOSE`                      | no       | unset    |
//!
//! Empty values count as missing. `VERBOSE` is enabled by its presence.

use std::path::PathBuf;

use submitter_client::{ConfigError as ServiceConfigError, ContentServiceConfig};

pub const ENVELOPE_DIR: &str = "ENVELOPE_DIR";
pub const ASSET_DIR: &str = "ASSET_DIR";
pub const CONTENT_SERVICE_URL: &str = "CONTENT_SERVICE_URL";
pub const CONTENT_SERVICE_APIKEY: &str = "CONTENT_SERVICE_APIKEY";
pub const CONTENT_ID_BASE: &str = "CONTENT_ID_BASE";
pub const ASSET_BATCH_SIZE: &str = "ASSET_BATCH_SIZE";
pub const CONTENT_SERVICE_TIMEOUT_SECS: &str = "CONTENT_SERVICE_TIMEOUT_SECS";
pub const VERBOSE: &str = "VERBOSE";

/// Default compressed size threshold for one asset upload batch.
pub const DEFAULT_BATCH_SIZE: u64 = 30 * 1024 * 1024;

/// Everything one submission run needs.
#[derive(Debug, Clone)]
pub struct SubmitConfig {
    pub envelope_dir: PathBuf,
    pub asset_dir: PathBuf,
    /// Content-ID prefix, always ending in `/`.
    pub content_id_base: String,
    /// Compressed bytes after which an asset batch is closed.
    pub batch_size: u64,
    pub verbose: bool,
    pub service: ContentServiceConfig,
}

impl SubmitConfig {
    /// Build a configuration with default batch size and quiet logging.
    pub fn new(
        envelope_dir: impl Into<PathBuf>,
        asset_dir: impl Into<PathBuf>,
        content_id_base: &str,
        service: ContentServiceConfig,
    ) -> Self {
        Self {
            envelope_dir: envelope_dir.into(),
            asset_dir: asset_dir.into(),
            content_id_base: normalize_base(content_id_base),
            batch_size: DEFAULT_BATCH_SIZE,
            verbose: false,
            service,
        }
    }

    /// Override the asset batch size.
    pub fn with_batch_size(mut self, batch_size: u64) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// See [`SubmitConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using `lookup` to resolve each variable.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Missing` naming every required variable that is unset.
    /// - `ConfigError::InvalidValue` for an unparseable optional value.
    /// - `ConfigError::Service` if the URL or API key is rejected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |var: &str| lookup(var).filter(|value| !value.is_empty());

        let mut missing = Vec::new();
        let mut require = |var: &'static str| {
            let value = required(var);
            if value.is_none() {
                missing.push(var);
            }
            value.unwrap_or_default()
        };
        let envelope_dir = require(ENVELOPE_DIR);
        let asset_dir = require(ASSET_DIR);
        let service_url = require(CONTENT_SERVICE_URL);
        let api_key = require(CONTENT_SERVICE_APIKEY);
        let content_id_base = require(CONTENT_ID_BASE);
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let batch_size = match required(ASSET_BATCH_SIZE) {
            Some(raw) => parse_positive(ASSET_BATCH_SIZE, &raw)?,
            None => DEFAULT_BATCH_SIZE,
        };
        let timeout_secs = match required(CONTENT_SERVICE_TIMEOUT_SECS) {
            Some(raw) => parse_positive(CONTENT_SERVICE_TIMEOUT_SECS, &raw)?,
            None => submitter_client::config::DEFAULT_TIMEOUT_SECS,
        };

        let service = ContentServiceConfig::new(service_url.trim_end_matches('/'), api_key)?
            .with_timeout_secs(timeout_secs);

        Ok(Self {
            envelope_dir: PathBuf::from(envelope_dir),
            asset_dir: PathBuf::from(asset_dir),
            content_id_base: normalize_base(&content_id_base),
            batch_size,
            verbose: lookup(VERBOSE).is_some(),
            service,
        })
    }
}

fn normalize_base(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

fn parse_positive(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            var,
            reason: "must be greater than zero".to_string(),
        }),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::InvalidValue {
            var,
            reason: e.to_string(),
        }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    #[error(transparent)]
    Service(#[from] ServiceConfigError),
}
