//! Pipeline configuration.
//!
//! Built once at process start, either from environment variables or from a TOML
//! file with the same keys in lowercase, and passed by reference to each stage.

use serde::{Deserialize, Serialize};
use shortflow_core::{OutputFormat, RetryPolicy};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors from building a [`PipelineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {key}: {message}")]
    Invalid {
        key: &'static str,
        value: String,
        message: String,
    },

    #[error("unsupported raw format '{0}'")]
    UnsupportedFormat(String),

    #[error("unknown failed input policy '{0}' (expected 'archive' or 'quarantine')")]
    UnknownPolicy(String),

    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// What happens to raw inputs whose transform failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedInputPolicy {
    /// Archive with everything else in `processing/`.
    #[default]
    Archive,
    /// Move to `{prefix}/failed/` before archiving.
    Quarantine,
}

impl FromStr for FailedInputPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "archive" => Ok(FailedInputPolicy::Archive),
            "quarantine" => Ok(FailedInputPolicy::Quarantine),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

/// Settings shared by the extract and transform stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Storage container holding every zone.
    pub bucket: String,

    /// Base key prefix; zones live at `{prefix}/{zone}/`.
    pub prefix: String,

    /// Report server base URL, without the endpoint path.
    pub base_url: String,

    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Root directory for the local filesystem store.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Scratch directory for downloaded and generated files.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    #[serde(default)]
    pub raw_format: OutputFormat,

    /// Registry name of the transform to apply.
    #[serde(default = "default_dataset")]
    pub dataset: String,

    #[serde(default)]
    pub failed_inputs: FailedInputPolicy,
}

fn default_retry_limit() -> u32 {
    shortflow_core::retry::DEFAULT_MAX_ATTEMPTS
}

fn default_retry_backoff_ms() -> u64 {
    shortflow_core::retry::DEFAULT_BACKOFF.as_millis() as u64
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("storage")
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("shortflow")
}

fn default_dataset() -> String {
    "short_sales".to_string()
}

impl PipelineConfig {
    /// Minimal config with defaults for everything optional.
    pub fn new(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            base_url: base_url.into(),
            retry_limit: default_retry_limit(),
            retry_backoff_ms: default_retry_backoff_ms(),
            storage_root: default_storage_root(),
            work_dir: default_work_dir(),
            raw_format: OutputFormat::default(),
            dataset: default_dataset(),
            failed_inputs: FailedInputPolicy::default(),
        }
    }

    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read using `lookup` for each variable. Unset and blank values are absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let mut config = Self::new(
            required("BUCKET_WORKING")?,
            required("BUCKET_PREFIX")?,
            required("BASE_URL")?,
        );

        if let Some(v) = get("RETRY_LIMIT") {
            config.retry_limit = parse_number("RETRY_LIMIT", &v)?;
        }
        if let Some(v) = get("RETRY_BACKOFF_MS") {
            config.retry_backoff_ms = parse_number("RETRY_BACKOFF_MS", &v)?;
        }
        if let Some(v) = get("STORAGE_ROOT") {
            config.storage_root = PathBuf::from(v);
        }
        if let Some(v) = get("WORK_DIR") {
            config.work_dir = PathBuf::from(v);
        }
        if let Some(v) = get("RAW_FORMAT") {
            config.raw_format = v
                .parse()
                .map_err(|_| ConfigError::UnsupportedFormat(v.clone()))?;
        }
        if let Some(v) = get("DATASET") {
            config.dataset = v.trim().to_string();
        }
        if let Some(v) = get("FAILED_INPUT_POLICY") {
            config.failed_inputs = v.parse()?;
        }

        Ok(config)
    }

    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Retry policy for every external call in a run.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_limit, Duration::from_millis(self.retry_backoff_ms))
    }

    /// Prefix with any trailing `/` removed, for building zone keys.
    pub fn base_prefix(&self) -> &str {
        self.prefix.trim_end_matches('/')
    }
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        message: e.to_string(),
    })
}
