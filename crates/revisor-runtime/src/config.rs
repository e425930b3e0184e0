//! Runtime configuration.
//!
//! Tunables come from an optional YAML file; secrets and endpoint URLs come
//! from the environment into a [`ConfigValues`] snapshot that backends check
//! before doing any work.
//!
//! ```yaml
//! hosted:
//!   model: gpt-3.5-turbo-16k
//!   base_url: https://api.openai.com/v1
//! request_timeout: 60s
//! max_concurrency: 1
//! isolate_failures: false
//! ```

use revisor_core::ConfigValues;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::providers::{
    DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL, LLAMA2_API_URL_ENV, OPENAI_API_KEY_ENV,
};

/// Every configuration value any backend may require.
pub const KNOWN_CONFIG_VALUES: &[&str] = &[OPENAI_API_KEY_ENV, LLAMA2_API_URL_ENV];

/// Errors loading a runtime configuration file.
#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Hosted backend settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostedSettings {
    /// Model id sent with every completion
    pub model: String,

    /// API base, without the `/chat/completions` suffix
    pub base_url: String,
}

impl Default for HostedSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

/// How declared evaluations are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPolicy {
    /// Maximum in-flight model calls per fan-out
    pub max_concurrency: usize,

    /// Record a failed evaluation in its slot instead of aborting the review
    pub isolate_failures: bool,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            isolate_failures: false,
        }
    }
}

/// Configuration shared by every backend a service constructs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Hosted backend settings
    pub hosted: HostedSettings,

    /// Per-request transport timeout
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,

    /// Maximum in-flight model calls per fan-out (1 = sequential)
    pub max_concurrency: usize,

    /// Keep other evaluations when one fails
    pub isolate_failures: bool,

    /// Required values (API key, tunnel URL). Never read from the YAML file.
    #[serde(skip)]
    pub values: ConfigValues,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            hosted: HostedSettings::default(),
            request_timeout: Duration::from_secs(60),
            max_concurrency: 1,
            isolate_failures: false,
            values: ConfigValues::default(),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

impl RuntimeConfig {
    /// Defaults plus the known values captured from the environment.
    pub fn from_env() -> Self {
        Self::default().with_values(ConfigValues::from_env(KNOWN_CONFIG_VALUES))
    }

    /// Parse tunables from YAML. Values start empty.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigFileError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse tunables from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Replace the configuration values snapshot.
    pub fn with_values(mut self, values: ConfigValues) -> Self {
        self.values = values;
        self
    }

    /// Set one configuration value.
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name, value);
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_isolate_failures(mut self, isolate_failures: bool) -> Self {
        self.isolate_failures = isolate_failures;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Execution policy for backends built from this configuration.
    pub fn execution_policy(&self) -> ExecutionPolicy {
        ExecutionPolicy {
            max_concurrency: self.max_concurrency.max(1),
            isolate_failures: self.isolate_failures,
        }
    }

    /// Check tunable ranges.
    pub fn validate(&self) -> Result<(), ConfigFileError> {
        if self.max_concurrency == 0 {
            return Err(ConfigFileError::Invalid(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigFileError::Invalid(
                "request_timeout must be greater than zero".to_string(),
            ));
        }
        if self.hosted.model.trim().is_empty() {
            return Err(ConfigFileError::Invalid(
                "hosted.model must not be empty".to_string(),
            ));
        }
        let base_url = &self.hosted.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigFileError::Invalid(
                "hosted.base_url must start with http:// or https://".to_string(),
            ));
        }
        Ok(())
    }
}
