//! Configuration guard.
//!
//! Backends declare the named configuration values they cannot run without
//! (an API key, a tunnel URL). Those values are captured once into a
//! [`ConfigValues`] snapshot and checked with [`ConfigValues::require_all`]
//! before any network call is made.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Errors raised when required configuration is missing or unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Configuration value {name} not defined")]
    Missing { name: String },

    #[error("Configuration value {name} is invalid: {reason}")]
    Invalid { name: String, reason: String },
}

impl ConfigurationError {
    /// Name of the offending configuration value.
    pub fn name(&self) -> &str {
        match self {
            ConfigurationError::Missing { name } | ConfigurationError::Invalid { name, .. } => name,
        }
    }
}

/// Snapshot of named configuration values.
///
/// Values may be secrets, so `Debug` only lists the names that are set.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConfigValues {
    values: BTreeMap<String, String>,
}

impl ConfigValues {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the given variables from the process environment.
    ///
    /// Variables that are unset are simply absent from the snapshot; the
    /// guard reports them later, when a backend asks for them.
    pub fn from_env(names: &[&str]) -> Self {
        let mut values = BTreeMap::new();
        for name in names {
            if let Ok(value) = std::env::var(name) {
                values.insert((*name).to_string(), value);
            }
        }
        Self { values }
    }

    /// Set a value, replacing any previous one.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Get a value if it is set and non-empty.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Get a value, failing with [`ConfigurationError::Missing`] if absent or empty.
    pub fn require(&self, name: &str) -> Result<&str, ConfigurationError> {
        self.get(name).ok_or_else(|| ConfigurationError::Missing {
            name: name.to_string(),
        })
    }

    /// Verify that every named value is present and non-empty.
    ///
    /// Fails on the first missing name, in the order given.
    pub fn require_all(&self, names: &[&str]) -> Result<(), ConfigurationError> {
        for name in names {
            if self.get(name).is_none() {
                tracing::warn!(name = %name, "required configuration value missing");
                return Err(ConfigurationError::Missing {
                    name: (*name).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Names of the values that are set.
    pub fn names(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for ConfigValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigValues")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_all_passes_when_present() {
        let values = ConfigValues::new()
            .with("OPENAI_API_KEY", "sk-test")
            .with("LLAMA2_API_URL", "http://localhost:8080");

        assert!(values.require_all(&["OPENAI_API_KEY", "LLAMA2_API_URL"]).is_ok());
    }

    #[test]
    fn test_require_all_names_missing_value() {
        let values = ConfigValues::new().with("OPENAI_API_KEY", "sk-test");

        let err = values
            .require_all(&["OPENAI_API_KEY", "LLAMA2_API_URL"])
            .unwrap_err();
        assert_eq!(err.name(), "LLAMA2_API_URL");
        assert!(err.to_string().contains("LLAMA2_API_URL"));
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let values = ConfigValues::new().with("OPENAI_API_KEY", "   ");

        assert!(values.get("OPENAI_API_KEY").is_none());
        assert!(matches!(
            values.require("OPENAI_API_KEY"),
            Err(ConfigurationError::Missing { .. })
        ));
    }

    #[test]
    fn test_from_env_captures_set_variables() {
        std::env::set_var("REVISOR_TEST_CONFIG_PRESENT", "value");
        let values = ConfigValues::from_env(&[
            "REVISOR_TEST_CONFIG_PRESENT",
            "REVISOR_TEST_CONFIG_ABSENT_12345",
        ]);

        assert_eq!(values.get("REVISOR_TEST_CONFIG_PRESENT"), Some("value"));
        assert_eq!(values.names(), vec!["REVISOR_TEST_CONFIG_PRESENT"]);

        std::env::remove_var("REVISOR_TEST_CONFIG_PRESENT");
    }

    #[test]
    fn test_debug_hides_values() {
        let values = ConfigValues::new().with("OPENAI_API_KEY", "sk-super-secret");

        let debug = format!("{:?}", values);
        assert!(!debug.contains("sk-super-secret"));
        assert!(debug.contains("OPENAI_API_KEY"));
    }
}
