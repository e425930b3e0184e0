//! Secure credential handling for model transports.
//!
//! API keys are wrapped in [`ApiCredential`] as soon as they are read, so
//! they cannot reach `Debug`/`Display` output or log lines afterwards.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::providers::secrets::ApiCredential;
//!
//! // Load from a configuration snapshot
//! let cred = ApiCredential::from_values(&values, "OPENAI_API_KEY", "OpenAI API key")?;
//!
//! // Use in HTTP header (explicit exposure)
//! request.bearer_auth(cred.expose());
//! ```

use revisor_core::ConfigValues;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
///
/// Useful when debugging configuration without exposing the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from a [`ConfigValues`] snapshot
    Config,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// - `Debug` and `Display` show `[REDACTED]`
/// - memory is zeroed on drop via `secrecy`
/// - the value is only reachable through [`ApiCredential::expose`]
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Create a new credential from a string value.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load a credential from a configuration snapshot.
    ///
    /// Fails with [`ProviderError::NotConfigured`] when the value is absent
    /// or blank.
    pub fn from_values(
        values: &ConfigValues,
        key: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        let value = values.require(key)?;
        Ok(Self::new(value, CredentialSource::Config, name))
    }

    /// Expose the credential value for use in API calls.
    ///
    /// # Security
    ///
    /// Only call this where the credential is actually needed (setting an
    /// HTTP header). Never store the exposed value.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Check if the credential is empty.
    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().trim().is_empty()
    }

    /// Get the source of this credential.
    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Get the human-readable name of this credential.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_redacted_in_debug() {
        let secret = "sk-super-secret-key-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Programmatic, "Test API key");

        let debug = format!("{:?}", cred);
        assert!(!debug.contains(secret), "Secret exposed in Debug!");
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_credential_redacted_in_display() {
        let secret = "sk-super-secret-key-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Config, "Test API key");

        let display = format!("{}", cred);
        assert!(!display.contains(secret), "Secret exposed in Display!");
        assert!(display.contains("[REDACTED]"));
        assert!(display.contains("Test API key"));
        assert!(display.contains("config"));
    }

    #[test]
    fn test_credential_expose() {
        let secret = "sk-super-secret-key-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Programmatic, "Test API key");

        assert_eq!(cred.expose(), secret);
    }

    #[test]
    fn test_from_values_reads_snapshot() {
        let values = ConfigValues::new().with("OPENAI_API_KEY", "sk-from-config");
        let cred = ApiCredential::from_values(&values, "OPENAI_API_KEY", "OpenAI API key").unwrap();

        assert_eq!(cred.expose(), "sk-from-config");
        assert_eq!(cred.source(), CredentialSource::Config);
    }

    #[test]
    fn test_from_values_missing_names_the_key() {
        let err = ApiCredential::from_values(&ConfigValues::new(), "OPENAI_API_KEY", "OpenAI API key")
            .unwrap_err();

        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_from_values_blank_is_missing() {
        let values = ConfigValues::new().with("OPENAI_API_KEY", "   ");
        assert!(ApiCredential::from_values(&values, "OPENAI_API_KEY", "OpenAI API key").is_err());
    }

    #[test]
    fn test_blank_credential_is_empty() {
        let cred = ApiCredential::new("  ", CredentialSource::Programmatic, "Test");
        assert!(cred.is_empty());
    }
}
