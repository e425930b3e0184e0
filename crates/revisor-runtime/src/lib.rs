//! # revisor-runtime
//!
//! Evaluation backends for revisor.
//!
//! A backend takes one [`EvaluationRequest`], checks that its configuration
//! (and, for the self-hosted model, its endpoint) is usable, then runs its
//! declared evaluations and keeps the aggregated [`ReviewResponse`].
//!
//! Two backends ship:
//! - [`HostedBackend`]: chat-completion API with few-shot transcripts
//! - [`SelfHostedBackend`]: instruction-tuned model behind a tunnel URL
//!
//! Callers normally go through [`ReviewService`], which resolves a display
//! name (`GPT-3.5`, `LLAMA2`) through the [`BackendRegistry`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use revisor_core::EvaluationRequest;
//! use revisor_runtime::{ReviewService, RuntimeConfig};
//!
//! let service = ReviewService::builder()
//!     .config(RuntimeConfig::from_env())
//!     .build();
//!
//! let request = EvaluationRequest::single("IoT security paper", "We have to encrypted data");
//! let report = service.review("GPT-3.5", request).await?;
//! println!("{}", report.response.to_json());
//! ```

use revisor_core::{ConfigurationError, RequestError};
use thiserror::Error;

pub mod backends;
pub mod config;
pub mod prompts;
pub mod providers;
pub mod registry;
pub mod service;
pub mod usage;

#[cfg(test)]
pub(crate) mod testing;

pub use backends::{Backend, BackendKind, EvaluationDescriptor, HostedBackend, SelfHostedBackend, Transports};
pub use config::{ConfigFileError, ExecutionPolicy, HostedSettings, RuntimeConfig};
pub use providers::{ChatTransport, GenerateTransport, OpenAiClient, ProviderError, TgiClient};
pub use registry::BackendRegistry;
pub use service::{ReviewReport, ReviewService, ReviewServiceBuilder};
pub use usage::{LlmUsage, UsageMeter};

pub use revisor_core::{EvaluationRequest, ReviewResponse};

/// Errors from constructing a backend or running a review.
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Invalid model selected: '{name}' (available: {})", .available.join(", "))]
    InvalidSelection { name: String, available: Vec<String> },

    #[error("Invalid request: {0}")]
    Request(#[from] RequestError),

    #[error("{evaluation} evaluation failed for {target}: {source}")]
    Evaluation {
        evaluation: &'static str,
        target: String,
        #[source]
        source: ProviderError,
    },
}

impl ReviewError {
    /// Wrap a transport failure with the evaluation and section it belongs to.
    pub fn evaluation(
        evaluation: &'static str,
        target: impl Into<String>,
        source: ProviderError,
    ) -> Self {
        ReviewError::Evaluation {
            evaluation,
            target: target.into(),
            source,
        }
    }

    /// Map a transport construction failure. Missing or invalid configuration
    /// stays a configuration error.
    pub(crate) fn from_setup(error: ProviderError) -> Self {
        match error {
            ProviderError::NotConfigured(config) => ReviewError::Configuration(config),
            other => ReviewError::BackendUnavailable(other.to_string()),
        }
    }

    /// Sections cohesion needed but the request lacked, if that is the failure.
    pub fn missing_sections(&self) -> Option<&[String]> {
        match self {
            ReviewError::Request(RequestError::MissingSections(missing)) => Some(missing),
            _ => None,
        }
    }

    /// True when the caller should pick another backend name.
    pub fn is_invalid_selection(&self) -> bool {
        matches!(self, ReviewError::InvalidSelection { .. })
    }
}
