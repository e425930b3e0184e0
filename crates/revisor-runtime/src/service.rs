//! Review service.
//!
//! Owns the registry, the runtime configuration and any transport
//! overrides, and runs one review per call:
//! - resolve the display name (unknown names never construct a backend)
//! - construct the backend, which validates and runs its evaluations
//! - wrap the response with the backend, timestamp and usage

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use revisor_core::{EvaluationRequest, ReviewResponse};

use crate::backends::{BackendKind, Transports};
use crate::config::RuntimeConfig;
use crate::providers::{ChatTransport, GenerateTransport};
use crate::registry::BackendRegistry;
use crate::usage::LlmUsage;
use crate::ReviewError;

/// Result of one review.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewReport {
    /// Display name the caller selected
    pub model: String,

    /// Backend family that ran
    pub backend: BackendKind,

    /// When the evaluations finished
    pub reviewed_at: DateTime<Utc>,

    /// Model calls and tokens spent
    pub usage: LlmUsage,

    /// `{"evaluations": {...}}`
    pub response: ReviewResponse,
}

/// Runs reviews against registered backends.
#[derive(Debug)]
pub struct ReviewService {
    registry: BackendRegistry,
    config: RuntimeConfig,
    transports: Transports,
}

impl ReviewService {
    /// Create a service with the built-in backends.
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            registry: BackendRegistry::with_defaults(),
            config,
            transports: Transports::default(),
        }
    }

    pub fn builder() -> ReviewServiceBuilder {
        ReviewServiceBuilder::new()
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Review a request with the backend registered under `model_name`.
    pub async fn review(
        &self,
        model_name: &str,
        request: EvaluationRequest,
    ) -> Result<ReviewReport, ReviewError> {
        let kind = match self.registry.lookup(model_name) {
            Some(kind) => kind,
            None => {
                warn!(model = model_name, "invalid model selected");
                return Err(ReviewError::InvalidSelection {
                    name: model_name.to_string(),
                    available: self
                        .registry
                        .available_names()
                        .into_iter()
                        .map(String::from)
                        .collect(),
                });
            }
        };

        info!(
            model = model_name,
            backend = kind.name(),
            sections = request.sections.len(),
            "starting review"
        );

        let backend = kind
            .construct_with(request, &self.config, &self.transports)
            .await?;

        let usage = backend.usage();
        let reviewed_at = backend.reviewed_at();
        info!(
            model = model_name,
            backend = kind.name(),
            llm_calls = usage.llm_calls,
            total_tokens = usage.total_tokens,
            "review complete"
        );

        Ok(ReviewReport {
            model: model_name.to_string(),
            backend: kind,
            reviewed_at,
            usage,
            response: backend.into_response(),
        })
    }
}

/// Builder for [`ReviewService`].
pub struct ReviewServiceBuilder {
    registry: BackendRegistry,
    config: RuntimeConfig,
    transports: Transports,
}

impl ReviewServiceBuilder {
    /// Create a new builder with the built-in backends and default config.
    pub fn new() -> Self {
        Self {
            registry: BackendRegistry::with_defaults(),
            config: RuntimeConfig::default(),
            transports: Transports::default(),
        }
    }

    /// Replace the registry.
    pub fn registry(mut self, registry: BackendRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this transport instead of the hosted HTTP client.
    pub fn chat_transport(mut self, transport: Arc<dyn ChatTransport>) -> Self {
        self.transports.chat = Some(transport);
        self
    }

    /// Use this transport instead of the self-hosted HTTP client.
    pub fn generate_transport(mut self, transport: Arc<dyn GenerateTransport>) -> Self {
        self.transports.generate = Some(transport);
        self
    }

    /// Build the service.
    pub fn build(self) -> ReviewService {
        ReviewService {
            registry: self.registry,
            config: self.config,
            transports: self.transports,
        }
    }
}

impl Default for ReviewServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
