//! Model transports for revisor-runtime.
//!
//! Backends never talk HTTP directly. The hosted backend goes through a
//! [`ChatTransport`] and the self-hosted backend through a
//! [`GenerateTransport`], so tests and embedders can substitute either.
//!
//! ## Security
//!
//! Hosted credentials are held in [`ApiCredential`], which redacts itself in
//! `Debug` and `Display` output.

use async_trait::async_trait;
use revisor_core::{ConfigurationError, GenerationParams};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod openai;
pub mod secrets;
mod tgi;

pub use openai::{OpenAiClient, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL, OPENAI_API_KEY_ENV};
pub use secrets::{ApiCredential, CredentialSource};
pub use tgi::{TgiClient, LLAMA2_API_URL_ENV};

/// Errors from model transports.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(#[from] ConfigurationError),
}

impl ProviderError {
    /// Map a reqwest failure, distinguishing timeouts.
    pub(crate) fn from_reqwest(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            ProviderError::Timeout(timeout)
        } else {
            ProviderError::HttpError(error.to_string())
        }
    }
}

/// A chat message for hosted completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// One hosted completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model id
    pub model: String,

    /// Ordered conversation, system turn first
    pub messages: Vec<ChatMessage>,

    /// Sampling parameters sent with the call
    pub params: GenerationParams,
}

/// Response from a hosted completion.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated content
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Model that answered
    pub model: String,
}

/// One self-hosted generate call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    /// Full instruction-formatted prompt
    pub inputs: String,

    /// Sampling parameters sent with the call
    pub params: GenerationParams,
}

/// Response from a self-hosted generate call.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Generated text
    pub text: String,

    /// Token usage (estimated, the endpoint does not report it)
    pub usage: TokenUsage,
}

/// Token usage from one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the completion
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Rough token estimate for endpoints that do not report usage (~4 chars per token).
pub fn estimate_tokens(text: &str) -> u32 {
    (text.len() / 4) as u32
}

/// Chat-style completion endpoint used by the hosted backend.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Execute a chat completion.
    async fn complete(&self, request: ChatRequest) -> Result<Completion, ProviderError>;

    /// Check the credential is usable. Makes no network call.
    ///
    /// `OpenAiClient` is always healthy once built, since its key already
    /// passed the configuration guard. Transports supplied through
    /// [`Transports`](crate::Transports) may report `false`, which the hosted
    /// backend turns into `BackendUnavailable` before any evaluation.
    async fn health_check(&self) -> bool;

    /// Transport name for logs.
    fn name(&self) -> &str;
}

/// Text-generation endpoint used by the self-hosted backend.
#[async_trait]
pub trait GenerateTransport: Send + Sync {
    /// Liveness probe against the endpoint base.
    async fn probe(&self) -> Result<(), ProviderError>;

    /// Generate a continuation for an instruction block.
    async fn generate(&self, request: GenerateRequest) -> Result<Generation, ProviderError>;

    /// Transport name for logs.
    fn name(&self) -> &str;
}

/// Build the shared reqwest client with a request timeout.
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::HttpError(format!("failed to build HTTP client: {}", e)))
}

/// First characters of a response body, for error messages.
pub(crate) fn body_preview(body: &str) -> String {
    const LIMIT: usize = 200;
    let mut preview: String = body.chars().take(LIMIT).collect();
    if body.chars().count() > LIMIT {
        preview.push_str("...");
    }
    preview
}
