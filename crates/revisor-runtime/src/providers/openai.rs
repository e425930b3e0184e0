//! OpenAI chat-completions transport for the hosted backend.
//!
//! ## Security
//!
//! The API key is held in an [`ApiCredential`] and only exposed when the
//! bearer header is set.

use super::{
    body_preview, build_http_client,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, ChatRequest, ChatTransport, Completion, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use revisor_core::ConfigValues;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Environment variable name for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default API base.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default hosted model id.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo-16k";

/// Hosted chat-completion client.
pub struct OpenAiClient {
    credential: ApiCredential,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiClient {
    /// Create a client from an explicit key.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let credential = ApiCredential::new(api_key, CredentialSource::Programmatic, "OpenAI API key");
        Self::with_credential(credential, DEFAULT_OPENAI_BASE_URL, timeout)
    }

    /// Create a client from a configuration snapshot.
    ///
    /// Reads `OPENAI_API_KEY`; fails with [`ProviderError::NotConfigured`]
    /// when it is absent.
    pub fn from_values(
        values: &ConfigValues,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_values(values, OPENAI_API_KEY_ENV, "OpenAI API key")?;
        Self::with_credential(credential, base_url, timeout)
    }

    fn with_credential(
        credential: ApiCredential,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            credential,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client: build_http_client(timeout)?,
        })
    }

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Chat-completions request body.
#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

/// Chat-completions response body. Only the fields we read.
#[derive(Debug, Deserialize)]
struct ChatCompletionPayload {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

#[async_trait]
impl ChatTransport for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<Completion, ProviderError> {
        let body = ChatCompletionBody {
            model: &request.model,
            messages: &request.messages,
            temperature: request.params.temperature,
            max_tokens: request.params.max_tokens,
            top_p: request.params.top_p,
            frequency_penalty: request.params.frequency_penalty,
            presence_penalty: request.params.presence_penalty,
        };

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            temperature = request.params.temperature,
            "posting chat completion"
        );

        // SECURITY: Only expose the credential here, at the point of use
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OpenAiError>(&text)
                .map(|body| body.error.message)
                .unwrap_or_else(|_| body_preview(&text));
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let payload: ChatCompletionPayload = serde_json::from_str(&text).map_err(|e| {
            ProviderError::MalformedResponse(format!("{} (body: {})", e, body_preview(&text)))
        })?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::MalformedResponse(
                    "response has no choices[0].message.content".to_string(),
                )
            })?;

        let usage = payload
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(Completion {
            content,
            usage,
            model: payload.model.unwrap_or(request.model),
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "openai"
    }
}
