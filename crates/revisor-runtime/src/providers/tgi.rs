//! Text-generation-inference transport for the self-hosted backend.
//!
//! The self-hosted model sits behind a tunnel. `GET <base>` is the liveness
//! probe and `POST <base>/generate` produces text.

use super::{
    body_preview, build_http_client, estimate_tokens, GenerateRequest, GenerateTransport,
    Generation, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use revisor_core::{ConfigValues, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable holding the tunnel URL of the self-hosted model.
pub const LLAMA2_API_URL_ENV: &str = "LLAMA2_API_URL";

/// Self-hosted generate client.
#[derive(Debug)]
pub struct TgiClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl TgiClient {
    /// Create a client for an endpoint base URL.
    ///
    /// The URL must use `http://` or `https://`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let base_url = base_url.trim();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigurationError::Invalid {
                name: LLAMA2_API_URL_ENV.to_string(),
                reason: "must start with http:// or https://".to_string(),
            }
            .into());
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client: build_http_client(timeout)?,
        })
    }

    /// Create a client from a configuration snapshot (reads `LLAMA2_API_URL`).
    pub fn from_values(values: &ConfigValues, timeout: Duration) -> Result<Self, ProviderError> {
        let base_url = values.require(LLAMA2_API_URL_ENV)?;
        Self::new(base_url, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    inputs: &'a str,
    parameters: GenerateParameters,
}

#[derive(Debug, Serialize)]
struct GenerateParameters {
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

/// The endpoint answers with one object or a one-element batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeneratePayload {
    Single(GeneratedText),
    Batch(Vec<GeneratedText>),
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

impl GeneratePayload {
    fn into_text(self) -> Option<String> {
        match self {
            GeneratePayload::Single(item) => Some(item.generated_text),
            GeneratePayload::Batch(items) => items.into_iter().next().map(|item| item.generated_text),
        }
    }
}

#[async_trait]
impl GenerateTransport for TgiClient {
    async fn probe(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "self-hosted endpoint is live");
            Ok(())
        } else {
            warn!(status = status.as_u16(), "self-hosted liveness probe failed");
            Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: "liveness probe returned a non-success status".to_string(),
            })
        }
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, ProviderError> {
        let body = GenerateBody {
            inputs: &request.inputs,
            parameters: GenerateParameters {
                temperature: request.params.temperature,
                max_tokens: request.params.max_tokens,
                top_p: request.params.top_p,
                frequency_penalty: request.params.frequency_penalty,
                presence_penalty: request.params.presence_penalty,
            },
        };

        debug!(
            inputs_len = request.inputs.len(),
            temperature = request.params.temperature,
            "posting generate request"
        );

        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited { retry_after: None });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        if !status.is_success() {
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body_preview(&text),
            });
        }

        let generated = serde_json::from_str::<GeneratePayload>(&text)
            .map_err(|e| {
                ProviderError::MalformedResponse(format!("{} (body: {})", e, body_preview(&text)))
            })?
            .into_text()
            .filter(|generated| !generated.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::MalformedResponse("response has no generated_text".to_string())
            })?;

        let usage = TokenUsage {
            prompt_tokens: estimate_tokens(&request.inputs),
            completion_tokens: estimate_tokens(&generated),
        };

        Ok(Generation {
            text: generated,
            usage,
        })
    }

    fn name(&self) -> &str {
        "tgi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_url() {
        let err = TgiClient::new("ftp://tunnel.example", Duration::from_secs(5)).unwrap_err();
        match err {
            ProviderError::NotConfigured(ConfigurationError::Invalid { name, .. }) => {
                assert_eq!(name, LLAMA2_API_URL_ENV);
            }
            other => panic!("expected invalid configuration, got {:?}", other),
        }
    }

    #[test]
    fn test_from_values_requires_url() {
        let result = TgiClient::from_values(&ConfigValues::new(), Duration::from_secs(5));
        assert!(matches!(
            result,
            Err(ProviderError::NotConfigured(ConfigurationError::Missing { .. }))
        ));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = TgiClient::new("https://tunnel.example/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "https://tunnel.example");
    }

    #[test]
    fn test_payload_single_and_batch() {
        let single: GeneratePayload = serde_json::from_str(r#"{"generated_text": "ok"}"#).unwrap();
        assert_eq!(single.into_text().as_deref(), Some("ok"));

        let batch: GeneratePayload =
            serde_json::from_str(r#"[{"generated_text": "first"}]"#).unwrap();
        assert_eq!(batch.into_text().as_deref(), Some("first"));

        let empty: GeneratePayload = serde_json::from_str("[]").unwrap();
        assert_eq!(empty.into_text(), None);
    }

    #[test]
    fn test_body_shape() {
        let body = GenerateBody {
            inputs: "[INST] hi [/INST]",
            parameters: GenerateParameters {
                temperature: 0.0,
                max_tokens: 64,
                top_p: 0.5,
                frequency_penalty: 0.0,
                presence_penalty: 0.0,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["inputs"], "[INST] hi [/INST]");
        assert_eq!(value["parameters"]["max_tokens"], 64);
        assert_eq!(value["parameters"]["top_p"], 0.5);
    }
}
