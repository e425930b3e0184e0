//! Self-hosted instruction-model backend.
//!
//! Same evaluation contract as the hosted backend, with prompts rendered as
//! single instruction blocks. The endpoint is probed before any evaluation.
//! Cohesion first summarizes each of the three sections, then compares the
//! summaries.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use revisor_core::{
    CohesionSections, ConfigValues, EvaluationKind, EvaluationOutcome, EvaluationRequest,
    GenerationParams, ReviewResponse,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{per_section, run_declared, EvaluationDescriptor};
use crate::config::{ExecutionPolicy, RuntimeConfig};
use crate::prompts;
use crate::providers::{GenerateRequest, GenerateTransport, ProviderError, TgiClient, LLAMA2_API_URL_ENV};
use crate::usage::{LlmUsage, UsageMeter};
use crate::ReviewError;

/// Backend that reviews through a self-hosted generate endpoint.
pub struct SelfHostedBackend {
    request: EvaluationRequest,
    transport: Arc<dyn GenerateTransport>,
    values: ConfigValues,
    policy: ExecutionPolicy,
    usage: UsageMeter,
    evaluations: Vec<EvaluationDescriptor<SelfHostedBackend>>,
    response: ReviewResponse,
    reviewed_at: DateTime<Utc>,
}

fn grammar(backend: &SelfHostedBackend) -> BoxFuture<'_, Result<EvaluationOutcome, ReviewError>> {
    Box::pin(backend.evaluate_grammar())
}

fn theme(backend: &SelfHostedBackend) -> BoxFuture<'_, Result<EvaluationOutcome, ReviewError>> {
    Box::pin(backend.evaluate_theme())
}

fn cohesion(backend: &SelfHostedBackend) -> BoxFuture<'_, Result<EvaluationOutcome, ReviewError>> {
    Box::pin(backend.evaluate_cohesion())
}

impl SelfHostedBackend {
    pub const NAME: &'static str = "self_hosted";

    pub const REQUIRED_CONFIG: &'static [&'static str] = &[LLAMA2_API_URL_ENV];

    /// The evaluations this backend runs, in order.
    pub fn declared_evaluations() -> Vec<EvaluationDescriptor<SelfHostedBackend>> {
        vec![
            EvaluationDescriptor::new(EvaluationKind::Grammar, grammar),
            EvaluationDescriptor::new(EvaluationKind::Theme, theme),
            EvaluationDescriptor::new(EvaluationKind::Cohesion, cohesion),
        ]
    }

    /// Construct with the HTTP client for `LLAMA2_API_URL` and run every
    /// declared evaluation.
    pub async fn new(request: EvaluationRequest, config: &RuntimeConfig) -> Result<Self, ReviewError> {
        let client = TgiClient::from_values(&config.values, config.request_timeout)
            .map_err(ReviewError::from_setup)?;
        Self::with_transport(request, config, Arc::new(client)).await
    }

    /// Construct with a caller-supplied transport and run every declared
    /// evaluation. The response is ready when this returns.
    pub async fn with_transport(
        request: EvaluationRequest,
        config: &RuntimeConfig,
        transport: Arc<dyn GenerateTransport>,
    ) -> Result<Self, ReviewError> {
        request.validate()?;

        let mut backend = Self {
            request,
            transport,
            values: config.values.clone(),
            policy: config.execution_policy(),
            usage: UsageMeter::new(),
            evaluations: Self::declared_evaluations(),
            response: ReviewResponse::default(),
            reviewed_at: Utc::now(),
        };

        backend.response = backend.get_response().await?;
        backend.reviewed_at = Utc::now();
        Ok(backend)
    }

    /// Configuration guard, then the liveness probe.
    pub async fn validate_initialization(&self) -> Result<(), ReviewError> {
        self.values.require_all(Self::REQUIRED_CONFIG)?;

        if let Err(err) = self.transport.probe().await {
            warn!(
                backend = Self::NAME,
                transport = self.transport.name(),
                error = %err,
                "liveness probe failed"
            );
            return Err(ReviewError::BackendUnavailable(format!(
                "self-hosted model endpoint is not reachable ({}); start the tunnel and try again",
                err
            )));
        }
        Ok(())
    }

    /// Validate, then run the declared evaluations.
    pub async fn get_response(&self) -> Result<ReviewResponse, ReviewError> {
        self.validate_initialization().await?;

        info!(
            backend = Self::NAME,
            sections = self.request.sections.len(),
            "running self-hosted review"
        );
        run_declared(self, Self::NAME, &self.evaluations, self.policy).await
    }

    /// Grammar suggestions per section at temperature 0.
    pub async fn evaluate_grammar(&self) -> Result<EvaluationOutcome, ReviewError> {
        let params = self.request.params.deterministic();
        per_section(&self.request, EvaluationKind::Grammar, self.policy.max_concurrency, |text| {
            self.generate(EvaluationKind::Grammar, prompts::instruct_grammar(&self.request.context, &text), params)
        })
        .await
    }

    /// Theme critique per section at the caller temperature.
    pub async fn evaluate_theme(&self) -> Result<EvaluationOutcome, ReviewError> {
        let params = self.request.params;
        per_section(&self.request, EvaluationKind::Theme, self.policy.max_concurrency, |text| {
            self.generate(EvaluationKind::Theme, prompts::instruct_theme(&self.request.context, &text), params)
        })
        .await
    }

    /// Summarize one section at the caller temperature.
    ///
    /// A blank summary is a malformed response, not a missing section.
    pub async fn summarize(&self, section: &str, text: &str) -> Result<String, ReviewError> {
        let summary = self
            .generate(EvaluationKind::Cohesion, prompts::instruct_summary(text), self.request.params)
            .await
            .and_then(|summary| {
                if summary.trim().is_empty() {
                    Err(ProviderError::MalformedResponse("blank summary".to_string()))
                } else {
                    Ok(summary)
                }
            });

        summary.map_err(|source| {
            ReviewError::evaluation(
                EvaluationKind::Cohesion.title(),
                format!("{} summary", section),
                source,
            )
        })
    }

    /// Cohesion over summaries of abstract, introduction and conclusion.
    ///
    /// Issues exactly three summary calls, then one cohesion call at
    /// temperature 0. Fails before any call when a section is missing.
    pub async fn evaluate_cohesion(&self) -> Result<EvaluationOutcome, ReviewError> {
        let sections = CohesionSections::from_request(&self.request)?;
        let jobs: Vec<(String, String)> = [
            ("abstract", sections.abstract_text),
            ("introduction", sections.introduction),
            ("conclusion", sections.conclusion),
        ]
        .into_iter()
        .map(|(name, text)| (name.to_string(), text.to_string()))
        .collect();

        let summaries: Vec<String> = stream::iter(jobs)
            .map(move |(name, text)| async move { self.summarize(&name, &text).await })
            .buffered(self.policy.max_concurrency)
            .try_collect()
            .await?;

        let [abstract_text, introduction, conclusion] = summaries.as_slice() else {
            return Err(ReviewError::evaluation(
                EvaluationKind::Cohesion.title(),
                "summaries",
                ProviderError::MalformedResponse(format!(
                    "expected 3 summaries, got {}",
                    summaries.len()
                )),
            ));
        };
        let summary_sections = CohesionSections {
            abstract_text: abstract_text.as_str(),
            introduction: introduction.as_str(),
            conclusion: conclusion.as_str(),
        };
        let prompt = prompts::instruct_cohesion(&self.request.context, &summary_sections);

        let text = self
            .generate(EvaluationKind::Cohesion, prompt, self.request.params.deterministic())
            .await
            .map_err(|source| {
                ReviewError::evaluation(EvaluationKind::Cohesion.title(), "the whole request", source)
            })?;
        Ok(EvaluationOutcome::Whole(text))
    }

    async fn generate(
        &self,
        kind: EvaluationKind,
        inputs: String,
        params: GenerationParams,
    ) -> Result<String, ProviderError> {
        debug!(
            backend = Self::NAME,
            evaluation = %kind,
            inputs_len = inputs.len(),
            temperature = params.temperature,
            "requesting generation"
        );

        let generation = self
            .transport
            .generate(GenerateRequest { inputs, params })
            .await?;
        self.usage.record(&generation.usage);
        Ok(generation.text)
    }

    pub fn response(&self) -> &ReviewResponse {
        &self.response
    }

    pub fn into_response(self) -> ReviewResponse {
        self.response
    }

    pub fn request(&self) -> &EvaluationRequest {
        &self.request
    }

    pub fn evaluations(&self) -> &[EvaluationDescriptor<SelfHostedBackend>] {
        &self.evaluations
    }

    pub fn usage(&self) -> LlmUsage {
        self.usage.snapshot()
    }

    pub fn reviewed_at(&self) -> DateTime<Utc> {
        self.reviewed_at
    }
}

impl fmt::Debug for SelfHostedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfHostedBackend")
            .field("transport", &self.transport.name())
            .field("values", &self.values)
            .field("policy", &self.policy)
            .field("evaluations", &self.evaluations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockGenerate;
    use revisor_core::ConfigurationError;

    fn config() -> RuntimeConfig {
        RuntimeConfig::default().with_value(LLAMA2_API_URL_ENV, "https://tunnel.example")
    }

    fn full_article() -> EvaluationRequest {
        EvaluationRequest::new(
            "IoT security paper",
            [
                ("abstract", "We present a cryptographic component."),
                ("introduction", "IoT devices leak data."),
                ("conclusion", "The component secures data in transit."),
            ],
        )
    }

    #[tokio::test]
    async fn test_declared_order_and_titles() {
        let mock = Arc::new(MockGenerate::new());
        let backend = SelfHostedBackend::with_transport(full_article(), &config(), mock.clone())
            .await
            .unwrap();

        assert_eq!(
            backend.response().evaluations.titles(),
            vec!["Grammar", "Theme", "Cohesion"]
        );
        assert_eq!(mock.probes(), 1);
    }

    #[tokio::test]
    async fn test_cohesion_summarizes_three_sections_first() {
        let mock = Arc::new(MockGenerate::new());
        let backend = SelfHostedBackend::with_transport(full_article(), &config(), mock.clone())
            .await
            .unwrap();

        let requests = mock.requests();
        // 3 grammar + 3 theme + 3 summaries + 1 cohesion
        assert_eq!(requests.len(), 10);
        let summaries = &requests[6..9];
        assert!(summaries
            .iter()
            .all(|r| r.inputs.contains("Summarize the following text:")));
        assert!(summaries[0].inputs.contains("We present a cryptographic component."));
        assert!(summaries[2].inputs.contains("The component secures data in transit."));

        let cohesion = &requests[9];
        assert!(cohesion
            .inputs
            .contains("Abstract: generated 7\nIntroduction: generated 8\nConclusion: generated 9"));
        assert_eq!(cohesion.params.temperature, 0.0);

        assert_eq!(
            backend.response().get("Cohesion").unwrap().text(),
            Some("generated 10")
        );
        assert_eq!(backend.usage().llm_calls, 10);
    }

    #[tokio::test]
    async fn test_temperatures_per_evaluation() {
        let mock = Arc::new(MockGenerate::new());
        let request = full_article().with_params(GenerationParams::default().with_temperature(0.7));
        SelfHostedBackend::with_transport(request, &config(), mock.clone())
            .await
            .unwrap();

        let temperatures: Vec<f32> = mock.requests().iter().map(|r| r.params.temperature).collect();
        assert_eq!(
            temperatures,
            vec![0.0, 0.0, 0.0, 0.7, 0.7, 0.7, 0.7, 0.7, 0.7, 0.0]
        );
    }

    #[tokio::test]
    async fn test_missing_sections_skip_cohesion_without_summaries() {
        let mock = Arc::new(MockGenerate::new());
        let request = EvaluationRequest::new("", [("abstract", "A"), ("introduction", "B")]);
        let backend = SelfHostedBackend::with_transport(request, &config(), mock.clone())
            .await
            .unwrap();

        assert!(backend.response().get("Cohesion").unwrap().is_skipped());
        assert_eq!(mock.calls(), 4);
        assert!(mock
            .requests()
            .iter()
            .all(|r| !r.inputs.contains("Summarize the following text:")));
    }

    #[tokio::test]
    async fn test_offline_endpoint_is_unavailable() {
        let mock = Arc::new(MockGenerate::new().offline());
        let result = SelfHostedBackend::with_transport(full_article(), &config(), mock.clone()).await;

        assert!(matches!(result, Err(ReviewError::BackendUnavailable(_))));
        assert_eq!(mock.probes(), 1);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_url_fails_before_probe() {
        let mock = Arc::new(MockGenerate::new());
        let result =
            SelfHostedBackend::with_transport(full_article(), &RuntimeConfig::default(), mock.clone())
                .await;

        match result {
            Err(ReviewError::Configuration(ConfigurationError::Missing { name })) => {
                assert_eq!(name, LLAMA2_API_URL_ENV);
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
        assert_eq!(mock.probes(), 0);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_url_is_configuration_error() {
        let config = RuntimeConfig::default().with_value(LLAMA2_API_URL_ENV, "tunnel.example");
        let result = SelfHostedBackend::new(full_article(), &config).await;
        assert!(matches!(
            result,
            Err(ReviewError::Configuration(ConfigurationError::Invalid { .. }))
        ));
    }

    #[tokio::test]
    async fn test_summary_failure_names_section() {
        // Call 8 is the introduction summary.
        let mock = Arc::new(MockGenerate::new().failing_on(8));
        let result = SelfHostedBackend::with_transport(full_article(), &config(), mock.clone()).await;

        match result {
            Err(ReviewError::Evaluation { evaluation, target, .. }) => {
                assert_eq!(evaluation, "Cohesion");
                assert_eq!(target, "introduction summary");
            }
            other => panic!("expected summary failure, got {:?}", other),
        }
        assert_eq!(mock.calls(), 8);
    }

    #[tokio::test]
    async fn test_blank_summary_fails_instead_of_skipping() {
        let mock = Arc::new(MockGenerate::new().blank_when("Summarize the following text:"));
        let result = SelfHostedBackend::with_transport(full_article(), &config(), mock.clone()).await;

        match result {
            Err(ReviewError::Evaluation {
                evaluation,
                target,
                source: ProviderError::MalformedResponse(_),
            }) => {
                assert_eq!(evaluation, "Cohesion");
                assert_eq!(target, "abstract summary");
            }
            other => panic!("expected malformed summary, got {:?}", other),
        }
        // Grammar and Theme ran; the first summary aborted cohesion
        assert_eq!(mock.calls(), 7);
    }

    #[tokio::test]
    async fn test_blank_summary_is_isolated_as_failure() {
        let mock = Arc::new(MockGenerate::new().blank_when("Summarize the following text:"));
        let backend = SelfHostedBackend::with_transport(
            full_article(),
            &config().with_isolate_failures(true),
            mock.clone(),
        )
        .await
        .unwrap();

        let cohesion = backend.response().get("Cohesion").unwrap();
        assert!(cohesion.is_failed());
        assert!(!cohesion.is_skipped());
    }

    #[tokio::test]
    async fn test_concurrent_summaries_stay_bounded() {
        let mock = Arc::new(MockGenerate::new().with_delays(vec![5; 10]));
        let backend = SelfHostedBackend::with_transport(
            full_article(),
            &config().with_max_concurrency(2),
            mock.clone(),
        )
        .await
        .unwrap();

        assert_eq!(
            backend.response().evaluations.titles(),
            vec!["Grammar", "Theme", "Cohesion"]
        );
        assert_eq!(mock.calls(), 10);
        assert!(mock.peak_in_flight() >= 2);
    }
}
