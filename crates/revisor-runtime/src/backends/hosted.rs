//! Hosted chat-completion backend.
//!
//! Declares Theme, Grammar and Cohesion. Theme and Grammar send one
//! completion per section built from a few-shot transcript; Cohesion sends
//! one completion over abstract, introduction and conclusion.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use revisor_core::{
    CohesionSections, ConfigValues, EvaluationKind, EvaluationOutcome, EvaluationRequest,
    GenerationParams, ReviewResponse,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use super::{per_section, run_declared, EvaluationDescriptor};
use crate::config::{ExecutionPolicy, RuntimeConfig};
use crate::prompts;
use crate::providers::{ChatMessage, ChatRequest, ChatTransport, OpenAiClient, ProviderError, OPENAI_API_KEY_ENV};
use crate::usage::{LlmUsage, UsageMeter};
use crate::ReviewError;

/// Backend that reviews through a hosted chat-completion API.
pub struct HostedBackend {
    request: EvaluationRequest,
    model: String,
    transport: Arc<dyn ChatTransport>,
    values: ConfigValues,
    policy: ExecutionPolicy,
    usage: UsageMeter,
    evaluations: Vec<EvaluationDescriptor<HostedBackend>>,
    response: ReviewResponse,
    reviewed_at: DateTime<Utc>,
}

fn theme(backend: &HostedBackend) -> BoxFuture<'_, Result<EvaluationOutcome, ReviewError>> {
    Box::pin(backend.evaluate_theme())
}

fn grammar(backend: &HostedBackend) -> BoxFuture<'_, Result<EvaluationOutcome, ReviewError>> {
    Box::pin(backend.evaluate_grammar())
}

fn cohesion(backend: &HostedBackend) -> BoxFuture<'_, Result<EvaluationOutcome, ReviewError>> {
    Box::pin(backend.evaluate_cohesion())
}

impl HostedBackend {
    pub const NAME: &'static str = "hosted";

    pub const REQUIRED_CONFIG: &'static [&'static str] = &[OPENAI_API_KEY_ENV];

    /// The evaluations this backend runs, in order.
    pub fn declared_evaluations() -> Vec<EvaluationDescriptor<HostedBackend>> {
        vec![
            EvaluationDescriptor::new(EvaluationKind::Theme, theme),
            EvaluationDescriptor::new(EvaluationKind::Grammar, grammar),
            EvaluationDescriptor::new(EvaluationKind::Cohesion, cohesion),
        ]
    }

    /// Construct with the OpenAI client and run every declared evaluation.
    pub async fn new(request: EvaluationRequest, config: &RuntimeConfig) -> Result<Self, ReviewError> {
        let client = OpenAiClient::from_values(
            &config.values,
            &config.hosted.base_url,
            config.request_timeout,
        )
        .map_err(ReviewError::from_setup)?;
        Self::with_transport(request, config, Arc::new(client)).await
    }

    /// Construct with a caller-supplied transport and run every declared
    /// evaluation. The response is ready when this returns.
    pub async fn with_transport(
        request: EvaluationRequest,
        config: &RuntimeConfig,
        transport: Arc<dyn ChatTransport>,
    ) -> Result<Self, ReviewError> {
        request.validate()?;

        let mut backend = Self {
            request,
            model: config.hosted.model.clone(),
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

    /// Configuration guard plus the transport's credential check. No network call.
    ///
    /// The built-in client always passes the second step; it matters for
    /// transports supplied by the caller.
    pub async fn validate_initialization(&self) -> Result<(), ReviewError> {
        self.values.require_all(Self::REQUIRED_CONFIG)?;

        if !self.transport.health_check().await {
            return Err(ReviewError::BackendUnavailable(format!(
                "{} reports an unusable credential; check {}",
                self.transport.name(),
                OPENAI_API_KEY_ENV
            )));
        }
        Ok(())
    }

    /// Validate, then run the declared evaluations.
    pub async fn get_response(&self) -> Result<ReviewResponse, ReviewError> {
        self.validate_initialization().await?;

        info!(
            backend = Self::NAME,
            model = %self.model,
            sections = self.request.sections.len(),
            "running hosted review"
        );
        run_declared(self, Self::NAME, &self.evaluations, self.policy).await
    }

    /// Theme critique, one completion per section at the caller temperature.
    pub async fn evaluate_theme(&self) -> Result<EvaluationOutcome, ReviewError> {
        let params = self.request.params;
        per_section(&self.request, EvaluationKind::Theme, self.policy.max_concurrency, |text| {
            let messages = prompts::hosted_theme_messages(&self.request.context, &text);
            self.complete(EvaluationKind::Theme, messages, params)
        })
        .await
    }

    /// Grammar suggestions, one completion per section at temperature 0.
    pub async fn evaluate_grammar(&self) -> Result<EvaluationOutcome, ReviewError> {
        let params = self.request.params.deterministic();
        per_section(&self.request, EvaluationKind::Grammar, self.policy.max_concurrency, |text| {
            let messages = prompts::hosted_grammar_messages(&self.request.context, &text);
            self.complete(EvaluationKind::Grammar, messages, params)
        })
        .await
    }

    /// Cross-section consistency check at temperature 0.
    ///
    /// Fails with a missing-sections request error, before any call, when
    /// abstract, introduction or conclusion is absent.
    pub async fn evaluate_cohesion(&self) -> Result<EvaluationOutcome, ReviewError> {
        let sections = CohesionSections::from_request(&self.request)?;
        let messages = prompts::hosted_cohesion_messages(&self.request.context, &sections);

        let text = self
            .complete(EvaluationKind::Cohesion, messages, self.request.params.deterministic())
            .await
            .map_err(|source| ReviewError::evaluation(EvaluationKind::Cohesion.title(), "the whole request", source))?;
        Ok(EvaluationOutcome::Whole(text))
    }

    async fn complete(
        &self,
        kind: EvaluationKind,
        messages: Vec<ChatMessage>,
        params: GenerationParams,
    ) -> Result<String, ProviderError> {
        debug!(
            backend = Self::NAME,
            evaluation = %kind,
            messages = messages.len(),
            temperature = params.temperature,
            "requesting completion"
        );

        let completion = self
            .transport
            .complete(ChatRequest {
                model: self.model.clone(),
                messages,
                params,
            })
            .await?;
        self.usage.record(&completion.usage);
        Ok(completion.content)
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

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn evaluations(&self) -> &[EvaluationDescriptor<HostedBackend>] {
        &self.evaluations
    }

    pub fn usage(&self) -> LlmUsage {
        self.usage.snapshot()
    }

    pub fn reviewed_at(&self) -> DateTime<Utc> {
        self.reviewed_at
    }
}

impl fmt::Debug for HostedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostedBackend")
            .field("model", &self.model)
            .field("transport", &self.transport.name())
            .field("values", &self.values)
            .field("policy", &self.policy)
            .field("evaluations", &self.evaluations)
            .finish()
    }
}
