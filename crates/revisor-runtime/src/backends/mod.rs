//! Evaluation backends.
//!
//! Each backend declares an ordered table of [`EvaluationDescriptor`]s and
//! runs it through one shared driver, so ordering, skipping and failure
//! handling behave the same everywhere:
//!
//! - outcomes are keyed by title, in declaration order
//! - an evaluation that needs sections the request lacks is recorded as
//!   skipped, without any model call
//! - any other failure aborts the review, unless failure isolation is on,
//!   in which case it is recorded in the evaluation's slot
//!
//! Fan-out (evaluations, and sections within a per-section evaluation) is
//! bounded by [`ExecutionPolicy::max_concurrency`]; results are reassembled
//! in logical order whatever the completion order.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use revisor_core::{EvaluationKind, EvaluationOutcome, EvaluationRequest, Evaluations, ReviewResponse};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::config::{ExecutionPolicy, RuntimeConfig};
use crate::providers::{ChatTransport, GenerateTransport, ProviderError};
use crate::usage::LlmUsage;
use crate::ReviewError;

mod hosted;
mod self_hosted;

pub use hosted::HostedBackend;
pub use self_hosted::SelfHostedBackend;

/// An evaluation procedure: runs against a constructed backend.
pub type Procedure<B> =
    for<'a> fn(&'a B) -> BoxFuture<'a, Result<EvaluationOutcome, ReviewError>>;

/// One declared evaluation: `{title, description, procedure}`.
pub struct EvaluationDescriptor<B> {
    pub kind: EvaluationKind,
    pub title: &'static str,
    pub description: &'static str,
    pub procedure: Procedure<B>,
}

impl<B> EvaluationDescriptor<B> {
    /// Describe an evaluation with its standard title and description.
    pub fn new(kind: EvaluationKind, procedure: Procedure<B>) -> Self {
        Self {
            kind,
            title: kind.title(),
            description: kind.description(),
            procedure,
        }
    }
}

impl<B> Clone for EvaluationDescriptor<B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for EvaluationDescriptor<B> {}

impl<B> fmt::Debug for EvaluationDescriptor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationDescriptor")
            .field("title", &self.title)
            .field("description", &self.description)
            .finish()
    }
}

/// Run a backend's declared evaluations and collect their outcomes.
pub(crate) async fn run_declared<B: Sync>(
    backend: &B,
    backend_name: &'static str,
    descriptors: &[EvaluationDescriptor<B>],
    policy: ExecutionPolicy,
) -> Result<ReviewResponse, ReviewError> {
    let outcomes = stream::iter(descriptors.to_vec())
        .map(move |descriptor| async move {
            debug!(backend = backend_name, evaluation = descriptor.title, "running evaluation");
            let result = (descriptor.procedure)(backend).await;
            (descriptor.title, result)
        })
        .buffered(policy.max_concurrency.max(1));
    let mut outcomes = pin!(outcomes);

    let mut evaluations = Evaluations::new();
    while let Some((title, result)) = outcomes.next().await {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                if let Some(missing) = err.missing_sections() {
                    warn!(
                        backend = backend_name,
                        evaluation = title,
                        missing = ?missing,
                        "request lacks required sections, evaluation skipped"
                    );
                    EvaluationOutcome::skipped(format!("missing sections: {}", missing.join(", ")))
                } else if policy.isolate_failures {
                    warn!(backend = backend_name, evaluation = title, error = %err, "evaluation failed");
                    EvaluationOutcome::failed(err.to_string())
                } else {
                    error!(backend = backend_name, evaluation = title, error = %err, "evaluation failed, aborting review");
                    return Err(err);
                }
            }
        };
        evaluations.insert(title, outcome);
    }

    Ok(ReviewResponse::new(evaluations))
}

/// Run one call per section and key the produced texts by section name.
///
/// Sections are dispatched in lexical order with at most `max_concurrency`
/// calls in flight. The first failure is returned, naming its section.
pub(crate) async fn per_section<F, Fut>(
    request: &EvaluationRequest,
    kind: EvaluationKind,
    max_concurrency: usize,
    call: F,
) -> Result<EvaluationOutcome, ReviewError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<String, ProviderError>>,
{
    let call = &call;
    let jobs: Vec<(String, String)> = request
        .sections
        .iter()
        .map(|(name, text)| (name.clone(), text.clone()))
        .collect();

    let produced: BTreeMap<String, String> = stream::iter(jobs)
        .map(move |(name, text)| {
            debug!(evaluation = kind.title(), section = %name, "evaluating section");
            let pending = call(text);
            async move {
                match pending.await {
                    Ok(output) => Ok((name, output)),
                    Err(source) => Err(ReviewError::evaluation(kind.title(), name, source)),
                }
            }
        })
        .buffered(max_concurrency.max(1))
        .try_collect()
        .await?;

    Ok(EvaluationOutcome::PerSection(produced))
}

/// The closed set of backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Chat-completion API reached with an API key
    Hosted,
    /// Instruction-tuned model behind a tunnel URL
    SelfHosted,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Hosted => HostedBackend::NAME,
            BackendKind::SelfHosted => SelfHostedBackend::NAME,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BackendKind::Hosted => "Hosted chat-completion API with few-shot review transcripts",
            BackendKind::SelfHosted => {
                "Self-hosted instruction-tuned model reached through a tunnel URL"
            }
        }
    }

    /// Configuration values the backend refuses to run without.
    pub fn required_config(&self) -> &'static [&'static str] {
        match self {
            BackendKind::Hosted => HostedBackend::REQUIRED_CONFIG,
            BackendKind::SelfHosted => SelfHostedBackend::REQUIRED_CONFIG,
        }
    }

    /// Titles of the declared evaluations, in declaration order.
    pub fn evaluation_titles(&self) -> Vec<&'static str> {
        match self {
            BackendKind::Hosted => HostedBackend::declared_evaluations()
                .iter()
                .map(|d| d.title)
                .collect(),
            BackendKind::SelfHosted => SelfHostedBackend::declared_evaluations()
                .iter()
                .map(|d| d.title)
                .collect(),
        }
    }

    /// Construct (and thereby run) a backend with production transports.
    pub async fn construct(
        self,
        request: EvaluationRequest,
        config: &RuntimeConfig,
    ) -> Result<Backend, ReviewError> {
        self.construct_with(request, config, &Transports::default())
            .await
    }

    /// Construct a backend, using any transport override supplied.
    pub async fn construct_with(
        self,
        request: EvaluationRequest,
        config: &RuntimeConfig,
        transports: &Transports,
    ) -> Result<Backend, ReviewError> {
        match self {
            BackendKind::Hosted => {
                let backend = match &transports.chat {
                    Some(transport) => {
                        HostedBackend::with_transport(request, config, Arc::clone(transport)).await?
                    }
                    None => HostedBackend::new(request, config).await?,
                };
                Ok(Backend::Hosted(backend))
            }
            BackendKind::SelfHosted => {
                let backend = match &transports.generate {
                    Some(transport) => {
                        SelfHostedBackend::with_transport(request, config, Arc::clone(transport))
                            .await?
                    }
                    None => SelfHostedBackend::new(request, config).await?,
                };
                Ok(Backend::SelfHosted(backend))
            }
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional transport overrides used instead of the HTTP clients.
#[derive(Clone, Default)]
pub struct Transports {
    pub chat: Option<Arc<dyn ChatTransport>>,
    pub generate: Option<Arc<dyn GenerateTransport>>,
}

impl Transports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chat(mut self, transport: Arc<dyn ChatTransport>) -> Self {
        self.chat = Some(transport);
        self
    }

    pub fn with_generate(mut self, transport: Arc<dyn GenerateTransport>) -> Self {
        self.generate = Some(transport);
        self
    }
}

impl fmt::Debug for Transports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transports")
            .field("chat", &self.chat.as_ref().map(|t| t.name().to_string()))
            .field("generate", &self.generate.as_ref().map(|t| t.name().to_string()))
            .finish()
    }
}

/// A constructed backend. Its response is ready as soon as it exists.
#[derive(Debug)]
pub enum Backend {
    Hosted(HostedBackend),
    SelfHosted(SelfHostedBackend),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Hosted(_) => BackendKind::Hosted,
            Backend::SelfHosted(_) => BackendKind::SelfHosted,
        }
    }

    pub fn response(&self) -> &ReviewResponse {
        match self {
            Backend::Hosted(backend) => backend.response(),
            Backend::SelfHosted(backend) => backend.response(),
        }
    }

    pub fn into_response(self) -> ReviewResponse {
        match self {
            Backend::Hosted(backend) => backend.into_response(),
            Backend::SelfHosted(backend) => backend.into_response(),
        }
    }

    /// Model calls made while constructing this backend.
    pub fn usage(&self) -> LlmUsage {
        match self {
            Backend::Hosted(backend) => backend.usage(),
            Backend::SelfHosted(backend) => backend.usage(),
        }
    }

    /// When the declared evaluations finished.
    pub fn reviewed_at(&self) -> DateTime<Utc> {
        match self {
            Backend::Hosted(backend) => backend.reviewed_at(),
            Backend::SelfHosted(backend) => backend.reviewed_at(),
        }
    }

    pub fn evaluation_titles(&self) -> Vec<&'static str> {
        self.kind().evaluation_titles()
    }
}
