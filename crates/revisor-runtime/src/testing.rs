//! Recording mock transports for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::providers::{
    ChatRequest, ChatTransport, Completion, GenerateRequest, GenerateTransport, Generation,
    ProviderError, TokenUsage,
};

/// Tracks in-flight calls and the peak seen.
#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Shared call script: numbering, injected failure, per-call delays.
#[derive(Default)]
struct Script {
    calls: AtomicUsize,
    fail_on: Option<usize>,
    delays_ms: Vec<u64>,
    gauge: Gauge,
}

impl Script {
    /// Start a call; returns its 1-based number.
    async fn begin(&self) -> usize {
        let number = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.enter();
        if let Some(ms) = self.delays_ms.get(number - 1) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        number
    }

    fn finish(&self, number: usize) -> Result<(), ProviderError> {
        self.gauge.exit();
        if self.fail_on == Some(number) {
            Err(ProviderError::ApiError {
                status: 500,
                message: format!("injected failure on call {}", number),
            })
        } else {
            Ok(())
        }
    }
}

/// Hosted transport that records every request.
#[derive(Default)]
pub(crate) struct MockChat {
    requests: Mutex<Vec<ChatRequest>>,
    script: Script,
    unhealthy: bool,
}

impl MockChat {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fail the n-th call (1-based).
    pub(crate) fn failing_on(mut self, call: usize) -> Self {
        self.script.fail_on = Some(call);
        self
    }

    /// Sleep before answering, one entry per call in order.
    pub(crate) fn with_delays(mut self, delays_ms: Vec<u64>) -> Self {
        self.script.delays_ms = delays_ms;
        self
    }

    pub(crate) fn unhealthy(mut self) -> Self {
        self.unhealthy = true;
        self
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.script.gauge.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for MockChat {
    async fn complete(&self, request: ChatRequest) -> Result<Completion, ProviderError> {
        self.requests.lock().push(request.clone());
        let number = self.script.begin().await;
        self.script.finish(number)?;

        let last = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(Completion {
            content: format!("reply {} to {}", number, last),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
            },
            model: request.model,
        })
    }

    async fn health_check(&self) -> bool {
        !self.unhealthy
    }

    fn name(&self) -> &str {
        "mock-chat"
    }
}

/// Self-hosted transport that records every request.
#[derive(Default)]
pub(crate) struct MockGenerate {
    requests: Mutex<Vec<GenerateRequest>>,
    script: Script,
    probes: AtomicUsize,
    offline: bool,
    blank_when: Option<&'static str>,
}

impl MockGenerate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_on(mut self, call: usize) -> Self {
        self.script.fail_on = Some(call);
        self
    }

    pub(crate) fn with_delays(mut self, delays_ms: Vec<u64>) -> Self {
        self.script.delays_ms = delays_ms;
        self
    }

    pub(crate) fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Answer with whitespace when the prompt contains `pattern`.
    pub(crate) fn blank_when(mut self, pattern: &'static str) -> Self {
        self.blank_when = Some(pattern);
        self
    }

    pub(crate) fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.script.gauge.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerateTransport for MockGenerate {
    async fn probe(&self) -> Result<(), ProviderError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            Err(ProviderError::HttpError("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    async fn generate(&self, request: GenerateRequest) -> Result<Generation, ProviderError> {
        self.requests.lock().push(request.clone());
        let number = self.script.begin().await;
        self.script.finish(number)?;

        let blank = self
            .blank_when
            .is_some_and(|pattern| request.inputs.contains(pattern));
        Ok(Generation {
            text: if blank {
                "   ".to_string()
            } else {
                format!("generated {}", number)
            },
            usage: TokenUsage {
                prompt_tokens: 20,
                completion_tokens: 4,
            },
        })
    }

    fn name(&self) -> &str {
        "mock-generate"
    }
}
