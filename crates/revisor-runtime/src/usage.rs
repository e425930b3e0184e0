//! Outbound call and token accounting.
//!
//! Every backend owns a [`UsageMeter`]. Each completion, generation and
//! summary call is recorded; liveness probes are not.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::providers::TokenUsage;

/// Accumulated model usage for one review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    /// Number of model calls made
    pub llm_calls: u32,

    /// Prompt/input tokens
    pub prompt_tokens: u32,

    /// Completion/output tokens
    pub completion_tokens: u32,

    /// Total tokens used
    pub total_tokens: u32,
}

impl LlmUsage {
    /// Add token usage from one call.
    pub fn add(&mut self, usage: &TokenUsage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(usage.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(usage.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(usage.total());
    }
}

/// Thread-safe usage counter shared by concurrent calls of one backend.
#[derive(Debug, Default)]
pub struct UsageMeter {
    calls: AtomicU32,
    tokens: RwLock<LlmUsage>,
}

impl UsageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed call.
    pub fn record(&self, usage: &TokenUsage) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.write().add(usage);
    }

    /// Number of calls recorded so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of the accumulated usage.
    pub fn snapshot(&self) -> LlmUsage {
        LlmUsage {
            llm_calls: self.calls(),
            ..*self.tokens.read()
        }
    }
}
