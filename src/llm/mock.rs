use std::sync::atomic::{AtomicUsize, Ordering};

use super::{LlmClient, LlmError};

/// Mock LLM client for testing. Returns configurable replies.
///
/// Replies are routed by substring match against the system prompt, so one
/// mock can serve extraction, explanation and verification calls with
/// different canned answers. Unmatched calls get the default reply.
pub struct MockLlmClient {
    default_reply: Result<String, LlmError>,
    routes: Vec<(String, Result<String, LlmError>)>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            default_reply: Ok(response.to_string()),
            routes: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// A client whose every call fails with `error`.
    pub fn failing(error: LlmError) -> Self {
        Self {
            default_reply: Err(error),
            routes: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Reply with `response` when the system prompt contains `marker`.
    pub fn with_route(mut self, marker: &str, response: &str) -> Self {
        self.routes.push((marker.to_string(), Ok(response.to_string())));
        self
    }

    /// Fail with `error` when the system prompt contains `marker`.
    pub fn with_failing_route(mut self, marker: &str, error: LlmError) -> Self {
        self.routes.push((marker.to_string(), Err(error)));
        self
    }

    /// Number of `generate` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, _prompt: &str, system: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.routes
            .iter()
            .find(|(marker, _)| system.contains(marker.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default_reply.clone())
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
