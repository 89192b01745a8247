//! Text-generation service boundary.
//!
//! The pipeline treats the AI service as best-effort: every caller holds a
//! deterministic fallback, so nothing here is allowed to panic or block
//! beyond the configured timeout.

pub mod cache;
pub mod mock;
pub mod ollama;
pub mod parse;

pub use cache::*;
pub use mock::*;
pub use ollama::*;
pub use parse::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("AI service is not reachable at {0}")]
    Connection(String),

    #[error("AI service returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("AI service request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed AI response: {0}")]
    MalformedResponse(String),

    #[error("AI service disabled")]
    Disabled,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Response cache unavailable: {0}")]
    Unavailable(String),
}

/// Text-generation client abstraction (allows mocking and decoration).
pub trait LlmClient: Send + Sync {
    fn generate(&self, prompt: &str, system: &str) -> Result<String, LlmError>;

    /// Short identifier for logs and cache keys.
    fn model_name(&self) -> &str;
}

impl<C: LlmClient + ?Sized> LlmClient for std::sync::Arc<C> {
    fn generate(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        (**self).generate(prompt, system)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}
