use serde::{Deserialize, Serialize};

use super::{LlmClient, LlmError};
use crate::config::{PipelineConfig, MAX_LLM_TIMEOUT_SECS};

/// Ollama HTTP client for local LLM inference.
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Create a client for `model` at `base_url`. The timeout is clamped to
    /// 1..=MAX_LLM_TIMEOUT_SECS so a call can never hang the pipeline.
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, LlmError> {
        let timeout_secs = timeout_secs.clamp(1, MAX_LLM_TIMEOUT_SECS);
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, LlmError> {
        Self::new(
            &config.llm_base_url,
            &config.llm_model,
            config.effective_llm_timeout_secs(),
        )
    }

    /// Check whether the configured model is installed.
    pub fn is_model_available(&self) -> Result<bool, LlmError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(&self.model)))
    }

    pub fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaTagsResponse = response
            .json()
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    fn map_transport_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_connect() {
            LlmError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            LlmError::Timeout(self.timeout_secs)
        } else {
            LlmError::HttpClient(e.to_string())
        }
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: &'a str,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Response body from Ollama /api/tags
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

impl LlmClient for OllamaClient {
    fn generate(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;

        Ok(parsed.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
