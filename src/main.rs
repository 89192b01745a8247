//! `symptom-risk [request.json]`
//!
//! Reads one assessment request (from the file argument, or stdin when the
//! argument is absent or `-`), runs the pipeline and prints the response JSON
//! to stdout. Exit status: 0 completed, 1 blocked or failed, 2 usage or I/O.

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;

use symptom_risk::config::{ConfigError, PipelineConfig, APP_VERSION};
use symptom_risk::llm::{CachedLlmClient, InMemoryCache, LlmClient, OllamaClient};
use symptom_risk::models::RawAssessmentRequest;
use symptom_risk::pipeline::classifier::ResourceHandle;
use symptom_risk::pipeline::{AssessmentResponse, Orchestrator, PipelineContext};
use symptom_risk::storage::JsonFileStore;

const LLM_CACHE_CAPACITY: usize = 256;

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cannot read request from {source_name}: {error}")]
    Input {
        source_name: String,
        error: std::io::Error,
    },

    #[error("Request is not valid JSON: {0}")]
    Request(#[from] serde_json::Error),

    #[error("Cannot serialize response: {0}")]
    Output(serde_json::Error),
}

fn main() -> ExitCode {
    symptom_risk::init_tracing();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("symptom-risk: {e}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<ExitCode, CliError> {
    let config = PipelineConfig::from_env()?;
    let raw = read_request(std::env::args().nth(1).as_deref())?;
    let request = RawAssessmentRequest::from_json(&raw)?;

    tracing::info!(version = APP_VERSION, "symptom-risk starting");

    let resources = ResourceHandle::from_config(&config);
    let store = JsonFileStore::from_config(&config);
    let llm = connect_llm(&config);

    let mut ctx = PipelineContext::new(config, &resources).with_store(&store);
    if let Some(llm) = llm.as_ref() {
        ctx = ctx.with_llm(llm);
    }

    let response = Orchestrator::new(ctx).run(&request);
    println!("{}", response.to_json().map_err(CliError::Output)?);

    Ok(match response {
        AssessmentResponse::Completed(_) => ExitCode::SUCCESS,
        AssessmentResponse::Blocked(_) | AssessmentResponse::Failed(_) => ExitCode::from(1),
    })
}

fn read_request(path: Option<&str>) -> Result<String, CliError> {
    match path {
        None | Some("-") => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .map_err(|error| CliError::Input {
                    source_name: "stdin".into(),
                    error,
                })?;
            Ok(raw)
        }
        Some(path) => std::fs::read_to_string(Path::new(path)).map_err(|error| CliError::Input {
            source_name: path.to_string(),
            error,
        }),
    }
}

/// The AI client, only when some enriched strategy is enabled and the
/// configured model is actually installed. Otherwise every stage runs its
/// deterministic strategy.
fn connect_llm(config: &PipelineConfig) -> Option<CachedLlmClient<OllamaClient>> {
    if !(config.enriched_extraction || config.enriched_explanation || config.enriched_verification) {
        return None;
    }

    let client = match OllamaClient::from_config(config) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "AI client could not be built, using deterministic strategies");
            return None;
        }
    };

    match client.is_model_available() {
        Ok(true) => {
            tracing::info!(model = client.model_name(), "AI service available");
            Some(CachedLlmClient::new(
                client,
                Arc::new(InMemoryCache::new(LLM_CACHE_CAPACITY)),
            ))
        }
        Ok(false) => {
            tracing::warn!(model = client.model_name(), "AI model not installed, using deterministic strategies");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "AI service unavailable, using deterministic strategies");
            None
        }
    }
}
