//! Maps validated, merged input onto a disease-specific feature schema.
//!
//! Two strategies share one output shape: an AI-enriched mapper and a
//! deterministic keyword table. The enriched path is tried first when
//! enabled; any failure falls back to the rules.

pub mod enriched;
pub mod extractor;
pub mod routing;
pub mod rules;
pub mod schema;
pub mod types;

pub use extractor::*;
pub use routing::*;
pub use schema::*;
pub use types::*;

use thiserror::Error;

use crate::llm::LlmError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("Feature enrichment unavailable: {0}")]
    EnrichmentUnavailable(#[from] LlmError),

    #[error("Feature enrichment reply unusable: {0}")]
    MalformedReply(String),

    #[error("No feature schema for disease: {0}")]
    UnknownDisease(String),

    #[error("No symptom could be mapped to a feature of {disease}")]
    NoRecognizedSymptoms { disease: String },
}
