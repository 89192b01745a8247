//! Persistence collaborator for finalized assessments.
//!
//! The pipeline hands each finalized assessment to an `AssessmentStore`
//! exactly once. Storage is outside the assessment's correctness: a failed
//! write is reported in response metadata, never as a pipeline failure.

pub mod json_store;
pub mod memory;

pub use json_store::*;
pub use memory::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Assessment, DiseaseCandidate, ExtractionMethod};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid record id: {0}")]
    InvalidId(String),

    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// What gets persisted for one completed assessment.
///
/// Holds derived results only; the raw symptom text stays out of storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub record_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub pipeline_version: String,
    pub assessment: Assessment,
    pub candidates: Vec<DiseaseCandidate>,
    pub extraction_method: ExtractionMethod,
}

impl AssessmentRecord {
    pub fn new(
        assessment: Assessment,
        candidates: Vec<DiseaseCandidate>,
        extraction_method: ExtractionMethod,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            created_at: Utc::now(),
            pipeline_version: crate::config::PIPELINE_VERSION.to_string(),
            assessment,
            candidates,
            extraction_method,
        }
    }
}

/// Persistence capability: store a record, get back its id.
pub trait AssessmentStore: Send + Sync {
    fn store(&self, record: &AssessmentRecord) -> Result<String, StorageError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_trait_is_object_safe() {
        fn _assert(_: &dyn AssessmentStore) {}
    }

    #[test]
    fn record_stamps_pipeline_version() {
        let record = test_support::sample_record();
        assert_eq!(record.pipeline_version, crate::config::PIPELINE_VERSION);
        assert_ne!(record.record_id, test_support::sample_record().record_id);
    }

    #[test]
    fn errors_render_context() {
        let err = StorageError::InvalidId("../etc".into());
        assert_eq!(err.to_string(), "Invalid record id: ../etc");
    }
}
