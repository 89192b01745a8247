//! Public result of one pipeline run, shaped for the API layer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{
    Assessment, ConfidenceTier, DiseaseCandidate, DiseaseRisk, Explanation, ExtractionMethod,
    PredictionSet, Recommendations, VerificationReport,
};
use crate::pipeline::intake::ValidationFailure;
use crate::pipeline::merge::{MergeSummary, ReportStatus};

// ═══════════════════════════════════════════
// State machine
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    Validated,
    Merged,
    Extracted,
    Predicted,
    ConfidenceEvaluated,
    Verified,
    Recommended,
    Finalized,
    Blocked,
}

impl PipelineState {
    /// The single forward successor, if any.
    pub fn successor(self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Validated),
            Self::Validated => Some(Self::Merged),
            Self::Merged => Some(Self::Extracted),
            Self::Extracted => Some(Self::Predicted),
            Self::Predicted => Some(Self::ConfidenceEvaluated),
            Self::ConfidenceEvaluated => Some(Self::Verified),
            Self::Verified => Some(Self::Recommended),
            Self::Recommended => Some(Self::Finalized),
            Self::Finalized | Self::Blocked => None,
        }
    }

    /// Blocked is reachable from the states whose next stage can hard-fail.
    pub fn can_block(self) -> bool {
        matches!(self, Self::Received | Self::Merged | Self::Extracted)
    }

    pub fn can_transition(self, to: Self) -> bool {
        self.successor() == Some(to) || (to == Self::Blocked && self.can_block())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Illegal pipeline transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: PipelineState,
    pub to: PipelineState,
}

/// Ordered record of the states a run passed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PipelineTrace(Vec<PipelineState>);

impl PipelineTrace {
    pub fn new() -> Self {
        Self(vec![PipelineState::Received])
    }

    pub fn current(&self) -> PipelineState {
        self.0.last().copied().unwrap_or(PipelineState::Received)
    }

    /// Record a transition. Nothing is recorded if it would skip a stage.
    pub fn advance(&mut self, to: PipelineState) -> Result<(), IllegalTransition> {
        let from = self.current();
        if !from.can_transition(to) {
            return Err(IllegalTransition { from, to });
        }
        self.0.push(to);
        Ok(())
    }

    pub fn states(&self) -> &[PipelineState] {
        &self.0
    }
}

impl Default for PipelineTrace {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════
// Completed
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSummary {
    pub disease: String,
    pub probability: f64,
    pub probability_percent: f64,
    pub confidence: ConfidenceTier,
    pub candidates: Vec<DiseaseCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disease_risk: Option<DiseaseRisk>,
}

impl PredictionSummary {
    pub fn new(assessment: &Assessment, prediction: &PredictionSet) -> Self {
        Self {
            disease: assessment.disease.clone(),
            probability: assessment.probability,
            probability_percent: (assessment.probability * 1000.0).round() / 10.0,
            confidence: assessment.confidence_tier,
            candidates: prediction.candidates.clone(),
            warning: prediction.warning.clone(),
            degraded: prediction.degraded,
            disease_risk: prediction.disease_risk.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionSummary {
    pub confidence: f64,
    pub method: ExtractionMethod,
    /// Disease schema the features were mapped against.
    pub disease_schema: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub routing_defaulted: bool,
    pub missing_features: Vec<String>,
    pub matched_symptoms: Vec<String>,
    pub merge: MergeSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_status: Option<ReportStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMetadata {
    pub processing_time_seconds: f64,
    pub timestamp: DateTime<Utc>,
    pub storage_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_error: Option<String>,
    pub pipeline_version: String,
    pub stages: PipelineTrace,
    /// Rule ids behind the clinical severity, if any fired.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub severity_triggers: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedAssessment {
    pub prediction: PredictionSummary,
    pub extraction: ExtractionSummary,
    pub explanation: Explanation,
    pub recommendations: Recommendations,
    pub verification: VerificationSummary,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationSummary {
    #[serde(flatten)]
    pub report: VerificationReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub corrections_applied: Vec<String>,
}

// ═══════════════════════════════════════════
// Blocked / failed
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    ValidationFailed,
    ExtractionFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockedResponse {
    pub blocked: bool,
    pub reason: BlockReason,
    pub message: String,
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

impl BlockedResponse {
    pub fn validation(failure: &ValidationFailure, timestamp: DateTime<Utc>) -> Self {
        Self {
            blocked: true,
            reason: BlockReason::ValidationFailed,
            message: failure.to_string(),
            details: json!({
                "category": failure.category,
                "violations": failure.violations,
            }),
            timestamp,
        }
    }

    pub fn extraction(message: String, disease: Option<&str>, timestamp: DateTime<Utc>) -> Self {
        Self {
            blocked: true,
            reason: BlockReason::ExtractionFailed,
            message,
            details: json!({ "disease_schema": disease }),
            timestamp,
        }
    }
}

/// Generic internal error. Carries no stage detail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedResponse {
    pub error: bool,
    pub reason: &'static str,
    pub message: &'static str,
    pub timestamp: DateTime<Utc>,
}

impl FailedResponse {
    pub fn internal(timestamp: DateTime<Utc>) -> Self {
        Self {
            error: true,
            reason: "internal_error",
            message: "The assessment could not be completed due to an internal error.",
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AssessmentResponse {
    Completed(Box<CompletedAssessment>),
    Blocked(BlockedResponse),
    Failed(FailedResponse),
}

impl AssessmentResponse {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    pub fn completed(&self) -> Option<&CompletedAssessment> {
        match self {
            Self::Completed(c) => Some(c),
            _ => None,
        }
    }

    pub fn blocked(&self) -> Option<&BlockedResponse> {
        match self {
            Self::Blocked(b) => Some(b),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
