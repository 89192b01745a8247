//! Assessment orchestrator.
//!
//! Sequences every stage on one request:
//!
//! ```text
//! Received -> Validated -> Merged -> Extracted -> Predicted
//!          -> ConfidenceEvaluated -> Verified -> Recommended -> Finalized
//! ```
//!
//! Invalid input and unrecoverable extraction end in `Blocked`. Every other
//! failure is absorbed by a stage fallback, or becomes a generic internal
//! error at this boundary, panics included.

use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::{PipelineConfig, PIPELINE_VERSION};
use crate::llm::LlmClient;
use crate::models::{Assessment, AssessmentDraft, RawAssessmentRequest};
use crate::pipeline::classifier::{Classifier, ClassifierError, ResourceHandle};
use crate::pipeline::confidence::tier;
use crate::pipeline::explain::{explain, ExplanationContext};
use crate::pipeline::features::{FeatureError, FeatureExtractor};
use crate::pipeline::intake::{InputValidator, ValidationFailure};
use crate::pipeline::matcher::encode_symptoms;
use crate::pipeline::merge::{merge, resolve_report, ReportSource};
use crate::pipeline::recommend::{assess_severity, synthesize};
use crate::pipeline::reflection::Verifier;
use crate::pipeline::response::{
    AssessmentResponse, BlockedResponse, CompletedAssessment, ExtractionSummary, FailedResponse,
    IllegalTransition, PipelineState, PipelineTrace, PredictionSummary, ResponseMetadata,
    VerificationSummary,
};
use crate::pipeline::stage::{run_traced, Stage, Traced};
use crate::storage::{AssessmentRecord, AssessmentStore, StorageError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Extraction(#[from] FeatureError),

    #[error("Classifier resources unavailable: {0}")]
    Resources(#[from] ClassifierError),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Transition(#[from] IllegalTransition),
}

impl From<Infallible> for PipelineError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

impl PipelineError {
    /// Whether this error ends the run as `Blocked` rather than an internal error.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Extraction(_))
    }
}

/// Collaborators and settings for one or more runs.
///
/// Holds only shared, read-only state; each `run` builds its own stages.
pub struct PipelineContext<'a> {
    config: PipelineConfig,
    resources: &'a ResourceHandle,
    llm: Option<&'a dyn LlmClient>,
    store: Option<&'a dyn AssessmentStore>,
    reports: Option<&'a dyn ReportSource>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(config: PipelineConfig, resources: &'a ResourceHandle) -> Self {
        Self {
            config,
            resources,
            llm: None,
            store: None,
            reports: None,
        }
    }

    pub fn with_llm(mut self, llm: &'a dyn LlmClient) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_store(mut self, store: &'a dyn AssessmentStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_reports(mut self, reports: &'a dyn ReportSource) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn llm_if(&self, enabled: bool) -> Option<&'a dyn LlmClient> {
        self.llm.filter(|_| enabled)
    }
}

pub struct Orchestrator<'a> {
    ctx: PipelineContext<'a>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(ctx: PipelineContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &PipelineContext<'a> {
        &self.ctx
    }

    /// Run the full pipeline on one request. Never panics, never returns a
    /// partial assessment.
    pub fn run(&self, request: &RawAssessmentRequest) -> AssessmentResponse {
        let started = Instant::now();
        let timestamp = Utc::now();
        let _span = tracing::info_span!("assessment").entered();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(request, started, timestamp)));

        match outcome {
            Ok(Ok(completed)) => AssessmentResponse::Completed(Box::new(completed)),
            Ok(Err(PipelineError::Validation(failure))) => {
                tracing::info!(category = %failure.category, "Assessment blocked by validation");
                AssessmentResponse::Blocked(BlockedResponse::validation(&failure, timestamp))
            }
            Ok(Err(PipelineError::Extraction(e))) => {
                tracing::warn!(error = %e, "Assessment blocked by extraction failure");
                let disease = match &e {
                    FeatureError::NoRecognizedSymptoms { disease } => Some(disease.as_str()),
                    FeatureError::UnknownDisease(disease) => Some(disease.as_str()),
                    _ => None,
                };
                AssessmentResponse::Blocked(BlockedResponse::extraction(e.to_string(), disease, timestamp))
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Assessment failed");
                AssessmentResponse::Failed(FailedResponse::internal(timestamp))
            }
            Err(_) => {
                tracing::error!("Assessment pipeline panicked");
                AssessmentResponse::Failed(FailedResponse::internal(timestamp))
            }
        }
    }

    fn execute(
        &self,
        request: &RawAssessmentRequest,
        started: Instant,
        timestamp: DateTime<Utc>,
    ) -> Result<CompletedAssessment, PipelineError> {
        let config = &self.ctx.config;
        let mut trace = PipelineTrace::new();

        // Received -> Validated
        let sanitized = Traced::new(InputValidator).process(request)?;
        trace.advance(PipelineState::Validated)?;

        // Validated -> Merged
        let (report, report_status) = resolve_report(&sanitized.additional_info, self.ctx.reports);
        let merged = run_traced("merge", || {
            Ok::<_, Infallible>(merge(
                &sanitized,
                report.as_ref(),
                &sanitized.additional_info.source_markers,
            ))
        })?;
        trace.advance(PipelineState::Merged)?;

        // Merged -> Extracted
        let resources = self.ctx.resources.get()?;
        let extractor = FeatureExtractor::new(self.ctx.llm_if(config.enriched_extraction));
        let features = Traced::new(&extractor).process(&merged)?;
        let encoding = run_traced("encode", || {
            let encoding = encode_symptoms(&merged.symptoms, &resources.vocabulary);
            if features.recognized_symptoms == 0 && encoding.matched_terms.is_empty() {
                return Err(FeatureError::NoRecognizedSymptoms {
                    disease: features.disease.clone(),
                });
            }
            Ok(encoding)
        })?;
        trace.advance(PipelineState::Extracted)?;

        // Extracted -> Predicted
        let risk = resources
            .risk_models
            .score(&features, config.risk_blend_weight);
        let classifier = Classifier::new(&resources, config.min_candidate_probability, config.top_k)
            .with_risk(risk);
        let prediction = Traced::new(&classifier).process(&encoding)?;
        trace.advance(PipelineState::Predicted)?;

        // Predicted -> ConfidenceEvaluated
        let top = prediction.top();
        let confidence = tier(top.probability);
        tracing::info!(
            disease = %top.disease,
            probability = top.probability,
            confidence = confidence.as_str(),
            candidates = prediction.candidates.len(),
            "Prediction evaluated"
        );
        trace.advance(PipelineState::ConfidenceEvaluated)?;

        // ConfidenceEvaluated -> Verified
        let missing: &[String] = if features.disease == top.disease {
            &features.missing_features
        } else {
            &[]
        };
        let explanation = run_traced("explain", || {
            Ok::<_, Infallible>(explain(
                self.ctx.llm_if(config.enriched_explanation),
                &ExplanationContext {
                    disease: &top.disease,
                    probability: top.probability,
                    tier: confidence,
                    matched_symptoms: &encoding.matched_terms,
                    missing_features: missing,
                    low_trust: top.very_low_confidence || prediction.degraded,
                },
            ))
        })?;
        let draft = AssessmentDraft::new(&top.disease, top.probability, explanation);
        let verifier = Verifier::new(self.ctx.llm_if(config.enriched_verification));
        let outcome = Traced::new(&verifier).process(&draft)?;
        let (draft, verification_report) = outcome.resolve(draft);
        trace.advance(PipelineState::Verified)?;

        // Verified -> Recommended
        let severity = assess_severity(&merged.symptoms, &merged.additional_info.vitals);
        let recommendations = run_traced("recommend", || {
            Ok::<_, Infallible>(synthesize(&draft.disease, draft.confidence_tier, severity.severity))
        })?;
        trace.advance(PipelineState::Recommended)?;

        // Recommended -> Finalized
        let corrections_applied = draft
            .verification_info
            .as_ref()
            .map(|info| info.corrections_applied.clone())
            .unwrap_or_default();
        let assessment = Assessment::from_parts(draft, recommendations, verification_report);
        trace.advance(PipelineState::Finalized)?;

        let record = AssessmentRecord::new(
            assessment.clone(),
            prediction.candidates.clone(),
            features.method,
        );
        let (storage_ids, storage_error) = match self.persist(&record) {
            Ok(Some(id)) => (vec![id], None),
            Ok(None) => (Vec::new(), None),
            Err(e) => {
                tracing::warn!(error = %e, "Assessment completed but could not be stored");
                (Vec::new(), Some(e.to_string()))
            }
        };

        let processing_time_seconds = started.elapsed().as_secs_f64();
        tracing::info!(
            disease = %assessment.disease,
            confidence = assessment.confidence_tier.as_str(),
            urgency = assessment.recommendations.urgency.as_str(),
            corrected = assessment.verification_report.corrected,
            elapsed_ms = (processing_time_seconds * 1000.0) as u64,
            "Assessment finalized"
        );

        Ok(CompletedAssessment {
            prediction: PredictionSummary::new(&assessment, &prediction),
            extraction: ExtractionSummary {
                confidence: features.confidence,
                method: features.method,
                disease_schema: features.disease.clone(),
                routing_defaulted: features.routing_defaulted,
                missing_features: features.missing_features.clone(),
                matched_symptoms: encoding.matched_terms.clone(),
                merge: merged.summary.clone(),
                report_status,
            },
            explanation: assessment.explanation.clone(),
            recommendations: assessment.recommendations.clone(),
            verification: VerificationSummary {
                report: assessment.verification_report.clone(),
                corrections_applied,
            },
            metadata: ResponseMetadata {
                processing_time_seconds,
                timestamp,
                storage_ids,
                storage_error,
                pipeline_version: PIPELINE_VERSION.to_string(),
                stages: trace,
                severity_triggers: severity.triggers,
            },
        })
    }

    /// Hand the finalized record to the store, once. `None` when no store is configured.
    fn persist(&self, record: &AssessmentRecord) -> Result<Option<String>, PipelineError> {
        let Some(store) = self.ctx.store else {
            return Ok(None);
        };
        let id = store.store(record)?;
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::llm::{LlmError, MockLlmClient};
    use crate::models::{ConfidenceTier, ExtractionMethod, Urgency, VerificationSeverity};
    use crate::pipeline::classifier::{DiseaseModel, FixedDistributionModel, ModelResources};
    use crate::pipeline::merge::{ExtractionJob, ExtractionJobStatus, InMemoryReportSource, ReportState};
    use crate::pipeline::response::BlockReason;
    use crate::storage::MemoryStore;

    fn rules_config() -> PipelineConfig {
        PipelineConfig {
            enriched_extraction: false,
            enriched_verification: false,
            enriched_explanation: false,
            ..PipelineConfig::default()
        }
    }

    fn stub_resources(distribution: &[(&str, f64)]) -> ResourceHandle {
        let vocabulary: Vec<String> = ["increased thirst", "frequent urination", "fatigue", "cough", "fever"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let model = FixedDistributionModel::new(vocabulary.len(), distribution);
        ResourceHandle::preloaded(ModelResources::new(vocabulary, Arc::new(model)).unwrap())
    }

    fn diabetes_stub() -> ResourceHandle {
        stub_resources(&[("diabetes", 0.8), ("hypertension", 0.15), ("migraine", 0.05)])
    }

    fn diabetes_request() -> RawAssessmentRequest {
        RawAssessmentRequest::new(&["increased thirst", "frequent urination", "fatigue"], 45, "male")
    }

    // =================================================================
    // COMPLETED
    // =================================================================

    #[test]
    fn diabetes_stub_yields_high_confidence() {
        let resources = diabetes_stub();
        let orchestrator = Orchestrator::new(PipelineContext::new(rules_config(), &resources));

        let response = orchestrator.run(&diabetes_request());
        let completed = response.completed().expect("completed");

        assert_eq!(completed.prediction.disease, "diabetes");
        assert!((completed.prediction.probability - 0.8).abs() < 1e-9);
        assert_eq!(completed.prediction.confidence, ConfidenceTier::High);
        assert_eq!(completed.prediction.probability_percent, 80.0);
        assert!(!completed.recommendations.items.is_empty());
        assert_eq!(completed.extraction.method, ExtractionMethod::RuleBased);
        assert_eq!(completed.extraction.disease_schema, "diabetes");
        assert_eq!(completed.metadata.pipeline_version, PIPELINE_VERSION);
    }

    #[test]
    fn completed_run_walks_every_state() {
        let resources = diabetes_stub();
        let orchestrator = Orchestrator::new(PipelineContext::new(rules_config(), &resources));
        let response = orchestrator.run(&diabetes_request());
        let stages = response.completed().unwrap().metadata.stages.states().to_vec();
        assert_eq!(
            stages,
            vec![
                PipelineState::Received,
                PipelineState::Validated,
                PipelineState::Merged,
                PipelineState::Extracted,
                PipelineState::Predicted,
                PipelineState::ConfidenceEvaluated,
                PipelineState::Verified,
                PipelineState::Recommended,
                PipelineState::Finalized,
            ]
        );
    }

    #[test]
    fn repeated_runs_are_deterministic() {
        let resources = diabetes_stub();
        let orchestrator = Orchestrator::new(PipelineContext::new(rules_config(), &resources));
        let first = orchestrator.run(&diabetes_request());
        let second = orchestrator.run(&diabetes_request());
        let first = first.completed().unwrap();
        let second = second.completed().unwrap();
        assert_eq!(
            serde_json::to_string(&first.prediction).unwrap(),
            serde_json::to_string(&second.prediction).unwrap()
        );
    }

    #[test]
    fn store_called_once_per_completed_run() {
        let resources = diabetes_stub();
        let store = MemoryStore::new();
        let orchestrator =
            Orchestrator::new(PipelineContext::new(rules_config(), &resources).with_store(&store));

        let response = orchestrator.run(&diabetes_request());
        let completed = response.completed().unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(completed.metadata.storage_ids, vec![store.records()[0].record_id.to_string()]);
    }

    #[test]
    fn storage_failure_does_not_fail_assessment() {
        let resources = diabetes_stub();
        let store = MemoryStore::unavailable();
        let orchestrator =
            Orchestrator::new(PipelineContext::new(rules_config(), &resources).with_store(&store));

        let response = orchestrator.run(&diabetes_request());
        let completed = response.completed().unwrap();
        assert!(completed.metadata.storage_ids.is_empty());
        assert!(completed.metadata.storage_error.is_some());
    }

    #[test]
    fn sub_threshold_prediction_is_low_trust_not_error() {
        let resources = stub_resources(&[("diabetes", 0.04), ("migraine", 0.03), ("hypertension", 0.93)]);
        let config = PipelineConfig {
            min_candidate_probability: 0.95,
            ..rules_config()
        };
        let orchestrator = Orchestrator::new(PipelineContext::new(config, &resources));
        let response = orchestrator.run(&diabetes_request());
        let completed = response.completed().unwrap();
        assert_eq!(completed.prediction.candidates.len(), 1);
        assert!(completed.prediction.candidates[0].very_low_confidence);
        assert!(completed.prediction.warning.is_some());
        assert!(completed.explanation.summary.contains("weak signal"));
    }

    // =================================================================
    // BLOCKED
    // =================================================================

    #[test]
    fn invalid_input_is_blocked_without_touching_resources() {
        let resources = diabetes_stub();
        let store = MemoryStore::new();
        let orchestrator =
            Orchestrator::new(PipelineContext::new(rules_config(), &resources).with_store(&store));

        let request = RawAssessmentRequest::from_json(r#"{"symptoms": ["fever"]}"#).unwrap();
        let response = orchestrator.run(&request);
        let blocked = response.blocked().expect("blocked");

        assert_eq!(blocked.reason, BlockReason::ValidationFailed);
        assert_eq!(blocked.details["violations"][0]["field"], "age");
        assert!(store.is_empty());
    }

    #[test]
    fn unrecognizable_symptoms_block_extraction() {
        let resources = diabetes_stub();
        let orchestrator = Orchestrator::new(PipelineContext::new(rules_config(), &resources));

        let request = RawAssessmentRequest::new(&["itchy elbow"], 30, "female");
        let response = orchestrator.run(&request);
        let blocked = response.blocked().expect("blocked");

        assert_eq!(blocked.reason, BlockReason::ExtractionFailed);
        assert_eq!(blocked.details["disease_schema"], "diabetes");
    }

    // =================================================================
    // FAILED
    // =================================================================

    struct PanickingModel;

    impl DiseaseModel for PanickingModel {
        fn labels(&self) -> &[String] {
            &[]
        }
        fn input_len(&self) -> usize {
            1
        }
        fn forward(&self, _input: &[f64]) -> Result<Vec<f64>, ClassifierError> {
            panic!("model exploded")
        }
        fn name(&self) -> &str {
            "panicking"
        }
    }

    #[test]
    fn panic_in_stage_is_internal_error() {
        let resources = ResourceHandle::preloaded(
            ModelResources::new(vec!["fatigue".into()], Arc::new(PanickingModel)).unwrap(),
        );
        let orchestrator = Orchestrator::new(PipelineContext::new(rules_config(), &resources));
        let response = orchestrator.run(&RawAssessmentRequest::new(&["fatigue"], 40, "male"));
        assert!(matches!(response, AssessmentResponse::Failed(_)));
    }

    #[test]
    fn unloadable_resources_are_internal_error() {
        let resources = ResourceHandle::new(|| Err(ClassifierError::Parse("corrupt".into())));
        let orchestrator = Orchestrator::new(PipelineContext::new(rules_config(), &resources));
        let response = orchestrator.run(&diabetes_request());
        assert!(matches!(response, AssessmentResponse::Failed(_)));
        assert_eq!(resources.load_count(), 1);
    }

    // =================================================================
    // COLLABORATORS
    // =================================================================

    #[test]
    fn unreachable_ai_service_degrades_to_rules() {
        let resources = diabetes_stub();
        let llm = MockLlmClient::failing(LlmError::Connection("http://localhost:11434".into()));
        let orchestrator = Orchestrator::new(
            PipelineContext::new(PipelineConfig::default(), &resources).with_llm(&llm),
        );

        let response = orchestrator.run(&diabetes_request());
        let completed = response.completed().unwrap();
        assert_eq!(completed.extraction.method, ExtractionMethod::RuleBased);
        assert_eq!(completed.explanation.generated_by, ExtractionMethod::RuleBased);
        assert_eq!(completed.verification.report.method, ExtractionMethod::RuleBased);
        assert_eq!(llm.calls(), 3);
    }

    #[test]
    fn disabled_flags_keep_service_idle() {
        let resources = diabetes_stub();
        let llm = MockLlmClient::new("{}");
        let orchestrator =
            Orchestrator::new(PipelineContext::new(rules_config(), &resources).with_llm(&llm));
        assert!(orchestrator.run(&diabetes_request()).is_completed());
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn unsafe_review_is_corrected_once() {
        let resources = diabetes_stub();
        let llm = MockLlmClient::new(r#"{"is_safe": false, "issues": ["recommends a dose"]}"#);
        let config = PipelineConfig {
            enriched_verification: true,
            ..rules_config()
        };
        let orchestrator =
            Orchestrator::new(PipelineContext::new(config, &resources).with_llm(&llm));

        let response = orchestrator.run(&diabetes_request());
        let completed = response.completed().unwrap();
        assert_eq!(completed.verification.report.severity, VerificationSeverity::Critical);
        assert!(completed.verification.report.corrected);
        assert_eq!(completed.verification.corrections_applied, vec!["recommends a dose"]);
        assert!(completed.explanation.has_disclaimer());
        assert_eq!(completed.prediction.confidence, ConfidenceTier::High);
        assert_eq!(llm.calls(), 1);
    }

    #[test]
    fn completed_report_job_is_merged() {
        let resources = diabetes_stub();
        let reports = InMemoryReportSource::new();
        reports.upsert(ExtractionJob::complete(
            "job-1",
            crate::pipeline::merge::ExtractionResult {
                symptoms: vec!["blurred vision".into()],
                ..Default::default()
            },
        ));
        let orchestrator = Orchestrator::new(
            PipelineContext::new(rules_config(), &resources).with_reports(&reports),
        );

        let request = diabetes_request().with_additional_info(json!({"report_job_id": "job-1"}));
        let response = orchestrator.run(&request);
        let extraction = &response.completed().unwrap().extraction;

        assert!(extraction.merge.report_merged);
        assert_eq!(extraction.merge.symptoms_added, 1);
        assert_eq!(extraction.report_status.as_ref().unwrap().state, ReportState::Complete);
    }

    #[test]
    fn pending_report_job_is_reported_not_merged() {
        let resources = diabetes_stub();
        let reports = InMemoryReportSource::new();
        reports.upsert(ExtractionJob::new("job-2", ExtractionJobStatus::Processing, 40));
        let orchestrator = Orchestrator::new(
            PipelineContext::new(rules_config(), &resources).with_reports(&reports),
        );

        let request = diabetes_request().with_additional_info(json!({"report_job_id": "job-2"}));
        let response = orchestrator.run(&request);
        let status = response.completed().unwrap().extraction.report_status.clone().unwrap();

        assert_eq!(status.state, ReportState::Processing);
        assert_eq!(status.progress_percent, 40);
        assert!(!status.merged);
    }

    #[test]
    fn red_flag_symptom_forces_emergency() {
        let resources = diabetes_stub();
        let orchestrator = Orchestrator::new(PipelineContext::new(rules_config(), &resources));
        let request =
            RawAssessmentRequest::new(&["fatigue", "loss of consciousness"], 60, "female");
        let response = orchestrator.run(&request);
        let completed = response.completed().unwrap();
        assert_eq!(completed.recommendations.urgency, Urgency::Emergency);
        assert_eq!(completed.metadata.severity_triggers, vec!["consciousness_red_flag"]);
    }

    #[test]
    fn illegal_transition_is_an_internal_error() {
        let mut trace = PipelineTrace::new();
        let err: PipelineError = trace.advance(PipelineState::Predicted).unwrap_err().into();
        assert!(matches!(err, PipelineError::Transition(_)));
        assert!(!err.is_blocking());
    }
}
