use serde::{Deserialize, Serialize};

use super::enums::{ClinicalSeverity, ConfidenceTier, ExtractionMethod, Urgency, VerificationSeverity};
use crate::pipeline::confidence::tier;

/// Disclaimer every explanation must carry.
pub const MEDICAL_DISCLAIMER: &str = "This assessment is informational and is not a medical \
     diagnosis. Please consult a qualified healthcare professional about your symptoms.";

/// Phrase whose presence marks an explanation as carrying the disclaimer.
const DISCLAIMER_MARKER: &str = "not a medical diagnosis";

/// One ranked entry of a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseCandidate {
    pub disease: String,
    pub probability: f64,
    /// 1-based.
    pub rank: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub very_low_confidence: bool,
    /// Set on the first candidate only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_symptoms: Vec<String>,
}

/// Ranked, deduplicated candidates plus any caller-facing warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSet {
    pub candidates: Vec<DiseaseCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// True when the classifier failed and a placeholder candidate was substituted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
    /// Score of the disease-specific model for the routed schema, when one ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disease_risk: Option<DiseaseRisk>,
}

/// Output of the disease-specific model for the schema routing selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseRisk {
    pub disease: String,
    /// Probability from the disease-specific model alone.
    pub probability: f64,
    /// Share of the schema's required features that were resolved.
    pub coverage: f64,
    /// Weight given to `probability` when blended into the ranked distribution.
    /// Zero when the generic model has no matching label.
    pub blend_weight: f64,
}

impl PredictionSet {
    /// The top candidate. A prediction set is never empty.
    pub fn top(&self) -> &DiseaseCandidate {
        &self.candidates[0]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub summary: String,
    #[serde(default)]
    pub key_factors: Vec<String>,
    #[serde(default)]
    pub disclaimer: String,
    pub generated_by: ExtractionMethod,
}

impl Explanation {
    pub fn has_disclaimer(&self) -> bool {
        self.disclaimer.to_lowercase().contains(DISCLAIMER_MARKER)
            || self.summary.to_lowercase().contains(DISCLAIMER_MARKER)
    }
}

/// Stamp left on a draft that verification rewrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationInfo {
    pub corrections_applied: Vec<String>,
}

/// The assessment as it exists before verification.
///
/// Fields are public so a draft can be inspected and, in tests, deliberately
/// corrupted; `AssessmentDraft::new` is the only constructor that keeps the
/// tier consistent with the probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentDraft {
    pub disease: String,
    pub probability: f64,
    pub confidence_tier: ConfidenceTier,
    pub explanation: Explanation,
    #[serde(
        rename = "_verification_info",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub verification_info: Option<VerificationInfo>,
}

impl AssessmentDraft {
    pub fn new(disease: &str, probability: f64, explanation: Explanation) -> Self {
        Self {
            disease: disease.to_string(),
            probability,
            confidence_tier: tier(probability),
            explanation,
            verification_info: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub issues: Vec<String>,
    pub severity: VerificationSeverity,
    pub corrected: bool,
    pub method: ExtractionMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub items: Vec<String>,
    pub urgency: Urgency,
    pub confidence: ConfidenceTier,
    pub severity: ClinicalSeverity,
}

/// The finalized assessment: verified draft plus recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub disease: String,
    pub probability: f64,
    pub confidence_tier: ConfidenceTier,
    pub explanation: Explanation,
    pub recommendations: Recommendations,
    pub verification_report: VerificationReport,
    #[serde(
        rename = "_verification_info",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub verification_info: Option<VerificationInfo>,
}

impl Assessment {
    pub fn from_parts(
        draft: AssessmentDraft,
        recommendations: Recommendations,
        verification_report: VerificationReport,
    ) -> Self {
        Self {
            disease: draft.disease,
            probability: draft.probability,
            confidence_tier: draft.confidence_tier,
            explanation: draft.explanation,
            recommendations,
            verification_report,
            verification_info: draft.verification_info,
        }
    }
}
