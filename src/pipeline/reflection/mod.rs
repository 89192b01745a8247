//! Reflection: consistency and safety review of an assembled draft.
//!
//! Verification runs once per assessment. A critical verdict yields one
//! corrected draft; the correction itself is never re-verified.

pub mod enriched;
pub mod heuristic;

use std::convert::Infallible;

use serde::Serialize;

use crate::llm::{LlmClient, LlmError};
use crate::models::{
    AssessmentDraft, ExtractionMethod, VerificationInfo, VerificationReport, VerificationSeverity,
    MEDICAL_DISCLAIMER,
};
use crate::pipeline::confidence::tier;
use crate::pipeline::explain::conservative_explanation;
use crate::pipeline::stage::Stage;

/// More issues than this, on a safe draft, is a medium-severity report.
const MEDIUM_SEVERITY_ISSUES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    MissingDisclaimer,
    InvalidProbability,
    TierInconsistent,
    Tone,
    Treatment,
    Reviewer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub kind: FindingKind,
    /// A critical finding makes the whole draft unsafe.
    pub critical: bool,
    pub message: String,
}

impl Finding {
    pub fn new(kind: FindingKind, critical: bool, message: String) -> Self {
        Self {
            kind,
            critical,
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub is_safe: bool,
    pub findings: Vec<Finding>,
}

impl Verdict {
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        Self {
            is_safe: !findings.iter().any(|f| f.critical),
            findings,
        }
    }

    pub fn issues(&self) -> Vec<&str> {
        self.findings.iter().map(|f| f.message.as_str()).collect()
    }

    pub fn severity(&self) -> VerificationSeverity {
        if !self.is_safe {
            VerificationSeverity::Critical
        } else if self.findings.len() > MEDIUM_SEVERITY_ISSUES {
            VerificationSeverity::Medium
        } else {
            VerificationSeverity::Low
        }
    }
}

/// Report plus, for critical verdicts only, the corrected draft.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    pub report: VerificationReport,
    pub revised: Option<AssessmentDraft>,
}

impl VerificationOutcome {
    /// The draft to carry forward: the revision if there is one, else the original.
    pub fn resolve(self, original: AssessmentDraft) -> (AssessmentDraft, VerificationReport) {
        (self.revised.unwrap_or(original), self.report)
    }
}

pub struct Verifier<'a> {
    llm: Option<&'a dyn LlmClient>,
}

impl<'a> Verifier<'a> {
    pub fn new(llm: Option<&'a dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn heuristic_only() -> Self {
        Self { llm: None }
    }

    pub fn verify(&self, draft: &AssessmentDraft) -> VerificationOutcome {
        let reviewed = match self.llm {
            Some(llm) => enriched::check(llm, draft).map(|v| (v, ExtractionMethod::AiEnriched)),
            None => Err(LlmError::Disabled),
        };
        let (verdict, method) = reviewed.unwrap_or_else(|e| {
            if e != LlmError::Disabled {
                tracing::warn!(error = %e, "Enriched verification failed, using heuristics");
            }
            (heuristic::check(draft), ExtractionMethod::RuleBased)
        });

        let severity = verdict.severity();
        let revised = (severity == VerificationSeverity::Critical).then(|| correct(draft, &verdict));

        tracing::info!(
            severity = severity.as_str(),
            issues = verdict.findings.len(),
            corrected = revised.is_some(),
            method = method.as_str(),
            "Assessment verified"
        );

        VerificationOutcome {
            report: VerificationReport {
                issues: verdict.issues().into_iter().map(str::to_string).collect(),
                severity,
                corrected: revised.is_some(),
                method,
            },
            revised,
        }
    }
}

impl Stage<AssessmentDraft> for Verifier<'_> {
    type Output = VerificationOutcome;
    type Error = Infallible;

    fn name(&self) -> &'static str {
        "verify"
    }

    fn process(&self, input: &AssessmentDraft) -> Result<VerificationOutcome, Infallible> {
        Ok(self.verify(input))
    }
}

/// Single correction pass for a critical verdict.
fn correct(draft: &AssessmentDraft, verdict: &Verdict) -> AssessmentDraft {
    let mut revised = draft.clone();
    let mut replace_explanation = false;

    for finding in verdict.findings.iter().filter(|f| f.critical) {
        match finding.kind {
            FindingKind::InvalidProbability => {
                revised.probability = if revised.probability.is_finite() {
                    revised.probability.clamp(0.0, 1.0)
                } else {
                    0.0
                };
            }
            FindingKind::MissingDisclaimer => {
                revised.explanation.disclaimer = MEDICAL_DISCLAIMER.to_string();
            }
            // Re-derived below for every correction.
            FindingKind::TierInconsistent => {}
            FindingKind::Tone | FindingKind::Treatment | FindingKind::Reviewer => {
                replace_explanation = true;
            }
        }
    }

    if replace_explanation {
        revised.explanation = conservative_explanation(&revised.disease);
    }
    revised.confidence_tier = tier(revised.probability);
    revised.verification_info = Some(VerificationInfo {
        corrections_applied: verdict.issues().into_iter().map(str::to_string).collect(),
    });
    revised
}
