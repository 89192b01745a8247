use serde::Deserialize;

use super::heuristic::invariant_findings;
use super::{Finding, FindingKind, Verdict};
use crate::llm::{parse_reply, LlmClient, LlmError};
use crate::models::AssessmentDraft;
use crate::pipeline::prompts::{safety_review_prompt, SAFETY_REVIEW_SYSTEM};

const MAX_REVIEWER_ISSUES: usize = 8;

#[derive(Deserialize)]
struct ReviewReply {
    is_safe: bool,
    #[serde(default)]
    issues: Vec<String>,
}

/// Ask the service for a safety verdict.
///
/// The deterministic invariant checks are always added, so a reviewer that
/// misses a tier contradiction cannot mark the draft safe.
pub fn check(llm: &dyn LlmClient, draft: &AssessmentDraft) -> Result<Verdict, LlmError> {
    let reply: ReviewReply = parse_reply(&llm.generate(&safety_review_prompt(draft), SAFETY_REVIEW_SYSTEM)?)?;

    let mut findings = invariant_findings(draft);
    let reviewer_issues: Vec<String> = reply
        .issues
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .take(MAX_REVIEWER_ISSUES)
        .collect();

    if !reply.is_safe && reviewer_issues.is_empty() {
        findings.push(Finding::new(
            FindingKind::Reviewer,
            true,
            "Reviewer marked the assessment unsafe".into(),
        ));
    }
    for issue in reviewer_issues {
        findings.push(Finding::new(FindingKind::Reviewer, !reply.is_safe, issue));
    }

    Ok(Verdict::from_findings(findings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::models::{ConfidenceTier, Explanation, ExtractionMethod, MEDICAL_DISCLAIMER};

    fn draft() -> AssessmentDraft {
        AssessmentDraft::new(
            "diabetes",
            0.8,
            Explanation {
                summary: "Symptoms associated with diabetes.".into(),
                key_factors: vec![],
                disclaimer: MEDICAL_DISCLAIMER.into(),
                generated_by: ExtractionMethod::AiEnriched,
            },
        )
    }

    #[test]
    fn safe_verdict_with_minor_issues() {
        let llm = MockLlmClient::new(r#"{"is_safe": true, "issues": ["slightly technical wording"]}"#);
        let verdict = check(&llm, &draft()).unwrap();
        assert!(verdict.is_safe);
        assert_eq!(verdict.issues(), vec!["slightly technical wording"]);
    }

    #[test]
    fn unsafe_verdict_is_critical_finding() {
        let llm = MockLlmClient::new(r#"{"is_safe": false, "issues": ["recommends insulin dosing"]}"#);
        let verdict = check(&llm, &draft()).unwrap();
        assert!(!verdict.is_safe);
        assert_eq!(verdict.findings[0].kind, FindingKind::Reviewer);
    }

    #[test]
    fn unsafe_without_issues_still_recorded() {
        let llm = MockLlmClient::new(r#"{"is_safe": false}"#);
        let verdict = check(&llm, &draft()).unwrap();
        assert!(!verdict.is_safe);
        assert_eq!(verdict.issues().len(), 1);
    }

    #[test]
    fn reviewer_cannot_overrule_invariants() {
        let llm = MockLlmClient::new(r#"{"is_safe": true, "issues": []}"#);
        let mut d = draft();
        d.confidence_tier = ConfidenceTier::Low;
        let verdict = check(&llm, &d).unwrap();
        assert!(!verdict.is_safe);
        assert_eq!(verdict.findings[0].kind, FindingKind::TierInconsistent);
    }

    #[test]
    fn unparseable_reply_is_error() {
        let llm = MockLlmClient::new("Looks fine to me!");
        assert!(matches!(check(&llm, &draft()), Err(LlmError::MalformedResponse(_))));
    }
}
