use std::sync::LazyLock;

use regex::Regex;

use super::{Finding, FindingKind, Verdict};
use crate::models::AssessmentDraft;
use crate::pipeline::confidence::tier;

struct TonePattern {
    regex: Regex,
    kind: FindingKind,
    description: &'static str,
}

fn tone(re: &str, kind: FindingKind, description: &'static str) -> TonePattern {
    TonePattern {
        regex: Regex::new(re).expect("tone regex is valid"),
        kind,
        description,
    }
}

static TONE_PATTERNS: LazyLock<Vec<TonePattern>> = LazyLock::new(|| {
    vec![
        tone(r"(?i)\byou\s+(?:definitely|certainly)\s+have\b", FindingKind::Tone, "States a diagnosis as certain"),
        tone(r"(?i)\b(?:fatal|deadly|life[- ]threatening|you\s+will\s+die)\b", FindingKind::Tone, "Alarmist wording"),
        tone(
            r"(?i)\b(?:nothing\s+to\s+worry\s+about|no\s+need\s+to\s+see\s+a\s+doctor|just\s+ignore)\b",
            FindingKind::Tone,
            "Dismissive wording",
        ),
        tone(
            r"(?i)\b(?:take|start|increase)\s+\d+\s*(?:mg|ml|mcg|units?)\b",
            FindingKind::Treatment,
            "Suggests a specific dose",
        ),
        tone(r"(?i)\bprescri(?:be|bed|ption)\b", FindingKind::Treatment, "Mentions prescribing"),
    ]
});

/// Deterministic checks over a draft.
///
/// Missing disclaimer, an impossible probability and a tier that disagrees
/// with the probability make the draft unsafe. Tone and treatment wording are
/// reported without affecting safety.
pub fn check(draft: &AssessmentDraft) -> Verdict {
    let mut findings = invariant_findings(draft);

    let text = format!(
        "{} {}",
        draft.explanation.summary,
        draft.explanation.key_factors.join(" ")
    );
    for pattern in TONE_PATTERNS.iter() {
        if pattern.regex.is_match(&text) {
            findings.push(Finding::new(pattern.kind, false, pattern.description.to_string()));
        }
    }

    Verdict::from_findings(findings)
}

/// The checks every strategy must apply, whatever else it reports.
pub fn invariant_findings(draft: &AssessmentDraft) -> Vec<Finding> {
    let mut findings = Vec::new();

    if !draft.explanation.has_disclaimer() {
        findings.push(Finding::new(
            FindingKind::MissingDisclaimer,
            true,
            "Explanation is missing the medical disclaimer".into(),
        ));
    }

    if !(0.0..=1.0).contains(&draft.probability) {
        findings.push(Finding::new(
            FindingKind::InvalidProbability,
            true,
            format!("Probability {} is outside [0, 1]", draft.probability),
        ));
    } else {
        let expected = tier(draft.probability);
        if expected != draft.confidence_tier {
            findings.push(Finding::new(
                FindingKind::TierInconsistent,
                true,
                format!(
                    "Confidence {} is inconsistent with probability {:.2} (expected {})",
                    draft.confidence_tier, draft.probability, expected
                ),
            ));
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceTier, Explanation, ExtractionMethod, MEDICAL_DISCLAIMER};

    fn draft(probability: f64, summary: &str) -> AssessmentDraft {
        AssessmentDraft::new(
            "diabetes",
            probability,
            Explanation {
                summary: summary.into(),
                key_factors: vec![],
                disclaimer: MEDICAL_DISCLAIMER.into(),
                generated_by: ExtractionMethod::RuleBased,
            },
        )
    }

    #[test]
    fn consistent_draft_is_safe() {
        let verdict = check(&draft(0.82, "Your symptoms are associated with diabetes."));
        assert!(verdict.is_safe);
        assert!(verdict.findings.is_empty());
    }

    #[test]
    fn high_probability_with_low_tier_is_unsafe() {
        let mut d = draft(0.82, "ok");
        d.confidence_tier = ConfidenceTier::Low;
        let verdict = check(&d);
        assert!(!verdict.is_safe);
        assert_eq!(verdict.findings[0].kind, FindingKind::TierInconsistent);
        assert!(verdict.issues()[0].contains("expected HIGH"));
    }

    #[test]
    fn any_threshold_contradiction_is_flagged() {
        let mut d = draft(0.6, "ok");
        d.confidence_tier = ConfidenceTier::High;
        assert!(!check(&d).is_safe);
    }

    #[test]
    fn missing_disclaimer_is_unsafe() {
        let mut d = draft(0.6, "ok");
        d.explanation.disclaimer.clear();
        let verdict = check(&d);
        assert!(!verdict.is_safe);
        assert_eq!(verdict.findings[0].kind, FindingKind::MissingDisclaimer);
    }

    #[test]
    fn disclaimer_inside_summary_counts() {
        let mut d = draft(0.6, "This is not a medical diagnosis.");
        d.explanation.disclaimer.clear();
        assert!(check(&d).is_safe);
    }

    #[test]
    fn out_of_range_probability_is_unsafe() {
        let verdict = check(&draft(1.4, "ok"));
        assert!(!verdict.is_safe);
        assert_eq!(verdict.findings[0].kind, FindingKind::InvalidProbability);
    }

    #[test]
    fn tone_issues_do_not_make_unsafe() {
        let verdict = check(&draft(
            0.8,
            "You definitely have diabetes. It can be fatal. Take 500 mg of metformin.",
        ));
        assert!(verdict.is_safe);
        assert_eq!(verdict.findings.len(), 3);
    }

    #[test]
    fn dismissive_wording_flagged() {
        let verdict = check(&draft(0.3, "There is nothing to worry about."));
        assert_eq!(verdict.issues(), vec!["Dismissive wording"]);
    }
}
