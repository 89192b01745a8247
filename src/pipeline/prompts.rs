//! Prompt registry for the three enrichment calls: feature mapping,
//! explanation and safety review.
//!
//! Patient text is always wrapped in tags and escaped so it cannot close the
//! wrapper and address the model directly.

use crate::models::AssessmentDraft;

// ═══════════════════════════════════════════════════════════
// System prompts
// ═══════════════════════════════════════════════════════════

pub const FEATURE_MAPPING_SYSTEM: &str = "\
You are a clinical feature mapper. Map the patient's reported symptoms onto \
the listed feature names. Use ONLY the listed names. Set a feature to 1 when \
the symptoms clearly state it and 0 when they do not mention it. NEVER infer \
diagnoses. Reply with JSON only: \
{\"features\": {\"<name>\": 0 or 1}, \"confidence\": <0.0-1.0>}";

pub const EXPLANATION_SYSTEM: &str = "\
You are a patient-education assistant writing a plain-language explanation \
of a risk assessment. Be calm and factual. Do not suggest treatments or \
medications. Do not state a diagnosis. Reply with JSON only: \
{\"summary\": \"<2-4 sentences>\", \"key_factors\": [\"<short phrase>\"]}";

pub const SAFETY_REVIEW_SYSTEM: &str = "\
You are a medical safety reviewer. Check the assessment for contradictions \
between probability and confidence, a missing medical disclaimer, invented \
treatments or medications, and alarmist or dismissive tone. Reply with JSON \
only: {\"is_safe\": true or false, \"issues\": [\"<issue>\"]}";

// ═══════════════════════════════════════════════════════════
// User prompts
// ═══════════════════════════════════════════════════════════

pub fn feature_mapping_prompt(disease: &str, feature_names: &[&str], symptoms: &[String]) -> String {
    format!(
        "Target condition: {disease}\nFeature names: {}\n\n<symptoms>\n{}\n</symptoms>",
        feature_names.join(", "),
        escape_tags(&symptoms.join("\n")),
    )
}

pub fn explanation_prompt(
    disease: &str,
    probability: f64,
    tier: &str,
    matched_symptoms: &[String],
) -> String {
    format!(
        "Condition: {disease}\nEstimated probability: {:.0}%\nConfidence: {tier}\n\n\
         <matched_symptoms>\n{}\n</matched_symptoms>",
        probability * 100.0,
        escape_tags(&matched_symptoms.join("\n")),
    )
}

pub fn safety_review_prompt(draft: &AssessmentDraft) -> String {
    format!(
        "Condition: {}\nProbability: {:.2}\nConfidence tier: {}\n\n\
         <explanation>\n{}\n</explanation>\n<disclaimer>\n{}\n</disclaimer>",
        draft.disease,
        draft.probability,
        draft.confidence_tier,
        escape_tags(&draft.explanation.summary),
        escape_tags(&draft.explanation.disclaimer),
    )
}

/// Neutralize angle brackets so user text cannot open or close prompt tags.
pub fn escape_tags(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}
