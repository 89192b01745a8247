//! Plain-language explanation of an assessment.
//!
//! The enriched path asks the text-generation service; the template path
//! is always available. Both attach the standard medical disclaimer.

use serde::Deserialize;

use crate::llm::{parse_reply, LlmClient, LlmError};
use crate::models::{ConfidenceTier, Explanation, ExtractionMethod, MEDICAL_DISCLAIMER};
use crate::pipeline::features::schema_for;
use crate::pipeline::prompts::{explanation_prompt, EXPLANATION_SYSTEM};

const MAX_KEY_FACTORS: usize = 6;

/// What the explanation is about.
#[derive(Debug, Clone, Copy)]
pub struct ExplanationContext<'a> {
    pub disease: &'a str,
    pub probability: f64,
    pub tier: ConfidenceTier,
    pub matched_symptoms: &'a [String],
    pub missing_features: &'a [String],
    /// The prediction fell back to a placeholder or a sub-threshold candidate.
    pub low_trust: bool,
}

#[derive(Deserialize)]
struct ExplanationReply {
    summary: String,
    #[serde(default)]
    key_factors: Vec<String>,
}

/// Enriched explanation when a client is given, template otherwise or on failure.
pub fn explain(llm: Option<&dyn LlmClient>, ctx: &ExplanationContext<'_>) -> Explanation {
    let enriched = match llm {
        Some(llm) => explain_enriched(llm, ctx),
        None => Err(LlmError::Disabled),
    };
    enriched.unwrap_or_else(|e| {
        if e != LlmError::Disabled {
            tracing::warn!(error = %e, "Enriched explanation failed, using template");
        }
        explain_template(ctx)
    })
}

pub fn explain_enriched(
    llm: &dyn LlmClient,
    ctx: &ExplanationContext<'_>,
) -> Result<Explanation, LlmError> {
    let prompt = explanation_prompt(
        display_name(ctx.disease),
        ctx.probability,
        ctx.tier.as_str(),
        ctx.matched_symptoms,
    );
    let reply: ExplanationReply = parse_reply(&llm.generate(&prompt, EXPLANATION_SYSTEM)?)?;

    let summary = reply.summary.trim().to_string();
    if summary.is_empty() {
        return Err(LlmError::MalformedResponse("empty summary".into()));
    }

    Ok(Explanation {
        summary,
        key_factors: reply
            .key_factors
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .take(MAX_KEY_FACTORS)
            .collect(),
        disclaimer: MEDICAL_DISCLAIMER.to_string(),
        generated_by: ExtractionMethod::AiEnriched,
    })
}

pub fn explain_template(ctx: &ExplanationContext<'_>) -> Explanation {
    let name = display_name(ctx.disease);

    let summary = if ctx.low_trust {
        format!(
            "The reported symptoms could not be linked to a specific condition with \
             confidence. The closest match, {name}, should be treated as a weak signal \
             only."
        )
    } else {
        let basis = if ctx.matched_symptoms.is_empty() {
            "the information provided".to_string()
        } else {
            ctx.matched_symptoms.join(", ")
        };
        format!(
            "Based on {basis}, the assessment estimates a {:.0}% likelihood of {name}. \
             Confidence in this estimate is {}.",
            ctx.probability * 100.0,
            tier_phrase(ctx.tier),
        )
    };

    let mut key_factors: Vec<String> = ctx
        .matched_symptoms
        .iter()
        .take(MAX_KEY_FACTORS - 1)
        .map(|s| format!("Reported symptom: {s}"))
        .collect();
    if !ctx.missing_features.is_empty() {
        key_factors.push(format!(
            "Not provided: {}",
            ctx.missing_features.join(", ").replace('_', " ")
        ));
    }

    Explanation {
        summary,
        key_factors,
        disclaimer: MEDICAL_DISCLAIMER.to_string(),
        generated_by: ExtractionMethod::RuleBased,
    }
}

/// Minimal explanation used when a draft's explanation had to be replaced.
pub fn conservative_explanation(disease: &str) -> Explanation {
    Explanation {
        summary: format!(
            "Some of your symptoms are associated with {}. This result is uncertain \
             and should be reviewed with a healthcare professional.",
            display_name(disease)
        ),
        key_factors: vec![],
        disclaimer: MEDICAL_DISCLAIMER.to_string(),
        generated_by: ExtractionMethod::RuleBased,
    }
}

pub fn display_name(disease: &str) -> &str {
    schema_for(disease).map_or(disease, |s| s.display_name)
}

fn tier_phrase(tier: ConfidenceTier) -> &'static str {
    match tier {
        ConfidenceTier::Low => "low",
        ConfidenceTier::Medium => "moderate",
        ConfidenceTier::High => "high",
    }
}
