use super::routing::{route, RoutingDecision};
use super::schema::schema_for;
use super::types::ExtractedFeatureSet;
use super::{enriched, rules, FeatureError};
use crate::llm::{LlmClient, LlmError};
use crate::pipeline::merge::MergedInput;
use crate::pipeline::stage::Stage;

/// Routes merged input to a disease schema and maps it onto that schema.
///
/// With a client configured the enriched path runs first; any failure there
/// falls back to the keyword rules, which always produce a complete set.
pub struct FeatureExtractor<'a> {
    llm: Option<&'a dyn LlmClient>,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(llm: Option<&'a dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn rules_only() -> Self {
        Self { llm: None }
    }

    /// Extract against an explicitly chosen disease, bypassing routing.
    pub fn extract_for(
        &self,
        disease: &str,
        input: &MergedInput,
    ) -> Result<ExtractedFeatureSet, FeatureError> {
        let decision = RoutingDecision {
            disease: schema_for(disease)
                .ok_or_else(|| FeatureError::UnknownDisease(disease.to_string()))?
                .id,
            score: 0,
            defaulted: false,
        };
        self.extract_routed(&decision, input)
    }

    fn extract_routed(
        &self,
        decision: &RoutingDecision,
        input: &MergedInput,
    ) -> Result<ExtractedFeatureSet, FeatureError> {
        let schema = schema_for(decision.disease)
            .ok_or_else(|| FeatureError::UnknownDisease(decision.disease.to_string()))?;

        let enriched = match self.llm {
            Some(llm) => enriched::extract(llm, schema, input, decision.defaulted),
            None => Err(FeatureError::EnrichmentUnavailable(LlmError::Disabled)),
        };

        enriched.or_else(|e| {
            match &e {
                FeatureError::EnrichmentUnavailable(LlmError::Disabled) => {
                    tracing::debug!(disease = schema.id, "Enrichment disabled, using keyword rules");
                }
                _ => tracing::warn!(
                    disease = schema.id,
                    error = %e,
                    "Enriched feature mapping failed, falling back to keyword rules"
                ),
            }
            Ok(rules::extract(schema, input, decision.defaulted))
        })
    }
}

impl Stage<MergedInput> for FeatureExtractor<'_> {
    type Output = ExtractedFeatureSet;
    type Error = FeatureError;

    fn name(&self) -> &'static str {
        "extract"
    }

    fn process(&self, input: &MergedInput) -> Result<ExtractedFeatureSet, FeatureError> {
        let decision = route(&input.symptoms);
        tracing::info!(
            disease = decision.disease,
            score = decision.score,
            defaulted = decision.defaulted,
            "Disease schema routed"
        );
        self.extract_routed(&decision, input)
    }
}
