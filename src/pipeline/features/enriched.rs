//! AI-enriched feature mapping.
//!
//! Only symptom features are delegated to the service. Demographic, vital
//! and lab features are always computed locally so the service never sees
//! numeric patient values.

use serde_json::Value;

use super::rules::apply_structured;
use super::schema::DiseaseSchema;
use super::types::{
    ExtractedFeatureSet, FeatureAccumulator, ENRICHED_DEFAULT_CONFIDENCE, ENRICHED_MAX_CONFIDENCE,
    ENRICHED_MIN_CONFIDENCE,
};
use super::FeatureError;
use crate::llm::{extract_json_object, LlmClient, LlmError};
use crate::models::{value_as_f64, ExtractionMethod};
use crate::pipeline::merge::MergedInput;
use crate::pipeline::prompts::{feature_mapping_prompt, FEATURE_MAPPING_SYSTEM};

pub fn extract(
    llm: &dyn LlmClient,
    schema: &'static DiseaseSchema,
    input: &MergedInput,
    routing_defaulted: bool,
) -> Result<ExtractedFeatureSet, FeatureError> {
    let symptom_features = schema.symptom_features();
    let prompt = feature_mapping_prompt(schema.id, &symptom_features, &input.symptoms);

    let reply = llm.generate(&prompt, FEATURE_MAPPING_SYSTEM)?;
    let value = extract_json_object(&reply).map_err(|e| match e {
        LlmError::MalformedResponse(msg) => FeatureError::MalformedReply(msg),
        other => FeatureError::EnrichmentUnavailable(other),
    })?;

    let mapped = value
        .get("features")
        .and_then(Value::as_object)
        .ok_or_else(|| FeatureError::MalformedReply("missing \"features\" object".into()))?;

    let mut acc = FeatureAccumulator::new(schema);
    let mut accepted = 0usize;
    for (name, raw) in mapped {
        if !symptom_features.contains(&name.as_str()) {
            continue;
        }
        let flag = match raw {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            other => value_as_f64(other),
        };
        if let Some(flag) = flag {
            acc.set(name, flag.clamp(0.0, 1.0));
            accepted += 1;
        }
    }
    if accepted == 0 {
        return Err(FeatureError::MalformedReply(
            "no listed feature names in reply".into(),
        ));
    }

    apply_structured(&mut acc, input);

    let confidence = value
        .get("confidence")
        .and_then(value_as_f64)
        .unwrap_or(ENRICHED_DEFAULT_CONFIDENCE)
        .clamp(ENRICHED_MIN_CONFIDENCE, ENRICHED_MAX_CONFIDENCE);

    tracing::debug!(
        disease = schema.id,
        accepted,
        confidence,
        "Enriched feature mapping parsed"
    );

    Ok(acc.finish(confidence, ExtractionMethod::AiEnriched, routing_defaulted))
}
