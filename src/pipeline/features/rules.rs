//! Deterministic feature mapping: a fixed keyword table for symptom text
//! plus direct reads of demographics, vitals and labs.

use super::schema::DiseaseSchema;
use super::types::{ExtractedFeatureSet, FeatureAccumulator, RULE_BASED_CONFIDENCE};
use crate::models::{ExtractionMethod, Gender, NaturalKey};
use crate::pipeline::merge::MergedInput;

/// Temperature (°C) at or above which `fever` is set regardless of wording.
pub const FEVER_THRESHOLD_C: f64 = 38.0;

/// Keyword fragment -> feature name. Fragments are matched as substrings of
/// the lower-cased symptom text.
const SYMPTOM_KEYWORDS: &[(&str, &str)] = &[
    // Metabolic
    ("thirst", "increased_thirst"),
    ("polydipsia", "increased_thirst"),
    ("urinat", "frequent_urination"),
    ("polyuria", "frequent_urination"),
    ("fatigue", "fatigue"),
    ("tired", "fatigue"),
    ("exhaust", "fatigue"),
    ("blurred vision", "blurred_vision"),
    ("blurry vision", "blurred_vision"),
    ("weight loss", "weight_loss"),
    ("losing weight", "weight_loss"),
    ("slow healing", "slow_healing"),
    ("wounds heal slowly", "slow_healing"),
    // Cardiovascular
    ("chest pain", "chest_pain"),
    ("chest tightness", "chest_pain"),
    ("chest pressure", "chest_pain"),
    ("shortness of breath", "shortness_of_breath"),
    ("breathless", "shortness_of_breath"),
    ("palpitation", "palpitations"),
    ("racing heart", "palpitations"),
    ("dizz", "dizziness"),
    ("lightheaded", "dizziness"),
    ("arm pain", "arm_pain"),
    ("sweat", "sweating"),
    ("faint", "fainting"),
    ("passed out", "fainting"),
    ("nosebleed", "nosebleed"),
    // Respiratory
    ("cough", "cough"),
    ("fever", "fever"),
    ("sore throat", "sore_throat"),
    ("runny nose", "runny_nose"),
    ("chills", "chills"),
    ("body ache", "body_aches"),
    ("muscle ache", "body_aches"),
    // Neurological
    ("headache", "headache"),
    ("migraine", "headache"),
    ("nausea", "nausea"),
    ("vomit", "vomiting"),
    ("light sensitivity", "light_sensitivity"),
    ("sensitivity to light", "light_sensitivity"),
    ("photophobia", "light_sensitivity"),
    ("aura", "aura"),
];

/// Every feature name the keyword table can produce for `text`, in table order.
pub fn keyword_features(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    let mut found: Vec<&'static str> = Vec::new();
    for (keyword, feature) in SYMPTOM_KEYWORDS {
        if lower.contains(keyword) && !found.contains(feature) {
            found.push(feature);
        }
    }
    found
}

/// Map input onto `schema` with the keyword table. Never fails.
pub fn extract(
    schema: &'static DiseaseSchema,
    input: &MergedInput,
    routing_defaulted: bool,
) -> ExtractedFeatureSet {
    let mut acc = FeatureAccumulator::new(schema);

    for feature in keyword_features(&input.symptom_text()) {
        acc.set(feature, 1.0);
    }
    apply_structured(&mut acc, input);

    acc.finish(RULE_BASED_CONFIDENCE, ExtractionMethod::RuleBased, routing_defaulted)
}

/// Features read directly from demographics, vitals and labs. Both
/// strategies use this; the enrichment service never sees these values.
pub(crate) fn apply_structured(acc: &mut FeatureAccumulator, input: &MergedInput) {
    let vitals = &input.additional_info.vitals;

    acc.set("age", f64::from(input.age));
    acc.set(
        "gender_male",
        if input.gender == Gender::Male { 1.0 } else { 0.0 },
    );

    let lab_glucose = input
        .additional_info
        .lab_results
        .iter()
        .find(|lab| lab.natural_key().contains("glucose"))
        .and_then(|lab| lab.value);
    if let Some(glucose) = vitals.glucose.or(lab_glucose) {
        acc.set("glucose", glucose);
    }

    if let Some(bmi) = vitals.bmi() {
        acc.set("bmi", bmi);
    }
    if let Some((systolic, diastolic)) = vitals.blood_pressure_parts() {
        acc.set("systolic_bp", systolic);
        acc.set("diastolic_bp", diastolic);
    }
    if let Some(heart_rate) = vitals.heart_rate {
        acc.set("heart_rate", heart_rate);
    }
    if let Some(temperature) = vitals.temperature {
        acc.set("temperature", temperature);
        if temperature >= FEVER_THRESHOLD_C {
            acc.set("fever", 1.0);
        }
    }
}
