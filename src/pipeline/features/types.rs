use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::schema::DiseaseSchema;
use crate::models::ExtractionMethod;

/// Fixed confidence of the deterministic keyword path.
pub const RULE_BASED_CONFIDENCE: f64 = 0.6;
/// Bounds applied to the confidence the enrichment service reports.
pub const ENRICHED_MIN_CONFIDENCE: f64 = 0.7;
pub const ENRICHED_MAX_CONFIDENCE: f64 = 0.95;
/// Used when the enrichment reply omits a confidence.
pub const ENRICHED_DEFAULT_CONFIDENCE: f64 = 0.75;

/// Complete feature map for one disease schema.
///
/// `features` always holds every feature the schema declares; unresolved
/// ones are 0 and, when required, listed in `missing_features`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFeatureSet {
    pub disease: String,
    pub routing_defaulted: bool,
    pub features: BTreeMap<String, f64>,
    pub confidence: f64,
    pub missing_features: Vec<String>,
    pub method: ExtractionMethod,
    /// Symptom-derived features with a positive value.
    pub recognized_symptoms: usize,
}

impl ExtractedFeatureSet {
    /// Feature values in schema order, for a disease-specific model.
    pub fn to_vector(&self, schema: &DiseaseSchema) -> Vec<f64> {
        schema
            .all_features()
            .map(|f| self.features.get(f).copied().unwrap_or(0.0))
            .collect()
    }
}

/// Builder shared by both strategies: records which features were resolved
/// and fills the rest with 0.
#[derive(Debug)]
pub(crate) struct FeatureAccumulator {
    schema: &'static DiseaseSchema,
    resolved: BTreeMap<String, f64>,
}

impl FeatureAccumulator {
    pub(crate) fn new(schema: &'static DiseaseSchema) -> Self {
        Self {
            schema,
            resolved: BTreeMap::new(),
        }
    }

    /// Record a value for a schema feature; names outside the schema are ignored.
    pub(crate) fn set(&mut self, feature: &str, value: f64) {
        if value.is_finite() && self.schema.all_features().any(|f| f == feature) {
            self.resolved.insert(feature.to_string(), value);
        }
    }

    pub(crate) fn is_resolved(&self, feature: &str) -> bool {
        self.resolved.contains_key(feature)
    }

    /// Number of symptom-derived features set to a positive value.
    pub(crate) fn positive_symptom_count(&self) -> usize {
        self.schema
            .symptom_features()
            .iter()
            .filter(|f| self.resolved.get(**f).is_some_and(|v| *v > 0.0))
            .count()
    }

    pub(crate) fn finish(
        self,
        confidence: f64,
        method: ExtractionMethod,
        routing_defaulted: bool,
    ) -> ExtractedFeatureSet {
        let missing_features = self
            .schema
            .required_features
            .iter()
            .filter(|f| !self.resolved.contains_key(**f))
            .map(|f| f.to_string())
            .collect();

        let recognized_symptoms = self.positive_symptom_count();
        let features = self
            .schema
            .all_features()
            .map(|f| (f.to_string(), self.resolved.get(f).copied().unwrap_or(0.0)))
            .collect();

        ExtractedFeatureSet {
            disease: self.schema.id.to_string(),
            routing_defaulted,
            features,
            confidence,
            missing_features,
            method,
            recognized_symptoms,
        }
    }
}
