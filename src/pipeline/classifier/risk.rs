//! Disease-specific risk models.
//!
//! Each model reads the full feature vector of one disease schema, in schema
//! order, and returns a single probability. Its output is blended into the
//! generic distribution for the disease routing selected, weighted by how
//! many of the schema's required features were actually resolved.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::model::DiseaseModel;
use super::ClassifierError;
use crate::models::DiseaseRisk;
use crate::pipeline::features::schema::{schema_for, DiseaseSchema};
use crate::pipeline::features::ExtractedFeatureSet;

/// Largest share of the routed label's probability the disease-specific
/// model may take, reached when every required feature is resolved.
pub const DEFAULT_RISK_BLEND_WEIGHT: f64 = 0.4;

/// One linear term: `weight * (value - center) / scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskTerm {
    pub feature: &'static str,
    pub center: f64,
    pub scale: f64,
    pub weight: f64,
}

const fn flag(feature: &'static str, weight: f64) -> RiskTerm {
    RiskTerm {
        feature,
        center: 0.0,
        scale: 1.0,
        weight,
    }
}

const fn measure(feature: &'static str, center: f64, scale: f64, weight: f64) -> RiskTerm {
    RiskTerm {
        feature,
        center,
        scale,
        weight,
    }
}

#[derive(Debug)]
pub struct RiskModelSpec {
    pub disease: &'static str,
    pub bias: f64,
    pub terms: &'static [RiskTerm],
}

pub static BUILTIN_RISK_MODELS: &[RiskModelSpec] = &[
    RiskModelSpec {
        disease: "diabetes",
        bias: -1.5,
        terms: &[
            flag("increased_thirst", 1.0),
            flag("frequent_urination", 1.0),
            flag("fatigue", 0.5),
            flag("blurred_vision", 0.5),
            flag("weight_loss", 0.5),
            flag("slow_healing", 0.4),
            flag("gender_male", 0.1),
            measure("glucose", 100.0, 40.0, 1.2),
            measure("bmi", 25.0, 5.0, 0.6),
            measure("age", 45.0, 15.0, 0.4),
        ],
    },
    RiskModelSpec {
        disease: "heart_disease",
        bias: -2.0,
        terms: &[
            flag("chest_pain", 1.5),
            flag("shortness_of_breath", 0.8),
            flag("arm_pain", 0.8),
            flag("fainting", 0.6),
            flag("sweating", 0.5),
            flag("palpitations", 0.4),
            flag("dizziness", 0.2),
            flag("gender_male", 0.3),
            measure("age", 50.0, 15.0, 0.5),
            measure("systolic_bp", 120.0, 20.0, 0.4),
            measure("diastolic_bp", 80.0, 10.0, 0.2),
            measure("heart_rate", 75.0, 20.0, 0.3),
        ],
    },
    RiskModelSpec {
        disease: "hypertension",
        bias: -2.0,
        terms: &[
            flag("headache", 0.4),
            flag("nosebleed", 0.5),
            flag("dizziness", 0.3),
            flag("blurred_vision", 0.3),
            measure("systolic_bp", 120.0, 15.0, 1.0),
            measure("diastolic_bp", 80.0, 10.0, 0.6),
            measure("age", 45.0, 15.0, 0.4),
            measure("bmi", 25.0, 5.0, 0.3),
        ],
    },
    RiskModelSpec {
        disease: "respiratory_infection",
        bias: -1.5,
        terms: &[
            flag("fever", 1.0),
            flag("cough", 1.0),
            flag("sore_throat", 0.5),
            flag("chills", 0.4),
            flag("runny_nose", 0.4),
            flag("body_aches", 0.3),
            flag("shortness_of_breath", 0.3),
            measure("temperature", 37.0, 1.0, 0.8),
            measure("age", 40.0, 20.0, 0.1),
        ],
    },
    RiskModelSpec {
        disease: "migraine",
        bias: -1.5,
        terms: &[
            flag("headache", 1.2),
            flag("light_sensitivity", 1.0),
            flag("aura", 1.0),
            flag("nausea", 0.8),
            flag("vomiting", 0.4),
            flag("dizziness", 0.2),
            flag("gender_male", -0.3),
            measure("age", 35.0, 15.0, -0.2),
        ],
    },
];

/// Logistic model over one schema's feature vector.
///
/// A zero input contributes nothing: unresolved features arrive as 0 and
/// must not read as an extreme measurement.
#[derive(Debug, Clone)]
pub struct LogisticRiskModel {
    name: String,
    labels: Vec<String>,
    bias: f64,
    /// One `(center, scale, weight)` per schema feature, in schema order.
    coefficients: Vec<(f64, f64, f64)>,
}

impl LogisticRiskModel {
    pub fn from_spec(spec: &RiskModelSpec, schema: &DiseaseSchema) -> Result<Self, ClassifierError> {
        if let Some(term) = spec
            .terms
            .iter()
            .find(|t| !schema.all_features().any(|f| f == t.feature))
        {
            return Err(ClassifierError::Shape(format!(
                "risk term {} is not a {} feature",
                term.feature, schema.id
            )));
        }
        if let Some(term) = spec.terms.iter().find(|t| t.scale <= 0.0) {
            return Err(ClassifierError::Shape(format!("risk term {} has no scale", term.feature)));
        }

        let coefficients = schema
            .all_features()
            .map(|feature| {
                spec.terms
                    .iter()
                    .find(|t| t.feature == feature)
                    .map(|t| (t.center, t.scale, t.weight))
                    .unwrap_or((0.0, 1.0, 0.0))
            })
            .collect();

        Ok(Self {
            name: format!("{}-risk", spec.disease),
            labels: vec![spec.disease.to_string()],
            bias: spec.bias,
            coefficients,
        })
    }
}

impl DiseaseModel for LogisticRiskModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn input_len(&self) -> usize {
        self.coefficients.len()
    }

    fn forward(&self, input: &[f64]) -> Result<Vec<f64>, ClassifierError> {
        if input.len() != self.coefficients.len() {
            return Err(ClassifierError::InputLength {
                expected: self.coefficients.len(),
                actual: input.len(),
            });
        }
        let z = input
            .iter()
            .zip(&self.coefficients)
            .filter(|(x, _)| **x != 0.0)
            .map(|(x, (center, scale, weight))| weight * (x - center) / scale)
            .sum::<f64>()
            + self.bias;
        Ok(vec![1.0 / (1.0 + (-z).exp())])
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Disease-specific models keyed by schema id.
#[derive(Clone, Default)]
pub struct RiskModels {
    models: BTreeMap<String, Arc<dyn DiseaseModel>>,
}

impl RiskModels {
    /// No disease-specific scoring; the generic distribution is used as is.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Result<Self, ClassifierError> {
        let mut models = Self::empty();
        for spec in BUILTIN_RISK_MODELS {
            let schema = schema_for(spec.disease)
                .ok_or_else(|| ClassifierError::Shape(format!("no schema for {}", spec.disease)))?;
            models.insert(schema, Arc::new(LogisticRiskModel::from_spec(spec, schema)?))?;
        }
        Ok(models)
    }

    /// Register a model for `schema`; its input must cover the whole schema.
    pub fn insert(
        &mut self,
        schema: &DiseaseSchema,
        model: Arc<dyn DiseaseModel>,
    ) -> Result<(), ClassifierError> {
        let expected = schema.all_features().count();
        if model.input_len() != expected {
            return Err(ClassifierError::InputLength {
                expected,
                actual: model.input_len(),
            });
        }
        self.models.insert(schema.id.to_string(), model);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Score the routed schema. `max_weight` is the blend weight at full
    /// coverage. `None` when no model covers the schema or its output is
    /// unusable.
    pub fn score(&self, features: &ExtractedFeatureSet, max_weight: f64) -> Option<DiseaseRisk> {
        let model = self.models.get(&features.disease)?;
        let schema = schema_for(&features.disease)?;

        let probability = match model.forward(&features.to_vector(schema)) {
            Ok(out) if out.len() == 1 && (0.0..=1.0).contains(&out[0]) => out[0],
            Ok(out) => {
                tracing::warn!(model = model.name(), outputs = out.len(), "Risk model output unusable");
                return None;
            }
            Err(e) => {
                tracing::warn!(model = model.name(), error = %e, "Risk model failed");
                return None;
            }
        };

        let required = schema.required_features.len().max(1);
        let resolved = required.saturating_sub(features.missing_features.len());
        let coverage = resolved as f64 / required as f64;

        Some(DiseaseRisk {
            disease: features.disease.clone(),
            probability,
            coverage,
            blend_weight: max_weight.clamp(0.0, 1.0) * coverage,
        })
    }
}

/// Move the routed label's probability towards the disease-specific score,
/// rescaling every other label so the distribution still sums to 1.
///
/// Returns false, leaving `probabilities` untouched, when the label is not
/// in the distribution or nothing else carries mass.
pub fn blend(labels: &[String], probabilities: &mut [f64], risk: &DiseaseRisk) -> bool {
    let Some(index) = labels.iter().position(|l| *l == risk.disease) else {
        return false;
    };
    let current = probabilities[index];
    let rest = 1.0 - current;
    if rest <= f64::EPSILON || risk.blend_weight <= 0.0 {
        return false;
    }

    let blended = (1.0 - risk.blend_weight) * current + risk.blend_weight * risk.probability;
    let factor = (1.0 - blended) / rest;
    for (i, p) in probabilities.iter_mut().enumerate() {
        *p = if i == index { blended } else { *p * factor };
    }
    true
}
