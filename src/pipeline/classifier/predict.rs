use std::convert::Infallible;

use super::model::softmax_in_place;
use super::resources::ModelResources;
use super::risk::blend;
use super::ClassifierError;
use crate::models::{DiseaseCandidate, DiseaseRisk, PredictionSet};
use crate::pipeline::matcher::SymptomEncoding;
use crate::pipeline::stage::Stage;

/// Label used when the model cannot produce a distribution.
pub const UNDETERMINED: &str = "undetermined";

pub const VERY_LOW_CONFIDENCE_WARNING: &str = "No condition reached the minimum probability; \
     the single most likely condition is shown with very low confidence.";

pub const DEGRADED_WARNING: &str =
    "The risk model could not evaluate these symptoms; no condition could be ranked.";

/// Ranks model output into a `PredictionSet`.
///
/// Model failures never surface as errors: they degrade to a single
/// zero-probability placeholder flagged `degraded`. A disease-specific risk,
/// when given, is blended into the distribution before ranking.
pub struct Classifier<'a> {
    resources: &'a ModelResources,
    min_probability: f64,
    top_k: usize,
    risk: Option<DiseaseRisk>,
}

impl<'a> Classifier<'a> {
    pub fn new(resources: &'a ModelResources, min_probability: f64, top_k: usize) -> Self {
        Self {
            resources,
            min_probability,
            top_k: top_k.max(1),
            risk: None,
        }
    }

    pub fn with_risk(mut self, risk: Option<DiseaseRisk>) -> Self {
        self.risk = risk;
        self
    }

    pub fn predict(&self, encoding: &SymptomEncoding) -> PredictionSet {
        let model = &self.resources.model;
        let labels = model.labels();

        let probabilities = model
            .forward(encoding.vector.as_slice())
            .and_then(|raw| {
                if raw.len() != labels.len() {
                    return Err(ClassifierError::Output(format!(
                        "{} scores for {} labels",
                        raw.len(),
                        labels.len()
                    )));
                }
                normalize(raw)
            });

        let mut probabilities = match probabilities {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(model = model.name(), error = %e, "Prediction degraded");
                return degraded(encoding);
            }
        };

        let disease_risk = self.risk.clone().map(|mut risk| {
            if !blend(labels, &mut probabilities, &risk) {
                risk.blend_weight = 0.0;
            }
            risk
        });

        let mut ranked: Vec<(&str, f64)> = labels
            .iter()
            .map(String::as_str)
            .zip(probabilities)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut warning = None;
        let mut candidates: Vec<DiseaseCandidate> = ranked
            .iter()
            .filter(|(_, p)| *p > self.min_probability)
            .take(self.top_k)
            .enumerate()
            .map(|(i, (label, p))| candidate(label, *p, i + 1, false))
            .collect();

        if candidates.is_empty() {
            let (label, p) = ranked[0];
            candidates.push(candidate(label, p, 1, true));
            warning = Some(VERY_LOW_CONFIDENCE_WARNING.to_string());
        }
        candidates[0].matched_symptoms = encoding.matched_terms.clone();

        tracing::debug!(
            top = %candidates[0].disease,
            probability = candidates[0].probability,
            candidates = candidates.len(),
            "Prediction ranked"
        );

        PredictionSet {
            candidates,
            warning,
            degraded: false,
            disease_risk,
        }
    }
}

impl Stage<SymptomEncoding> for Classifier<'_> {
    type Output = PredictionSet;
    type Error = Infallible;

    fn name(&self) -> &'static str {
        "predict"
    }

    fn process(&self, input: &SymptomEncoding) -> Result<PredictionSet, Infallible> {
        Ok(self.predict(input))
    }
}

fn candidate(label: &str, probability: f64, rank: usize, very_low_confidence: bool) -> DiseaseCandidate {
    DiseaseCandidate {
        disease: label.to_string(),
        probability,
        rank,
        very_low_confidence,
        matched_symptoms: vec![],
    }
}

fn degraded(encoding: &SymptomEncoding) -> PredictionSet {
    let mut placeholder = candidate(UNDETERMINED, 0.0, 1, true);
    placeholder.matched_symptoms = encoding.matched_terms.clone();
    PredictionSet {
        candidates: vec![placeholder],
        warning: Some(DEGRADED_WARNING.to_string()),
        degraded: true,
        disease_risk: None,
    }
}

/// Turn model output into a distribution summing to 1.
///
/// Non-negative output is rescaled; anything with negative values (logits)
/// goes through softmax.
fn normalize(mut raw: Vec<f64>) -> Result<Vec<f64>, ClassifierError> {
    if raw.is_empty() || raw.iter().any(|v| !v.is_finite()) {
        return Err(ClassifierError::Output("empty or non-finite scores".into()));
    }
    if raw.iter().any(|v| *v < 0.0) {
        softmax_in_place(&mut raw);
        return Ok(raw);
    }
    let sum: f64 = raw.iter().sum();
    if sum <= 0.0 {
        return Err(ClassifierError::Output("scores sum to zero".into()));
    }
    Ok(raw.into_iter().map(|v| v / sum).collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pipeline::classifier::{DiseaseModel, FixedDistributionModel};
    use crate::pipeline::matcher::{encode, FeatureVector};

    struct BrokenModel {
        labels: Vec<String>,
    }

    impl DiseaseModel for BrokenModel {
        fn labels(&self) -> &[String] {
            &self.labels
        }
        fn input_len(&self) -> usize {
            1
        }
        fn forward(&self, _input: &[f64]) -> Result<Vec<f64>, ClassifierError> {
            Err(ClassifierError::Output("boom".into()))
        }
        fn name(&self) -> &str {
            "broken"
        }
    }

    fn fixed(distribution: &[(&str, f64)]) -> ModelResources {
        ModelResources::new(
            vec!["fever".into()],
            Arc::new(FixedDistributionModel::new(1, distribution)),
        )
        .unwrap()
    }

    fn encoding(matched: &[&str]) -> SymptomEncoding {
        SymptomEncoding {
            vector: FeatureVector::from(vec![1.0]),
            matched_terms: matched.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn candidates_ranked_and_thresholded() {
        let resources = fixed(&[("migraine", 0.1), ("diabetes", 0.8), ("gout", 0.04), ("flu", 0.06)]);
        let set = Classifier::new(&resources, 0.05, 3).predict(&encoding(&["fever"]));

        let names: Vec<_> = set.candidates.iter().map(|c| c.disease.as_str()).collect();
        assert_eq!(names, vec!["diabetes", "migraine", "flu"]);
        assert_eq!(set.candidates[0].rank, 1);
        assert_eq!(set.candidates[2].rank, 3);
        assert_eq!(set.candidates[0].matched_symptoms, vec!["fever"]);
        assert!(set.candidates[1].matched_symptoms.is_empty());
        assert!(set.warning.is_none());
    }

    #[test]
    fn top_k_limits_output() {
        let resources = fixed(&[("a", 0.4), ("b", 0.3), ("c", 0.3)]);
        let set = Classifier::new(&resources, 0.05, 1).predict(&encoding(&[]));
        assert_eq!(set.candidates.len(), 1);
    }

    #[test]
    fn ties_broken_by_label() {
        let resources = fixed(&[("zeta", 0.5), ("alpha", 0.5)]);
        let set = Classifier::new(&resources, 0.05, 3).predict(&encoding(&[]));
        assert_eq!(set.candidates[0].disease, "alpha");
    }

    #[test]
    fn nothing_above_threshold_returns_single_flagged_candidate() {
        let labels: Vec<(String, f64)> = (0..25).map(|i| (format!("d{i:02}"), 0.04)).collect();
        let refs: Vec<(&str, f64)> = labels.iter().map(|(l, p)| (l.as_str(), *p)).collect();
        let resources = fixed(&refs);
        let set = Classifier::new(&resources, 0.05, 3).predict(&encoding(&["fever"]));

        assert_eq!(set.candidates.len(), 1);
        assert!(set.candidates[0].very_low_confidence);
        assert_eq!(set.candidates[0].disease, "d00");
        assert_eq!(set.warning.as_deref(), Some(VERY_LOW_CONFIDENCE_WARNING));
        assert!(!set.degraded);
    }

    #[test]
    fn scores_are_renormalized() {
        let resources = fixed(&[("a", 2.0), ("b", 2.0)]);
        let set = Classifier::new(&resources, 0.05, 3).predict(&encoding(&[]));
        assert_eq!(set.candidates[0].probability, 0.5);
    }

    #[test]
    fn logits_go_through_softmax() {
        let resources = fixed(&[("a", -1.0), ("b", -1.0)]);
        let set = Classifier::new(&resources, 0.05, 3).predict(&encoding(&[]));
        assert_eq!(set.candidates[0].probability, 0.5);
    }

    #[test]
    fn model_failure_degrades() {
        let resources = ModelResources::new(
            vec!["fever".into()],
            Arc::new(BrokenModel {
                labels: vec!["diabetes".into()],
            }),
        )
        .unwrap();
        let set = Classifier::new(&resources, 0.05, 3).predict(&encoding(&["fever"]));
        assert!(set.degraded);
        assert_eq!(set.top().disease, UNDETERMINED);
        assert_eq!(set.top().probability, 0.0);
        assert_eq!(set.warning.as_deref(), Some(DEGRADED_WARNING));
    }

    #[test]
    fn all_zero_output_degrades() {
        let resources = fixed(&[("a", 0.0), ("b", 0.0)]);
        assert!(Classifier::new(&resources, 0.05, 3).predict(&encoding(&[])).degraded);
    }

    fn diabetes_risk(probability: f64, blend_weight: f64) -> DiseaseRisk {
        DiseaseRisk {
            disease: "diabetes".into(),
            probability,
            coverage: 1.0,
            blend_weight,
        }
    }

    #[test]
    fn risk_is_blended_before_ranking() {
        let resources = fixed(&[("migraine", 0.5), ("diabetes", 0.4), ("flu", 0.1)]);
        let set = Classifier::new(&resources, 0.05, 3)
            .with_risk(Some(diabetes_risk(1.0, 0.4)))
            .predict(&encoding(&["fever"]));

        assert_eq!(set.top().disease, "diabetes");
        assert!((set.top().probability - 0.64).abs() < 1e-9);
        let total: f64 = set.candidates.iter().map(|c| c.probability).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(set.disease_risk.as_ref().unwrap().blend_weight, 0.4);
    }

    #[test]
    fn risk_for_unknown_label_is_reported_unblended() {
        let resources = fixed(&[("migraine", 0.6), ("flu", 0.4)]);
        let set = Classifier::new(&resources, 0.05, 3)
            .with_risk(Some(diabetes_risk(0.9, 0.4)))
            .predict(&encoding(&[]));

        assert_eq!(set.top().probability, 0.6);
        let risk = set.disease_risk.unwrap();
        assert_eq!(risk.probability, 0.9);
        assert_eq!(risk.blend_weight, 0.0);
    }

    #[test]
    fn reference_model_ranks_diabetes_triad_first() {
        let resources = ModelResources::reference().unwrap();
        let encoded = encode(
            "increased thirst, frequent urination, fatigue",
            &resources.vocabulary,
        );
        let set = Classifier::new(&resources, 0.05, 3).predict(&encoded);
        assert_eq!(set.top().disease, "diabetes");
        assert!(set.top().probability > 0.75);
        let total: f64 = set.candidates.iter().map(|c| c.probability).sum();
        assert!(total <= 1.0 + 1e-9);
    }
}
