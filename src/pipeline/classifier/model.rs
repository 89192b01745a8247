use serde::Deserialize;

use super::ClassifierError;

/// A trained disease model over a fixed-length input.
pub trait DiseaseModel: Send + Sync {
    /// Output labels, one per output slot.
    fn labels(&self) -> &[String];

    fn input_len(&self) -> usize;

    /// Raw scores or probabilities, one per label.
    fn forward(&self, input: &[f64]) -> Result<Vec<f64>, ClassifierError>;

    fn name(&self) -> &str;
}

// ═══════════════════════════════════════════
// Feed-forward network
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Softmax,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DenseLayer {
    /// Row-major `[outputs][inputs]`.
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    pub activation: Activation,
}

/// On-disk model definition: vocabulary, labels and dense layers.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    pub vocabulary: Vec<String>,
    pub labels: Vec<String>,
    pub layers: Vec<DenseLayer>,
}

impl ModelDefinition {
    pub fn from_json(raw: &str) -> Result<Self, ClassifierError> {
        let definition: Self =
            serde_json::from_str(raw).map_err(|e| ClassifierError::Parse(e.to_string()))?;
        definition.validate()?;
        Ok(definition)
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        if self.vocabulary.is_empty() {
            return Err(ClassifierError::Shape("empty vocabulary".into()));
        }
        if self.layers.is_empty() {
            return Err(ClassifierError::Shape("no layers".into()));
        }
        let mut labels = self.labels.clone();
        labels.sort();
        labels.dedup();
        if labels.len() != self.labels.len() || labels.is_empty() {
            return Err(ClassifierError::Shape("labels must be non-empty and unique".into()));
        }

        let mut width = self.vocabulary.len();
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.weights.is_empty() || layer.weights.len() != layer.bias.len() {
                return Err(ClassifierError::Shape(format!(
                    "layer {i}: {} weight rows, {} biases",
                    layer.weights.len(),
                    layer.bias.len()
                )));
            }
            if let Some(row) = layer.weights.iter().position(|r| r.len() != width) {
                return Err(ClassifierError::Shape(format!(
                    "layer {i} row {row}: expected {width} inputs"
                )));
            }
            width = layer.weights.len();
        }
        if width != self.labels.len() {
            return Err(ClassifierError::Shape(format!(
                "output width {width} does not match {} labels",
                self.labels.len()
            )));
        }
        Ok(())
    }
}

/// Dense feed-forward network evaluated in plain f64.
#[derive(Debug, Clone)]
pub struct FeedForwardModel {
    name: String,
    input_len: usize,
    labels: Vec<String>,
    layers: Vec<DenseLayer>,
}

impl FeedForwardModel {
    /// Build from a validated definition.
    pub fn from_definition(definition: ModelDefinition) -> Self {
        Self {
            name: definition.name,
            input_len: definition.vocabulary.len(),
            labels: definition.labels,
            layers: definition.layers,
        }
    }
}

impl DiseaseModel for FeedForwardModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn input_len(&self) -> usize {
        self.input_len
    }

    fn forward(&self, input: &[f64]) -> Result<Vec<f64>, ClassifierError> {
        if input.len() != self.input_len {
            return Err(ClassifierError::InputLength {
                expected: self.input_len,
                actual: input.len(),
            });
        }

        let mut values = input.to_vec();
        for layer in &self.layers {
            let mut next: Vec<f64> = layer
                .weights
                .iter()
                .zip(&layer.bias)
                .map(|(row, bias)| row.iter().zip(&values).map(|(w, x)| w * x).sum::<f64>() + bias)
                .collect();
            activate(layer.activation, &mut next);
            values = next;
        }
        Ok(values)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn activate(activation: Activation, values: &mut [f64]) {
    match activation {
        Activation::Linear => {}
        Activation::Relu => values.iter_mut().for_each(|v| *v = v.max(0.0)),
        Activation::Sigmoid => values.iter_mut().for_each(|v| *v = 1.0 / (1.0 + (-*v).exp())),
        Activation::Softmax => softmax_in_place(values),
    }
}

/// Numerically stable softmax.
pub fn softmax_in_place(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        values.iter_mut().for_each(|v| *v /= sum);
    }
}

// ═══════════════════════════════════════════
// Fixed distribution
// ═══════════════════════════════════════════

/// Returns the same distribution for every input. Used as a deterministic
/// stand-in where a trained model is not wanted.
#[derive(Debug, Clone)]
pub struct FixedDistributionModel {
    input_len: usize,
    labels: Vec<String>,
    probabilities: Vec<f64>,
}

impl FixedDistributionModel {
    pub fn new(input_len: usize, distribution: &[(&str, f64)]) -> Self {
        Self {
            input_len,
            labels: distribution.iter().map(|(l, _)| l.to_string()).collect(),
            probabilities: distribution.iter().map(|(_, p)| *p).collect(),
        }
    }
}

impl DiseaseModel for FixedDistributionModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn input_len(&self) -> usize {
        self.input_len
    }

    fn forward(&self, input: &[f64]) -> Result<Vec<f64>, ClassifierError> {
        if input.len() != self.input_len {
            return Err(ClassifierError::InputLength {
                expected: self.input_len,
                actual: input.len(),
            });
        }
        Ok(self.probabilities.clone())
    }

    fn name(&self) -> &str {
        "fixed-distribution"
    }
}
