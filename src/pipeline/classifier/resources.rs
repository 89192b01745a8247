//! Process-wide classifier resources, loaded lazily exactly once.
//!
//! A `ResourceHandle` is created at startup and passed into the pipeline
//! context. The first request to need the model triggers the load; later
//! and concurrent callers share the same result, including a failed load.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use super::model::{DiseaseModel, FeedForwardModel, ModelDefinition};
use super::risk::RiskModels;
use super::ClassifierError;
use crate::config::PipelineConfig;

const REFERENCE_MODEL: &str = include_str!("../../../assets/reference_model.json");

/// Immutable, shared-read-only model state.
pub struct ModelResources {
    /// Symptom phrases, one per model input slot.
    pub vocabulary: Vec<String>,
    pub model: Arc<dyn DiseaseModel>,
    /// Disease-specific models over routed feature schemas.
    pub risk_models: RiskModels,
}

impl ModelResources {
    pub fn new(vocabulary: Vec<String>, model: Arc<dyn DiseaseModel>) -> Result<Self, ClassifierError> {
        if vocabulary.len() != model.input_len() {
            return Err(ClassifierError::Shape(format!(
                "vocabulary has {} phrases, model expects {} inputs",
                vocabulary.len(),
                model.input_len()
            )));
        }
        Ok(Self {
            vocabulary,
            model,
            risk_models: RiskModels::empty(),
        })
    }

    /// A loaded network plus the built-in disease-specific models.
    pub fn from_definition(definition: ModelDefinition) -> Result<Self, ClassifierError> {
        let vocabulary = definition.vocabulary.clone();
        Ok(Self::new(vocabulary, Arc::new(FeedForwardModel::from_definition(definition)))?
            .with_risk_models(RiskModels::builtin()?))
    }

    pub fn with_risk_models(mut self, risk_models: RiskModels) -> Self {
        self.risk_models = risk_models;
        self
    }

    /// The built-in reference network.
    pub fn reference() -> Result<Self, ClassifierError> {
        Self::from_definition(ModelDefinition::from_json(REFERENCE_MODEL)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ClassifierError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ClassifierError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_definition(ModelDefinition::from_json(&raw)?)
    }
}

type Loader = Box<dyn Fn() -> Result<ModelResources, ClassifierError> + Send + Sync>;

pub struct ResourceHandle {
    loader: Loader,
    cell: OnceLock<Result<Arc<ModelResources>, ClassifierError>>,
    loads: AtomicUsize,
}

impl ResourceHandle {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<ModelResources, ClassifierError> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            cell: OnceLock::new(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn reference() -> Self {
        Self::new(ModelResources::reference)
    }

    pub fn from_path(path: PathBuf) -> Self {
        Self::new(move || ModelResources::from_file(&path))
    }

    /// Wrap resources that are already built (tests, embedding callers).
    pub fn preloaded(resources: ModelResources) -> Self {
        let handle = Self::new(|| Err(ClassifierError::Shape("preloaded handle has no loader".into())));
        let _ = handle.cell.set(Ok(Arc::new(resources)));
        handle
    }

    /// Model file from configuration, or the built-in reference model.
    pub fn from_config(config: &PipelineConfig) -> Self {
        match &config.model_path {
            Some(path) => Self::from_path(path.clone()),
            None => Self::reference(),
        }
    }

    /// Resources, loading them on first use.
    pub fn get(&self) -> Result<Arc<ModelResources>, ClassifierError> {
        self.cell
            .get_or_init(|| {
                self.loads.fetch_add(1, Ordering::SeqCst);
                let result = (self.loader)().map(Arc::new);
                match &result {
                    Ok(resources) => tracing::info!(
                        model = resources.model.name(),
                        vocabulary = resources.vocabulary.len(),
                        labels = resources.model.labels().len(),
                        risk_models = resources.risk_models.len(),
                        "Classifier resources loaded"
                    ),
                    Err(e) => tracing::error!(error = %e, "Classifier resources failed to load"),
                }
                result
            })
            .clone()
    }

    /// How many times the loader has run.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}
