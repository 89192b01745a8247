use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "symptom-risk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version stamped into every assessment's metadata.
pub const PIPELINE_VERSION: &str = "assessment-pipeline/3";

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "SYMPTOM_RISK_";

/// Upper bound for any AI service call, whatever the configuration says.
pub const MAX_LLM_TIMEOUT_SECS: u64 = 120;

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "symptom_risk=info,warn"
}

/// Application data directory (~/.symptom-risk/).
/// Falls back to the working directory when no home directory is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".symptom-risk")
}

/// Default directory for stored assessment records.
pub fn assessments_dir() -> PathBuf {
    app_data_dir().join("assessments")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config file: {0}")]
    Malformed(String),
}

/// Runtime configuration for the assessment pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base URL of the Ollama-compatible text-generation service.
    pub llm_base_url: String,
    pub llm_model: String,
    /// Per-call timeout, clamped to 1..=MAX_LLM_TIMEOUT_SECS.
    pub llm_timeout_secs: u64,
    /// Candidates at or below this probability are dropped.
    pub min_candidate_probability: f64,
    pub top_k: usize,
    /// Blend weight of the disease-specific model when every required
    /// feature is resolved; scaled down by feature coverage.
    pub risk_blend_weight: f64,
    pub enriched_extraction: bool,
    pub enriched_verification: bool,
    pub enriched_explanation: bool,
    /// Optional path to a serialized classifier; the built-in reference model is used otherwise.
    pub model_path: Option<PathBuf>,
    pub storage_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            llm_base_url: "http://localhost:11434".to_string(),
            llm_model: "medgemma:4b".to_string(),
            llm_timeout_secs: 30,
            min_candidate_probability: 0.05,
            top_k: 3,
            risk_blend_weight: crate::pipeline::classifier::DEFAULT_RISK_BLEND_WEIGHT,
            enriched_extraction: true,
            enriched_verification: true,
            enriched_explanation: true,
            model_path: None,
            storage_dir: assessments_dir(),
        }
    }
}

impl PipelineConfig {
    /// Build a config from `SYMPTOM_RISK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (env-style keys).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(url) = get("LLM_URL") {
            config.llm_base_url = url;
        }
        if let Some(model) = get("LLM_MODEL") {
            config.llm_model = model;
        }
        if let Some(raw) = get("LLM_TIMEOUT_SECS") {
            config.llm_timeout_secs = parse_value("LLM_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = get("MIN_PROBABILITY") {
            let value: f64 = parse_value("MIN_PROBABILITY", &raw)?;
            if !(0.0..1.0).contains(&value) {
                return Err(invalid("MIN_PROBABILITY", &raw));
            }
            config.min_candidate_probability = value;
        }
        if let Some(raw) = get("TOP_K") {
            let value: usize = parse_value("TOP_K", &raw)?;
            if value == 0 {
                return Err(invalid("TOP_K", &raw));
            }
            config.top_k = value;
        }
        if let Some(raw) = get("RISK_BLEND_WEIGHT") {
            let value: f64 = parse_value("RISK_BLEND_WEIGHT", &raw)?;
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid("RISK_BLEND_WEIGHT", &raw));
            }
            config.risk_blend_weight = value;
        }
        if let Some(raw) = get("ENRICHED") {
            let enabled = parse_bool("ENRICHED", &raw)?;
            config.enriched_extraction = enabled;
            config.enriched_verification = enabled;
            config.enriched_explanation = enabled;
        }
        if let Some(path) = get("MODEL") {
            config.model_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = get("STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Load a JSON config file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Effective AI call timeout, always bounded.
    pub fn effective_llm_timeout_secs(&self) -> u64 {
        self.llm_timeout_secs.clamp(1, MAX_LLM_TIMEOUT_SECS)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(key, raw))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw)),
    }
}

fn invalid(key: &str, raw: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: format!("{ENV_PREFIX}{key}"),
        value: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_is_hidden_app_folder() {
        assert!(app_data_dir().ends_with(".symptom-risk"));
        assert!(assessments_dir().starts_with(app_data_dir()));
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert!((config.min_candidate_probability - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.top_k, 3);
        assert!(config.enriched_extraction);
        assert!(config.model_path.is_none());
    }

    #[test]
    fn empty_lookup_yields_defaults() {
        let config = PipelineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn lookup_overrides_fields() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("SYMPTOM_RISK_LLM_URL", "http://10.0.0.2:11434"),
            ("SYMPTOM_RISK_TOP_K", "5"),
            ("SYMPTOM_RISK_ENRICHED", "off"),
            ("SYMPTOM_RISK_MIN_PROBABILITY", "0.1"),
        ]))
        .unwrap();
        assert_eq!(config.llm_base_url, "http://10.0.0.2:11434");
        assert_eq!(config.top_k, 5);
        assert!(!config.enriched_extraction);
        assert!(!config.enriched_verification);
        assert!(!config.enriched_explanation);
        assert!((config.min_candidate_probability - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_numeric_is_rejected() {
        let err = PipelineConfig::from_lookup(lookup_from(&[("SYMPTOM_RISK_TOP_K", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "SYMPTOM_RISK_TOP_K"));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        assert!(PipelineConfig::from_lookup(lookup_from(&[("SYMPTOM_RISK_TOP_K", "0")])).is_err());
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        assert!(
            PipelineConfig::from_lookup(lookup_from(&[("SYMPTOM_RISK_MIN_PROBABILITY", "1.5")]))
                .is_err()
        );
    }

    #[test]
    fn risk_blend_weight_bounded_to_unit_interval() {
        let config =
            PipelineConfig::from_lookup(lookup_from(&[("SYMPTOM_RISK_RISK_BLEND_WEIGHT", "0")])).unwrap();
        assert_eq!(config.risk_blend_weight, 0.0);
        assert!(
            PipelineConfig::from_lookup(lookup_from(&[("SYMPTOM_RISK_RISK_BLEND_WEIGHT", "1.2")]))
                .is_err()
        );
    }

    #[test]
    fn timeout_is_bounded() {
        let config = PipelineConfig {
            llm_timeout_secs: 10_000,
            ..PipelineConfig::default()
        };
        assert_eq!(config.effective_llm_timeout_secs(), MAX_LLM_TIMEOUT_SECS);
        let config = PipelineConfig {
            llm_timeout_secs: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(config.effective_llm_timeout_secs(), 1);
    }

    #[test]
    fn json_file_fills_missing_keys_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"top_k": 2, "enriched_verification": false}"#).unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.top_k, 2);
        assert!(!config.enriched_verification);
        assert!(config.enriched_extraction);
    }

    #[test]
    fn malformed_json_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(&path),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn missing_json_file_is_read_error() {
        let err = PipelineConfig::from_json_file(Path::new("/nonexistent/pipeline.json"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
