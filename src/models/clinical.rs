//! Typed view of the open-ended `additional_info` payload.
//!
//! Incoming data is only partially trusted, so parsing is lenient: numbers
//! may arrive as strings, list items that fail to deserialize are skipped,
//! and unknown keys are preserved verbatim in `other`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::enums::DataSource;

/// Keys of `additional_info` with a typed representation.
const KNOWN_KEYS: &[&str] = &[
    "vitals",
    "lab_results",
    "medications",
    "diagnoses",
    "extraction_confidence_scores",
    "source_markers",
    "report_job_id",
    "extracted_data",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    /// Degrees Celsius.
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// "systolic/diastolic", e.g. "120/80".
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub blood_pressure: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub respiratory_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    /// Blood glucose, mg/dL.
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub glucose: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Vitals {
    /// Parse "120/80" into (systolic, diastolic).
    pub fn blood_pressure_parts(&self) -> Option<(f64, f64)> {
        let raw = self.blood_pressure.as_deref()?;
        let (sys, dia) = raw.split_once('/')?;
        Some((sys.trim().parse().ok()?, dia.trim().parse().ok()?))
    }

    /// Body-mass index from weight and height, when both are plausible.
    pub fn bmi(&self) -> Option<f64> {
        let weight = self.weight_kg.filter(|w| *w > 0.0)?;
        let height_m = self.height_cm.filter(|h| *h > 0.0)? / 100.0;
        Some(weight / (height_m * height_m))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    pub test_name: String,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisRecord {
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosed_on: Option<String>,
}

/// A clinical list entry identified by a natural key (test, medication or condition name).
pub trait NaturalKey {
    fn natural_key(&self) -> String;
}

impl NaturalKey for LabResult {
    fn natural_key(&self) -> String {
        normalize_key(&self.test_name)
    }
}

impl NaturalKey for Medication {
    fn natural_key(&self) -> String {
        normalize_key(&self.name)
    }
}

impl NaturalKey for DiagnosisRecord {
    fn natural_key(&self) -> String {
        normalize_key(&self.condition)
    }
}

/// Natural keys compare case-insensitively, ignoring surrounding and repeated whitespace.
pub fn normalize_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Per-field provenance markers supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceMarkers(pub BTreeMap<String, DataSource>);

impl SourceMarkers {
    pub fn get(&self, field: &str) -> Option<DataSource> {
        self.0.get(field).copied()
    }

    pub fn with(mut self, field: &str, source: DataSource) -> Self {
        self.0.insert(field.to_string(), source);
        self
    }
}

/// Typed `additional_info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalInfo {
    #[serde(default, skip_serializing_if = "Vitals::is_empty")]
    pub vitals: Vitals,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lab_results: Vec<LabResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub medications: Vec<Medication>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnoses: Vec<DiagnosisRecord>,
    /// Copied verbatim from report extraction; informational only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extraction_confidence_scores: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "SourceMarkers::is_empty")]
    pub source_markers: SourceMarkers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_job_id: Option<String>,
    /// Inline report-derived data, an alternative to `report_job_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub other: BTreeMap<String, Value>,
}

impl SourceMarkers {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AdditionalInfo {
    /// Leniently build the typed view from a raw JSON object.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let vitals = map
            .get("vitals")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let extraction_confidence_scores = map
            .get("extraction_confidence_scores")
            .and_then(Value::as_object)
            .map(|scores| {
                scores
                    .iter()
                    .filter_map(|(k, v)| value_as_f64(v).map(|score| (k.clone(), score)))
                    .collect()
            })
            .unwrap_or_default();

        let source_markers = map
            .get("source_markers")
            .and_then(Value::as_object)
            .map(|markers| {
                SourceMarkers(
                    markers
                        .iter()
                        .filter_map(|(k, v)| {
                            v.as_str()
                                .and_then(|s| s.trim().to_lowercase().parse().ok())
                                .map(|source| (k.clone(), source))
                        })
                        .collect(),
                )
            })
            .unwrap_or_default();

        let other = map
            .iter()
            .filter(|(k, _)| !KNOWN_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            vitals,
            lab_results: parse_array_lenient(map.get("lab_results")),
            medications: parse_array_lenient(map.get("medications")),
            diagnoses: parse_array_lenient(map.get("diagnoses")),
            extraction_confidence_scores,
            source_markers,
            report_job_id: map
                .get("report_job_id")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            extracted_data: map.get("extracted_data").filter(|v| v.is_object()).cloned(),
            other,
        }
    }
}

/// Parse an array leniently, skipping items that fail to deserialize.
pub fn parse_array_lenient<T: for<'de> Deserialize<'de>>(items: Option<&Value>) -> Vec<T> {
    match items.and_then(Value::as_array) {
        None => vec![],
        Some(arr) => arr
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect(),
    }
}

/// Numbers may arrive as JSON numbers or numeric strings.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|n: &f64| n.is_finite())
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
