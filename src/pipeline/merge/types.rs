use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{
    parse_array_lenient, value_as_f64, AdditionalInfo, DiagnosisRecord, Gender, LabResult,
    Medication, Vitals,
};

// ═══════════════════════════════════════════
// Report-derived data
// ═══════════════════════════════════════════

/// Clinical data pulled from an uploaded report by the external parsing pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub vitals: Vitals,
    #[serde(default)]
    pub lab_results: Vec<LabResult>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub diagnoses: Vec<DiagnosisRecord>,
    /// Per-section extraction confidence, copied through untouched.
    #[serde(default)]
    pub confidence_scores: BTreeMap<String, f64>,
}

impl ExtractionResult {
    /// Lenient parse of a report payload. Unusable sections are dropped,
    /// never rejected wholesale.
    pub fn from_value(value: &Value) -> Self {
        let symptoms = value
            .get("symptoms")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let vitals = value
            .get("vitals")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        let confidence_scores = value
            .get("confidence_scores")
            .or_else(|| value.get("extraction_confidence_scores"))
            .and_then(Value::as_object)
            .map(|scores| {
                scores
                    .iter()
                    .filter_map(|(k, v)| value_as_f64(v).map(|s| (k.clone(), s)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            symptoms,
            vitals,
            lab_results: parse_array_lenient(value.get("lab_results")),
            medications: parse_array_lenient(value.get("medications")),
            diagnoses: parse_array_lenient(value.get("diagnoses")),
            confidence_scores,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ═══════════════════════════════════════════
// Merge output
// ═══════════════════════════════════════════

/// Sanitized input reconciled with report-derived data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedInput {
    pub symptoms: Vec<String>,
    pub age: u8,
    pub gender: Gender,
    pub additional_info: AdditionalInfo,
    pub summary: MergeSummary,
}

impl MergedInput {
    /// Symptoms joined into one lower-cased text for keyword and phrase matching.
    pub fn symptom_text(&self) -> String {
        self.symptoms.join(", ")
    }
}

/// What the merge took from each side. Counts and field names only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub report_merged: bool,
    pub symptoms_added: usize,
    /// Extracted symptoms dropped because symptoms were marked manual-only.
    pub symptoms_discarded: usize,
    /// Vitals fields that only the report supplied.
    pub vitals_filled: Vec<String>,
    /// Fields present on both sides where the manual value was kept.
    pub manual_overrides: Vec<String>,
    pub records_added: usize,
}
