//! Field-level precedence merge of manual and report-derived data.
//!
//! Manual values always win. The report only fills gaps: absent vitals,
//! clinical records with unseen natural keys, and (unless the caller marked
//! symptoms as manual-only) symptoms not already listed.

use std::collections::HashSet;

use crate::models::{AdditionalInfo, DataSource, NaturalKey, SourceMarkers, Vitals};
use crate::pipeline::intake::{
    is_unsafe, normalize_symptom, SanitizedInput, MAX_SYMPTOMS, MAX_SYMPTOM_CHARS,
    MIN_SYMPTOM_CHARS,
};

use super::types::{ExtractionResult, MergeSummary, MergedInput};

/// Merge `extracted` into `manual`. With no report data the manual input
/// passes through unchanged.
pub fn merge(
    manual: &SanitizedInput,
    extracted: Option<&ExtractionResult>,
    markers: &SourceMarkers,
) -> MergedInput {
    let mut summary = MergeSummary::default();
    let mut symptoms = manual.symptoms.clone();
    let mut info = manual.additional_info.clone();

    if let Some(report) = extracted {
        summary.report_merged = true;
        merge_symptoms(&mut symptoms, &report.symptoms, markers, &mut summary);
        merge_vitals(&mut info.vitals, &report.vitals, &mut summary);
        merge_records(&mut info, report, &mut summary);

        for (section, score) in &report.confidence_scores {
            info.extraction_confidence_scores
                .entry(section.clone())
                .or_insert(*score);
        }

        tracing::debug!(
            symptoms_added = summary.symptoms_added,
            symptoms_discarded = summary.symptoms_discarded,
            vitals_filled = summary.vitals_filled.len(),
            records_added = summary.records_added,
            "Report data merged"
        );
    }

    MergedInput {
        symptoms,
        age: manual.age,
        gender: manual.gender,
        additional_info: info,
        summary,
    }
}

fn merge_symptoms(
    symptoms: &mut Vec<String>,
    extracted: &[String],
    markers: &SourceMarkers,
    summary: &mut MergeSummary,
) {
    if markers.get("symptoms") == Some(DataSource::Manual) {
        summary.symptoms_discarded = extracted.len();
        return;
    }

    // Report text bypassed the intake gate, so it is screened here.
    for raw in extracted {
        let symptom = normalize_symptom(raw);
        let len = symptom.chars().count();
        if !(MIN_SYMPTOM_CHARS..=MAX_SYMPTOM_CHARS).contains(&len) || is_unsafe(&symptom) {
            summary.symptoms_discarded += 1;
            continue;
        }
        if symptoms.contains(&symptom) {
            continue;
        }
        if symptoms.len() >= MAX_SYMPTOMS {
            summary.symptoms_discarded += 1;
            continue;
        }
        symptoms.push(symptom);
        summary.symptoms_added += 1;
    }
}

fn merge_vitals(manual: &mut Vitals, extracted: &Vitals, summary: &mut MergeSummary) {
    fill(&mut manual.heart_rate, &extracted.heart_rate, "heart_rate", summary);
    fill(&mut manual.temperature, &extracted.temperature, "temperature", summary);
    fill(&mut manual.blood_pressure, &extracted.blood_pressure, "blood_pressure", summary);
    fill(&mut manual.respiratory_rate, &extracted.respiratory_rate, "respiratory_rate", summary);
    fill(&mut manual.oxygen_saturation, &extracted.oxygen_saturation, "oxygen_saturation", summary);
    fill(&mut manual.weight_kg, &extracted.weight_kg, "weight_kg", summary);
    fill(&mut manual.height_cm, &extracted.height_cm, "height_cm", summary);
    fill(&mut manual.glucose, &extracted.glucose, "glucose", summary);

    for (key, value) in &extracted.extra {
        if manual.extra.contains_key(key) {
            note_override(summary, &format!("vitals.{key}"));
        } else {
            manual.extra.insert(key.clone(), value.clone());
            summary.vitals_filled.push(key.clone());
        }
    }
}

fn fill<T: Clone>(
    manual: &mut Option<T>,
    extracted: &Option<T>,
    field: &str,
    summary: &mut MergeSummary,
) {
    match (manual.is_some(), extracted) {
        (true, Some(_)) => note_override(summary, &format!("vitals.{field}")),
        (false, Some(value)) => {
            *manual = Some(value.clone());
            summary.vitals_filled.push(field.to_string());
        }
        (_, None) => {}
    }
}

fn merge_records(info: &mut AdditionalInfo, report: &ExtractionResult, summary: &mut MergeSummary) {
    let mut collided = false;
    summary.records_added += merge_by_key(&mut info.lab_results, &report.lab_results, &mut collided);
    if std::mem::take(&mut collided) {
        note_override(summary, "lab_results");
    }
    summary.records_added += merge_by_key(&mut info.medications, &report.medications, &mut collided);
    if std::mem::take(&mut collided) {
        note_override(summary, "medications");
    }
    summary.records_added += merge_by_key(&mut info.diagnoses, &report.diagnoses, &mut collided);
    if collided {
        note_override(summary, "diagnoses");
    }
}

/// Append extracted entries whose natural key is new; returns how many were added.
fn merge_by_key<T: NaturalKey + Clone>(manual: &mut Vec<T>, extracted: &[T], collided: &mut bool) -> usize {
    let mut seen: HashSet<String> = manual.iter().map(NaturalKey::natural_key).collect();
    let mut added = 0;
    for entry in extracted {
        if seen.insert(entry.natural_key()) {
            manual.push(entry.clone());
            added += 1;
        } else {
            *collided = true;
        }
    }
    added
}

fn note_override(summary: &mut MergeSummary, field: &str) {
    if !summary.manual_overrides.iter().any(|f| f == field) {
        summary.manual_overrides.push(field.to_string());
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::{Gender, LabResult, Medication};

    fn manual_input(symptoms: &[&str], info: AdditionalInfo) -> SanitizedInput {
        SanitizedInput {
            symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
            age: 45,
            gender: Gender::Male,
            additional_info: info,
            modifications: vec![],
        }
    }

    fn lab(name: &str, value: f64) -> LabResult {
        LabResult {
            test_name: name.into(),
            value: Some(value),
            unit: None,
            reference_range: None,
            flag: None,
        }
    }

    // =================================================================
    // VITALS
    // =================================================================

    #[test]
    fn manual_heart_rate_wins_and_report_fills_gaps() {
        let mut info = AdditionalInfo::default();
        info.vitals.heart_rate = Some(80.0);
        let manual = manual_input(&["fatigue"], info);
        let report = ExtractionResult {
            vitals: Vitals {
                heart_rate: Some(72.0),
                blood_pressure: Some("120/80".into()),
                ..Vitals::default()
            },
            ..ExtractionResult::default()
        };

        let merged = merge(&manual, Some(&report), &SourceMarkers::default());

        assert_eq!(merged.additional_info.vitals.heart_rate, Some(80.0));
        assert_eq!(merged.additional_info.vitals.blood_pressure.as_deref(), Some("120/80"));
        assert_eq!(merged.summary.vitals_filled, vec!["blood_pressure"]);
        assert_eq!(merged.summary.manual_overrides, vec!["vitals.heart_rate"]);
    }

    #[test]
    fn extra_vitals_fields_pass_through() {
        let mut info = AdditionalInfo::default();
        info.vitals.extra.insert("pain_score".into(), json!(4));
        let mut report = ExtractionResult::default();
        report.vitals.extra.insert("pain_score".into(), json!(7));
        report.vitals.extra.insert("peak_flow".into(), json!(410));

        let merged = merge(&manual_input(&["cough"], info), Some(&report), &SourceMarkers::default());

        assert_eq!(merged.additional_info.vitals.extra["pain_score"], json!(4));
        assert_eq!(merged.additional_info.vitals.extra["peak_flow"], json!(410));
    }

    // =================================================================
    // SYMPTOMS
    // =================================================================

    #[test]
    fn symptoms_are_unioned_without_duplicates() {
        let report = ExtractionResult {
            symptoms: vec!["Fatigue".into(), "blurred vision".into()],
            ..ExtractionResult::default()
        };
        let merged = merge(
            &manual_input(&["fatigue", "increased thirst"], AdditionalInfo::default()),
            Some(&report),
            &SourceMarkers::default(),
        );
        assert_eq!(merged.symptoms, vec!["fatigue", "increased thirst", "blurred vision"]);
        assert_eq!(merged.summary.symptoms_added, 1);
    }

    #[test]
    fn manual_only_marker_discards_report_symptoms() {
        let report = ExtractionResult {
            symptoms: vec!["blurred vision".into()],
            ..ExtractionResult::default()
        };
        let markers = SourceMarkers::default().with("symptoms", DataSource::Manual);
        let merged = merge(&manual_input(&["fatigue"], AdditionalInfo::default()), Some(&report), &markers);
        assert_eq!(merged.symptoms, vec!["fatigue"]);
        assert_eq!(merged.summary.symptoms_discarded, 1);
    }

    #[test]
    fn unsafe_report_symptoms_are_screened() {
        let report = ExtractionResult {
            symptoms: vec!["<script>x</script>".into(), "x".into(), "nausea".into()],
            ..ExtractionResult::default()
        };
        let merged = merge(
            &manual_input(&["fatigue"], AdditionalInfo::default()),
            Some(&report),
            &SourceMarkers::default(),
        );
        assert_eq!(merged.symptoms, vec!["fatigue", "nausea"]);
        assert_eq!(merged.summary.symptoms_discarded, 2);
    }

    #[test]
    fn symptom_union_is_capped() {
        let manual: Vec<String> = (0..MAX_SYMPTOMS).map(|i| format!("symptom {i}")).collect();
        let refs: Vec<&str> = manual.iter().map(String::as_str).collect();
        let report = ExtractionResult {
            symptoms: vec!["nausea".into()],
            ..ExtractionResult::default()
        };
        let merged = merge(
            &manual_input(&refs, AdditionalInfo::default()),
            Some(&report),
            &SourceMarkers::default(),
        );
        assert_eq!(merged.symptoms.len(), MAX_SYMPTOMS);
        assert!(!merged.symptoms.contains(&"nausea".to_string()));
    }

    // =================================================================
    // CLINICAL RECORDS
    // =================================================================

    #[test]
    fn records_merge_by_natural_key_manual_wins() {
        let info = AdditionalInfo {
            lab_results: vec![lab("HbA1c", 6.9)],
            medications: vec![Medication {
                name: "Metformin".into(),
                dose: Some("500mg".into()),
                frequency: None,
            }],
            ..AdditionalInfo::default()
        };
        let report = ExtractionResult {
            lab_results: vec![lab(" hba1c ", 7.4), lab("Fasting glucose", 140.0)],
            medications: vec![Medication {
                name: "metformin".into(),
                dose: Some("1000mg".into()),
                frequency: None,
            }],
            ..ExtractionResult::default()
        };

        let merged = merge(&manual_input(&["fatigue"], info), Some(&report), &SourceMarkers::default());
        let labs = &merged.additional_info.lab_results;

        assert_eq!(labs.len(), 2);
        assert_eq!(labs[0].value, Some(6.9));
        assert_eq!(labs[1].test_name, "Fasting glucose");
        assert_eq!(merged.additional_info.medications.len(), 1);
        assert_eq!(merged.additional_info.medications[0].dose.as_deref(), Some("500mg"));
        assert_eq!(merged.summary.records_added, 1);
        assert_eq!(merged.summary.manual_overrides, vec!["lab_results", "medications"]);
    }

    #[test]
    fn confidence_scores_copied_without_touching_values() {
        let report = ExtractionResult {
            lab_results: vec![lab("LDL", 190.0)],
            confidence_scores: [("lab_results".to_string(), 0.42)].into_iter().collect(),
            ..ExtractionResult::default()
        };
        let merged = merge(
            &manual_input(&["fatigue"], AdditionalInfo::default()),
            Some(&report),
            &SourceMarkers::default(),
        );
        assert_eq!(
            merged.additional_info.extraction_confidence_scores.get("lab_results"),
            Some(&0.42)
        );
        assert_eq!(merged.additional_info.lab_results[0].value, Some(190.0));
    }

    #[test]
    fn no_report_passes_manual_through() {
        let manual = manual_input(&["fever"], AdditionalInfo::default());
        let merged = merge(&manual, None, &SourceMarkers::default());
        assert_eq!(merged.symptoms, manual.symptoms);
        assert!(!merged.summary.report_merged);
        assert_eq!(merged.summary, MergeSummary::default());
    }

    #[test]
    fn extraction_result_parses_leniently() {
        let report = ExtractionResult::from_value(&json!({
            "symptoms": ["cough", 3],
            "vitals": {"heart_rate": "72"},
            "lab_results": [{"test_name": "CRP", "value": 12}, "junk"],
            "confidence_scores": {"vitals": 0.9}
        }));
        assert_eq!(report.symptoms, vec!["cough"]);
        assert_eq!(report.vitals.heart_rate, Some(72.0));
        assert_eq!(report.lab_results.len(), 1);
        assert_eq!(report.confidence_scores.get("vitals"), Some(&0.9));
    }
}
