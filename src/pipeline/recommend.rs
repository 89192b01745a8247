//! Recommendation synthesis: urgency and action items from disease,
//! confidence tier and clinical severity.
//!
//! Red-flag rules fire on the reported symptoms, not on the model output:
//! a red flag means emergency care whatever the classifier believed.

use serde::Serialize;

use crate::models::{ClinicalSeverity, ConfidenceTier, Recommendations, Urgency, Vitals};
use crate::pipeline::explain::display_name;

// ── Red-flag symptom sets ───────────────────────────────────

struct RedFlagRule {
    id: &'static str,
    keywords: &'static [&'static str],
}

static RED_FLAGS: &[RedFlagRule] = &[
    RedFlagRule {
        id: "cardiac_red_flag",
        keywords: &["crushing chest", "severe chest pain", "chest pain radiating"],
    },
    RedFlagRule {
        id: "respiratory_red_flag",
        keywords: &["can't breathe", "cannot breathe", "difficulty breathing", "blue lips"],
    },
    RedFlagRule {
        id: "neurological_red_flag",
        keywords: &["slurred speech", "facial droop", "worst headache", "seizure"],
    },
    RedFlagRule {
        id: "consciousness_red_flag",
        keywords: &["loss of consciousness", "unconscious", "unresponsive"],
    },
    RedFlagRule {
        id: "bleeding_red_flag",
        keywords: &["coughing blood", "vomiting blood"],
    },
];

// ── Vital sign limits ───────────────────────────────────────

const HIGH_FEVER_C: f64 = 39.5;
const TACHYCARDIA_BPM: f64 = 120.0;
const BRADYCARDIA_BPM: f64 = 45.0;
const LOW_OXYGEN_PCT: f64 = 92.0;
const HYPERTENSIVE_CRISIS_SYSTOLIC: f64 = 180.0;

/// Clinical severity plus the rule ids that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeverityAssessment {
    pub severity: ClinicalSeverity,
    pub triggers: Vec<&'static str>,
}

/// Red-flag symptoms make the case severe; out-of-range vitals make it
/// at least moderate.
pub fn assess_severity(symptoms: &[String], vitals: &Vitals) -> SeverityAssessment {
    let text = symptoms.join(" ").to_lowercase();
    let mut triggers: Vec<&'static str> = RED_FLAGS
        .iter()
        .filter(|rule| rule.keywords.iter().any(|k| text.contains(k)))
        .map(|rule| rule.id)
        .collect();
    let red_flag = !triggers.is_empty();

    if vitals.temperature.is_some_and(|t| t >= HIGH_FEVER_C) {
        triggers.push("high_fever");
    }
    if vitals
        .heart_rate
        .is_some_and(|hr| hr > TACHYCARDIA_BPM || hr < BRADYCARDIA_BPM)
    {
        triggers.push("abnormal_heart_rate");
    }
    if vitals.oxygen_saturation.is_some_and(|s| s < LOW_OXYGEN_PCT) {
        triggers.push("low_oxygen_saturation");
    }
    if vitals
        .blood_pressure_parts()
        .is_some_and(|(systolic, _)| systolic >= HYPERTENSIVE_CRISIS_SYSTOLIC)
    {
        triggers.push("hypertensive_crisis");
    }

    let severity = if red_flag {
        ClinicalSeverity::Severe
    } else if !triggers.is_empty() {
        ClinicalSeverity::Moderate
    } else {
        ClinicalSeverity::Mild
    };

    SeverityAssessment { severity, triggers }
}

/// Urgency for a disease at a given tier and severity.
pub fn urgency_for(disease: &str, tier: ConfidenceTier, severity: ClinicalSeverity) -> Urgency {
    let base = match tier {
        ConfidenceTier::High if disease == "heart_disease" => Urgency::Urgent,
        ConfidenceTier::High | ConfidenceTier::Medium => Urgency::Soon,
        ConfidenceTier::Low => Urgency::Routine,
    };
    match severity {
        ClinicalSeverity::Severe => Urgency::Emergency,
        ClinicalSeverity::Moderate => base.escalate(),
        ClinicalSeverity::Mild => base,
    }
}

fn disease_actions(disease: &str) -> &'static [&'static str] {
    match disease {
        "diabetes" => &[
            "Ask a clinician about a fasting blood glucose or HbA1c test.",
            "Keep a note of how often you feel thirsty or need to urinate.",
        ],
        "heart_disease" => &[
            "Arrange a cardiovascular check-up, including blood pressure and cholesterol.",
            "Note when chest discomfort or breathlessness happens and how long it lasts.",
        ],
        "hypertension" => &[
            "Have your blood pressure measured on several different days.",
            "Bring any home blood pressure readings to your appointment.",
        ],
        "respiratory_infection" => &[
            "Rest, stay hydrated and track your temperature.",
            "Seek care if breathing becomes difficult or fever lasts more than three days.",
        ],
        "migraine" => &[
            "Keep a headache diary noting timing, triggers and duration.",
            "Discuss recurring headaches with a clinician.",
        ],
        _ => &[],
    }
}

const EMERGENCY_ACTION: &str =
    "Seek emergency care now or call your local emergency number.";
const MONITOR_ACTION: &str = "Monitor your symptoms and note any changes.";
const CONSULT_ACTION: &str = "Consult a clinician if symptoms persist or get worse.";

/// Build the recommendation payload. Items are never empty.
///
/// LOW tier results carry only monitoring and consult actions; disease-specific
/// advice needs at least MEDIUM confidence.
pub fn synthesize(
    disease: &str,
    tier: ConfidenceTier,
    severity: ClinicalSeverity,
) -> Recommendations {
    let urgency = urgency_for(disease, tier, severity);
    let mut items = Vec::new();

    if urgency == Urgency::Emergency {
        items.push(EMERGENCY_ACTION.to_string());
    }

    match tier {
        ConfidenceTier::Low => {
            items.push(MONITOR_ACTION.to_string());
            items.push(CONSULT_ACTION.to_string());
        }
        ConfidenceTier::Medium | ConfidenceTier::High => {
            let when = match urgency {
                Urgency::Emergency | Urgency::Urgent => "within the next day",
                Urgency::Soon => "within the next few weeks",
                Urgency::Routine => "at your next routine visit",
            };
            items.push(format!(
                "Discuss the possibility of {} with a clinician {when}.",
                display_name(disease)
            ));
            let actions = disease_actions(disease);
            let take = if tier == ConfidenceTier::High { actions.len() } else { 1 };
            items.extend(actions.iter().take(take).map(|a| a.to_string()));
            if actions.is_empty() {
                items.push(CONSULT_ACTION.to_string());
            }
        }
    }

    tracing::debug!(
        disease,
        tier = tier.as_str(),
        severity = severity.as_str(),
        urgency = urgency.as_str(),
        items = items.len(),
        "Recommendations synthesized"
    );

    Recommendations {
        items,
        urgency,
        confidence: tier,
        severity,
    }
}
