use serde_json::{Map, Value};

use super::denylist::{
    find_unsafe_patterns, normalize_symptom, remove_control_characters, remove_invisible_unicode,
};
use super::types::*;
use super::ValidationFailure;
use crate::models::{AdditionalInfo, Gender, RawAssessmentRequest};
use crate::pipeline::stage::Stage;

/// Structural and safety gate over raw requests. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputValidator;

impl Stage<RawAssessmentRequest> for InputValidator {
    type Output = SanitizedInput;
    type Error = ValidationFailure;

    fn name(&self) -> &'static str {
        "validate"
    }

    fn process(&self, input: &RawAssessmentRequest) -> Result<SanitizedInput, ValidationFailure> {
        validate(input)
    }
}

/// Validate and sanitize a raw request.
///
/// Categories are checked in `ViolationCategory` order; the first category
/// with any violation is returned with all of its violations.
pub fn validate(raw: &RawAssessmentRequest) -> Result<SanitizedInput, ValidationFailure> {
    let mut modifications = Vec::new();

    // Missing fields
    let missing: Vec<Violation> = [
        ("symptoms", &raw.symptoms),
        ("age", &raw.age),
        ("gender", &raw.gender),
    ]
    .into_iter()
    .filter(|(_, value)| is_missing(value.as_ref()))
    .map(|(field, _)| Violation::new(field, "is required"))
    .collect();
    fail_if(ViolationCategory::MissingFields, missing)?;

    // The three fields are present past this point.
    let symptoms_value = raw.symptoms.as_ref().unwrap_or(&Value::Null);
    let age_value = raw.age.as_ref().unwrap_or(&Value::Null);
    let gender_value = raw.gender.as_ref().unwrap_or(&Value::Null);

    // Types
    let mut type_violations = Vec::new();
    let raw_symptoms = coerce_symptoms(symptoms_value, &mut type_violations, &mut modifications);
    let age = coerce_age(age_value, &mut type_violations, &mut modifications);
    let gender_text = match gender_value {
        Value::String(s) => Some(s.clone()),
        _ => {
            type_violations.push(Violation::new("gender", "must be a string"));
            None
        }
    };
    fail_if(ViolationCategory::InvalidType, type_violations)?;
    let (Some(raw_symptoms), Some(age), Some(gender_text)) = (raw_symptoms, age, gender_text)
    else {
        // Every None above pushed a type violation.
        return Err(ValidationFailure {
            category: ViolationCategory::InvalidType,
            violations: vec![],
        });
    };

    // Cleanup, then unsafe content
    let cleaned_symptoms: Vec<String> = raw_symptoms
        .iter()
        .map(|s| clean_text(s, &mut modifications))
        .collect();
    let gender_text = clean_text(&gender_text, &mut modifications);

    // Scanned before control characters are blanked so line-anchored
    // patterns still see line breaks.
    let mut unsafe_violations = Vec::new();
    for (i, symptom) in raw_symptoms.iter().enumerate() {
        scan_text(
            &format!("symptoms[{i}]"),
            &remove_invisible_unicode(symptom),
            &mut unsafe_violations,
        );
    }
    scan_text("gender", &gender_text, &mut unsafe_violations);
    if let Some(info) = &raw.additional_info {
        scan_map("additional_info", info, &mut unsafe_violations);
    }
    fail_if(ViolationCategory::UnsafeContent, unsafe_violations)?;

    // Age range
    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return Err(ValidationFailure {
            category: ViolationCategory::AgeOutOfRange,
            violations: vec![Violation::new(
                "age",
                format!("must be between {MIN_AGE} and {MAX_AGE}, got {age}"),
            )],
        });
    }

    // Gender
    let gender: Gender = normalize_symptom(&gender_text).parse().map_err(|_| ValidationFailure {
        category: ViolationCategory::InvalidGender,
        violations: vec![Violation::new("gender", "must be one of: male, female, other")],
    })?;

    // Symptom count (after dedup)
    let symptoms = dedupe_symptoms(&cleaned_symptoms, &mut modifications);
    if symptoms.is_empty() || symptoms.len() > MAX_SYMPTOMS {
        return Err(ValidationFailure {
            category: ViolationCategory::SymptomCount,
            violations: vec![Violation::new(
                "symptoms",
                format!(
                    "must contain between 1 and {MAX_SYMPTOMS} distinct entries, got {}",
                    symptoms.len()
                ),
            )],
        });
    }

    // Symptom length
    let length_violations: Vec<Violation> = symptoms
        .iter()
        .enumerate()
        .filter(|(_, s)| !(MIN_SYMPTOM_CHARS..=MAX_SYMPTOM_CHARS).contains(&s.chars().count()))
        .map(|(i, s)| {
            Violation::new(
                format!("symptoms[{i}]"),
                format!(
                    "length must be between {MIN_SYMPTOM_CHARS} and {MAX_SYMPTOM_CHARS} characters, got {}",
                    s.chars().count()
                ),
            )
        })
        .collect();
    fail_if(ViolationCategory::SymptomLength, length_violations)?;

    let additional_info = raw
        .additional_info
        .as_ref()
        .map(AdditionalInfo::from_map)
        .unwrap_or_default();

    tracing::debug!(
        symptom_count = symptoms.len(),
        modifications = modifications.len(),
        "Input validated"
    );

    Ok(SanitizedInput {
        symptoms,
        // Range-checked above.
        age: age as u8,
        gender,
        additional_info,
        modifications,
    })
}

fn fail_if(category: ViolationCategory, violations: Vec<Violation>) -> Result<(), ValidationFailure> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationFailure {
            category,
            violations,
        })
    }
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Symptoms arrive as a list of strings; a lone string is accepted as a one-item list.
fn coerce_symptoms(
    value: &Value,
    violations: &mut Vec<Violation>,
    modifications: &mut Vec<InputModification>,
) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    _ => violations.push(Violation::new(format!("symptoms[{i}]"), "must be a string")),
                }
            }
            Some(out)
        }
        Value::String(s) => {
            modifications.push(InputModification {
                kind: InputModificationKind::TypeCoerced,
                description: "Single symptom string wrapped into a list".into(),
            });
            Some(vec![s.clone()])
        }
        _ => {
            violations.push(Violation::new("symptoms", "must be a list of strings"));
            None
        }
    }
}

fn coerce_age(
    value: &Value,
    violations: &mut Vec<Violation>,
    modifications: &mut Vec<InputModification>,
) -> Option<i64> {
    let whole = |f: f64| (f.is_finite() && f.fract() == 0.0).then_some(f as i64);

    let age = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole)),
        Value::String(s) => {
            let parsed = s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| s.trim().parse::<f64>().ok().and_then(whole));
            if parsed.is_some() {
                modifications.push(InputModification {
                    kind: InputModificationKind::TypeCoerced,
                    description: "Age string converted to integer".into(),
                });
            }
            parsed
        }
        _ => None,
    };

    if age.is_none() {
        violations.push(Violation::new("age", "must be an integer"));
    }
    age
}

fn clean_text(text: &str, modifications: &mut Vec<InputModification>) -> String {
    let visible = remove_invisible_unicode(text);
    if visible != text {
        push_once(
            modifications,
            InputModificationKind::InvisibleUnicodeRemoved,
            "Stripped non-visible Unicode characters",
        );
    }
    let cleaned = remove_control_characters(&visible);
    if cleaned != visible {
        push_once(
            modifications,
            InputModificationKind::ControlCharacterRemoved,
            "Replaced control characters",
        );
    }
    cleaned
}

fn push_once(modifications: &mut Vec<InputModification>, kind: InputModificationKind, description: &str) {
    if !modifications.iter().any(|m| m.kind == kind) {
        modifications.push(InputModification {
            kind,
            description: description.to_string(),
        });
    }
}

fn dedupe_symptoms(symptoms: &[String], modifications: &mut Vec<InputModification>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(symptoms.len());
    for symptom in symptoms {
        let normalized = normalize_symptom(symptom);
        if out.contains(&normalized) {
            push_once(
                modifications,
                InputModificationKind::DuplicateSymptomRemoved,
                "Removed symptoms duplicated after normalization",
            );
            continue;
        }
        out.push(normalized);
    }
    out
}

fn scan_text(field: &str, text: &str, violations: &mut Vec<Violation>) {
    for description in find_unsafe_patterns(text) {
        violations.push(Violation::new(field, format!("unsafe content: {description}")));
    }
}

fn scan_map(path: &str, map: &Map<String, Value>, violations: &mut Vec<Violation>) {
    for (key, value) in map {
        let child = format!("{path}.{key}");
        scan_text(&child, key, violations);
        scan_value(&child, value, violations);
    }
}

fn scan_value(path: &str, value: &Value, violations: &mut Vec<Violation>) {
    match value {
        Value::String(s) => scan_text(path, &remove_invisible_unicode(s), violations),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                scan_value(&format!("{path}[{i}]"), item, violations);
            }
        }
        Value::Object(map) => scan_map(path, map, violations),
        _ => {}
    }
}
