use serde::{Deserialize, Serialize};

use crate::models::{AdditionalInfo, Gender};

pub const MIN_AGE: i64 = 1;
pub const MAX_AGE: i64 = 120;
pub const MAX_SYMPTOMS: usize = 20;
pub const MIN_SYMPTOM_CHARS: usize = 2;
pub const MAX_SYMPTOM_CHARS: usize = 100;

/// Validated input. Constructed only by the validator, so every instance
/// satisfies the age, gender and symptom constraints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SanitizedInput {
    /// Trimmed, lower-cased, deduplicated; 1..=MAX_SYMPTOMS entries.
    pub symptoms: Vec<String>,
    pub age: u8,
    pub gender: Gender,
    pub additional_info: AdditionalInfo,
    /// What cleanup changed, for audit. Never contains patient text.
    pub modifications: Vec<InputModification>,
}

/// Failure categories in evaluation order; the first category with any
/// violation short-circuits validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    MissingFields,
    InvalidType,
    UnsafeContent,
    AgeOutOfRange,
    InvalidGender,
    SymptomCount,
    SymptomLength,
}

impl ViolationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingFields => "missing_fields",
            Self::InvalidType => "invalid_type",
            Self::UnsafeContent => "unsafe_content",
            Self::AgeOutOfRange => "age_out_of_range",
            Self::InvalidGender => "invalid_gender",
            Self::SymptomCount => "symptom_count",
            Self::SymptomLength => "symptom_length",
        }
    }
}

impl std::fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Dotted path of the offending field, e.g. `symptoms[2]`.
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A cleanup applied during sanitization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputModification {
    pub kind: InputModificationKind,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputModificationKind {
    InvisibleUnicodeRemoved,
    ControlCharacterRemoved,
    DuplicateSymptomRemoved,
    TypeCoerced,
}
