use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An incoming assessment request exactly as received from the API layer.
///
/// Every field is optional and loosely typed: the validator is the only place
/// that decides what is missing, malformed or unsafe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAssessmentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<Map<String, Value>>,
}

impl RawAssessmentRequest {
    /// Well-typed constructor, mostly for callers that already hold structured data.
    pub fn new(symptoms: &[&str], age: i64, gender: &str) -> Self {
        Self {
            symptoms: Some(Value::from(symptoms.to_vec())),
            age: Some(Value::from(age)),
            gender: Some(Value::from(gender)),
            additional_info: None,
        }
    }

    pub fn with_additional_info(mut self, info: Value) -> Self {
        self.additional_info = info.as_object().cloned();
        self
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
