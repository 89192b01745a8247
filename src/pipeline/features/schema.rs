//! Disease knowledge base: routing keywords and the feature schema each
//! disease-specific classifier expects.

/// Disease used when keyword routing is tied or finds nothing.
pub const DEFAULT_DISEASE: &str = "diabetes";

/// Features computed from demographics and vitals, never from symptom text.
pub const STRUCTURED_FEATURES: &[&str] = &[
    "age",
    "gender_male",
    "glucose",
    "bmi",
    "systolic_bp",
    "diastolic_bp",
    "heart_rate",
    "temperature",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiseaseSchema {
    pub id: &'static str,
    pub display_name: &'static str,
    /// Lower-case routing keywords, matched as substrings of the symptom text.
    pub keywords: &'static [&'static str],
    pub required_features: &'static [&'static str],
    pub optional_features: &'static [&'static str],
}

impl DiseaseSchema {
    /// Every feature the classifier expects, required first.
    pub fn all_features(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.required_features
            .iter()
            .chain(self.optional_features.iter())
            .copied()
    }

    /// Features resolved from symptom text rather than structured data.
    pub fn symptom_features(&self) -> Vec<&'static str> {
        self.all_features()
            .filter(|f| !STRUCTURED_FEATURES.contains(f))
            .collect()
    }

    pub fn is_required(&self, feature: &str) -> bool {
        self.required_features.contains(&feature)
    }
}

pub static DISEASES: &[DiseaseSchema] = &[
    DiseaseSchema {
        id: "diabetes",
        display_name: "Type 2 diabetes",
        keywords: &[
            "thirst",
            "urination",
            "fatigue",
            "blurred vision",
            "weight loss",
            "hunger",
            "slow healing",
            "tingling",
        ],
        required_features: &[
            "age",
            "bmi",
            "glucose",
            "increased_thirst",
            "frequent_urination",
            "fatigue",
        ],
        optional_features: &["blurred_vision", "weight_loss", "slow_healing", "gender_male"],
    },
    DiseaseSchema {
        id: "heart_disease",
        display_name: "Coronary heart disease",
        keywords: &[
            "chest pain",
            "shortness of breath",
            "palpitation",
            "arm pain",
            "jaw pain",
            "sweating",
            "fainting",
        ],
        required_features: &[
            "age",
            "gender_male",
            "chest_pain",
            "shortness_of_breath",
            "systolic_bp",
            "heart_rate",
        ],
        optional_features: &["palpitations", "dizziness", "arm_pain", "sweating", "fainting", "diastolic_bp"],
    },
    DiseaseSchema {
        id: "hypertension",
        display_name: "Hypertension",
        keywords: &["headache", "dizziness", "nosebleed", "blurred vision", "pounding"],
        required_features: &["age", "systolic_bp", "diastolic_bp", "headache"],
        optional_features: &["bmi", "dizziness", "nosebleed", "blurred_vision"],
    },
    DiseaseSchema {
        id: "respiratory_infection",
        display_name: "Respiratory infection",
        keywords: &[
            "cough",
            "fever",
            "sore throat",
            "runny nose",
            "congestion",
            "chills",
            "body aches",
        ],
        required_features: &["fever", "cough", "temperature"],
        optional_features: &[
            "sore_throat",
            "runny_nose",
            "shortness_of_breath",
            "chills",
            "body_aches",
            "age",
        ],
    },
    DiseaseSchema {
        id: "migraine",
        display_name: "Migraine",
        keywords: &["headache", "nausea", "light sensitivity", "sensitivity to light", "aura", "vomiting"],
        required_features: &["headache", "nausea", "light_sensitivity"],
        optional_features: &["aura", "vomiting", "dizziness", "age", "gender_male"],
    },
];

pub fn schema_for(id: &str) -> Option<&'static DiseaseSchema> {
    DISEASES.iter().find(|d| d.id == id)
}
