use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field} value: {value}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form is also the serde representation.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Gender {
    Male => "male",
    Female => "female",
    Other => "other",
});

str_enum!(
    /// Discrete trust band derived from a prediction probability.
    ConfidenceTier {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
    }
);

str_enum!(VerificationSeverity {
    Low => "low",
    Medium => "medium",
    Critical => "critical",
});

str_enum!(Urgency {
    Routine => "routine",
    Soon => "soon",
    Urgent => "urgent",
    Emergency => "emergency",
});

str_enum!(
    /// Which strategy produced a stage's output.
    ExtractionMethod {
        AiEnriched => "ai_enriched",
        RuleBased => "rule_based",
    }
);

str_enum!(DataSource {
    Manual => "manual",
    Extracted => "extracted",
});

str_enum!(ClinicalSeverity {
    Mild => "mild",
    Moderate => "moderate",
    Severe => "severe",
});

impl Urgency {
    /// One step more urgent, saturating at Emergency.
    pub fn escalate(self) -> Self {
        match self {
            Self::Routine => Self::Soon,
            Self::Soon => Self::Urgent,
            Self::Urgent | Self::Emergency => Self::Emergency,
        }
    }
}
