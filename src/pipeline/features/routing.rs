use serde::Serialize;

use super::schema::{DiseaseSchema, DEFAULT_DISEASE, DISEASES};

/// Which disease-specific schema to extract against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    pub disease: &'static str,
    pub score: usize,
    /// True when the choice came from the fallback rather than a unique top score.
    pub defaulted: bool,
}

/// Pick a disease by keyword count over the joined, lower-cased symptoms.
/// Symptoms are joined by line breaks, so no keyword spans two of them.
///
/// The unique highest score wins; a tie at the top or an all-zero score
/// resolves to `DEFAULT_DISEASE`.
pub fn route(symptoms: &[String]) -> RoutingDecision {
    route_among(DISEASES, symptoms)
}

pub fn route_among(diseases: &'static [DiseaseSchema], symptoms: &[String]) -> RoutingDecision {
    let text = symptoms.join("\n").to_lowercase();

    let scores: Vec<(&'static str, usize)> = diseases
        .iter()
        .map(|d| (d.id, d.keywords.iter().filter(|k| text.contains(*k)).count()))
        .collect();

    let best = scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
    let leaders: Vec<&'static str> = scores
        .iter()
        .filter(|(_, s)| *s == best)
        .map(|(id, _)| *id)
        .collect();

    match leaders.as_slice() {
        [only] if best > 0 => RoutingDecision {
            disease: *only,
            score: best,
            defaulted: false,
        },
        _ => {
            tracing::warn!(
                best_score = best,
                tied = leaders.len(),
                default = DEFAULT_DISEASE,
                "Disease routing inconclusive, using default schema"
            );
            RoutingDecision {
                disease: DEFAULT_DISEASE,
                score: best,
                defaulted: true,
            }
        }
    }
}
