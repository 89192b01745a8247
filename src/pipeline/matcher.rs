//! Phrase-to-vector symptom encoding.
//!
//! Vocabulary phrases are tried longest first (by word count), each matched
//! at word boundaries against the remaining text. A matched span is cut out
//! before the next phrase is tried, so "chest pain" consumes its "pain" and
//! a shorter phrase can never claim the same occurrence. Separately listed
//! symptoms are matched as separate segments: no phrase spans two of them.

use serde::Serialize;

/// Multihot vector aligned to a vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.0.iter().filter(|v| **v > 0.0).count()
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymptomEncoding {
    pub vector: FeatureVector,
    /// Normalized phrases that matched, in vocabulary order.
    pub matched_terms: Vec<String>,
}

/// Lower-case, replace anything that is not alphanumeric with a space,
/// collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Encode `text` against `vocabulary`. Pure: the output depends only on the
/// text and the vocabulary contents.
pub fn encode(text: &str, vocabulary: &[String]) -> SymptomEncoding {
    encode_segments(&[text], vocabulary)
}

/// Encode a symptom list. Each symptom is its own segment, so a phrase is
/// never assembled from the end of one symptom and the start of the next.
pub fn encode_symptoms(symptoms: &[String], vocabulary: &[String]) -> SymptomEncoding {
    encode_segments(symptoms, vocabulary)
}

fn encode_segments<S: AsRef<str>>(segments: &[S], vocabulary: &[String]) -> SymptomEncoding {
    let mut working: Vec<String> = segments.iter().map(|s| normalize_text(s.as_ref())).collect();

    let normalized: Vec<String> = vocabulary.iter().map(|p| normalize_text(p)).collect();

    // Longest first; ties broken by length then text so the order never
    // depends on how the caller listed the vocabulary.
    let mut order: Vec<usize> = (0..normalized.len())
        .filter(|i| !normalized[*i].is_empty())
        .collect();
    order.sort_by(|a, b| {
        let (pa, pb) = (&normalized[*a], &normalized[*b]);
        word_count(pb)
            .cmp(&word_count(pa))
            .then_with(|| pb.len().cmp(&pa.len()))
            .then_with(|| pa.cmp(pb))
            .then_with(|| a.cmp(b))
    });

    let mut vector = FeatureVector::zeros(vocabulary.len());
    let mut hit = vec![false; vocabulary.len()];

    for index in order {
        let phrase = &normalized[index];
        // Single occurrence: the first segment holding the phrase gives it up.
        for segment in working.iter_mut() {
            if let Some(start) = find_whole_phrase(segment, phrase) {
                vector.0[index] = 1.0;
                hit[index] = true;
                segment.replace_range(start..start + phrase.len(), " ");
                break;
            }
        }
    }

    let matched_terms = normalized
        .into_iter()
        .zip(hit)
        .filter(|(_, hit)| *hit)
        .map(|(phrase, _)| phrase)
        .collect();

    SymptomEncoding {
        vector,
        matched_terms,
    }
}

fn word_count(phrase: &str) -> usize {
    phrase.split_whitespace().count()
}

/// Byte offset of the first occurrence of `phrase` bounded by spaces or the
/// ends of `text`. Both inputs are normalized, so spaces are the only
/// separators.
fn find_whole_phrase(text: &str, phrase: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(offset) = text[from..].find(phrase) {
        let start = from + offset;
        let end = start + phrase.len();
        let left_ok = start == 0 || text.as_bytes()[start - 1] == b' ';
        let right_ok = end == text.len() || text.as_bytes()[end] == b' ';
        if left_ok && right_ok {
            return Some(start);
        }
        // Step past this occurrence's first character.
        from = start + text[start..].chars().next().map_or(1, char::len_utf8);
    }
    None
}
