use crate::models::ConfidenceTier;

/// Tier boundaries; each band includes its lower bound.
pub mod tier_thresholds {
    /// At or above: MEDIUM.
    pub const MEDIUM: f64 = 0.55;

    /// At or above: HIGH.
    pub const HIGH: f64 = 0.75;
}

/// Map a probability to its confidence tier. Non-finite input is LOW.
pub fn tier(probability: f64) -> ConfidenceTier {
    if probability.is_nan() || probability < tier_thresholds::MEDIUM {
        ConfidenceTier::Low
    } else if probability < tier_thresholds::HIGH {
        ConfidenceTier::Medium
    } else {
        ConfidenceTier::High
    }
}

/// Whether `claimed` is the tier `probability` actually maps to.
pub fn is_consistent(probability: f64, claimed: ConfidenceTier) -> bool {
    tier(probability) == claimed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges_are_lower_inclusive() {
        assert_eq!(tier(0.0), ConfidenceTier::Low);
        assert_eq!(tier(0.5499), ConfidenceTier::Low);
        assert_eq!(tier(0.55), ConfidenceTier::Medium);
        assert_eq!(tier(0.7499), ConfidenceTier::Medium);
        assert_eq!(tier(0.75), ConfidenceTier::High);
        assert_eq!(tier(1.0), ConfidenceTier::High);
    }

    #[test]
    fn tier_is_monotonic_over_unit_interval() {
        let mut previous = tier(0.0);
        for step in 0..=1000 {
            let current = tier(f64::from(step) / 1000.0);
            assert!(current as u8 >= previous as u8);
            previous = current;
        }
    }

    #[test]
    fn classifier_output_of_082_is_high() {
        assert_eq!(tier(0.82), ConfidenceTier::High);
    }

    #[test]
    fn nan_is_low() {
        assert_eq!(tier(f64::NAN), ConfidenceTier::Low);
    }

    #[test]
    fn consistency_check() {
        assert!(is_consistent(0.82, ConfidenceTier::High));
        assert!(!is_consistent(0.82, ConfidenceTier::Low));
        assert!(!is_consistent(0.6, ConfidenceTier::High));
    }
}
