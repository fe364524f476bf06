//! Nakshatra classification of a sidereal longitude.
//!
//! The zodiac holds 108 Padas of 3°20′. Classification counts whole Padas
//! from 0° Aries; the Nakshatra is `pada_index / 4` and the Pada within it
//! is `pada_index % 4 + 1`. Intervals are half-open and lower-inclusive: a
//! longitude exactly on a boundary belongs to the Pada beginning there.
//!
//! Computing in Pada units keeps constructions like `k * (360/27)` from
//! falling just below a boundary through float error. On top of the
//! half-open rule, the policy's `boundary_epsilon` (in Pada units) moves a
//! longitude that far below a boundary into the Pada beginning there. The
//! default 1e-9 is about 3.3e-9°, far below the engine's accuracy.

use crate::ephemeris::{normalize_360, EphemerisError};
use crate::policy::{CalculationPolicyV1, NadiTableVersion};
use crate::types::{Nakshatra, NakshatraPosition, NAKSHATRA_SPAN_DEG, PADAS_PER_NAKSHATRA};

/// Total Padas in the zodiac.
const TOTAL_PADAS: usize = 108;

/// Maps sidereal longitudes to Nakshatra, Pada and Nadi.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NakshatraClassifier {
    nadi_table: NadiTableVersion,
    boundary_epsilon: f64,
}

impl Default for NakshatraClassifier {
    fn default() -> Self {
        Self::from_policy(&CalculationPolicyV1::default())
    }
}

impl NakshatraClassifier {
    /// Classifier using a policy's table and boundary tolerance.
    pub fn from_policy(policy: &CalculationPolicyV1) -> Self {
        Self {
            nadi_table: policy.nadi_table,
            boundary_epsilon: policy.boundary_epsilon,
        }
    }

    /// Classify a sidereal longitude in degrees.
    ///
    /// Finite values outside [0, 360) are reduced first. Fails only for
    /// NaN or infinite input.
    pub fn classify(&self, sidereal_longitude: f64) -> Result<NakshatraPosition, EphemerisError> {
        if !sidereal_longitude.is_finite() {
            return Err(EphemerisError::InvalidLongitude(sidereal_longitude));
        }
        let longitude = normalize_360(sidereal_longitude);

        let pada_units = longitude * TOTAL_PADAS as f64 / 360.0;
        let pada_index = ((pada_units + self.boundary_epsilon).floor() as usize).min(TOTAL_PADAS - 1);

        let nakshatra_index = pada_index / PADAS_PER_NAKSHATRA;
        let nakshatra = Nakshatra::from_index(nakshatra_index as u8)
            .ok_or(EphemerisError::InvalidLongitude(sidereal_longitude))?;
        let pada = (pada_index % PADAS_PER_NAKSHATRA) as u8 + 1;

        let degrees_in_nakshatra = (longitude - nakshatra.start_longitude()).clamp(0.0, NAKSHATRA_SPAN_DEG);

        Ok(NakshatraPosition {
            nakshatra,
            pada,
            nadi: self.nadi_table.nadi_of(nakshatra),
            degrees_in_nakshatra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Nadi, PADA_SPAN_DEG};

    fn classify(l: f64) -> NakshatraPosition {
        NakshatraClassifier::default().classify(l).unwrap()
    }

    #[test]
    fn test_zero_is_ashwini_pada_1() {
        let pos = classify(0.0);
        assert_eq!(pos.nakshatra, Nakshatra::Ashwini);
        assert_eq!(pos.pada, 1);
        assert_eq!(pos.nadi, Nadi::Aadi);
    }

    #[test]
    fn test_just_below_360_is_revati_pada_4() {
        let pos = classify(360.0 - 1e-12);
        assert_eq!(pos.nakshatra, Nakshatra::Revati);
        assert_eq!(pos.pada, 4);
    }

    #[test]
    fn test_exact_nakshatra_boundaries_are_lower_inclusive() {
        for k in 0..27u8 {
            let pos = classify(k as f64 * NAKSHATRA_SPAN_DEG);
            assert_eq!(pos.nakshatra.index(), k, "boundary {k}");
            assert_eq!(pos.pada, 1, "boundary {k}");
        }
    }

    #[test]
    fn test_exact_pada_boundaries_are_lower_inclusive() {
        for q in 0..108usize {
            let pos = classify(q as f64 * PADA_SPAN_DEG);
            assert_eq!(pos.nakshatra.index() as usize, q / 4, "pada boundary {q}");
            assert_eq!(pos.pada as usize, q % 4 + 1, "pada boundary {q}");
        }
    }

    #[test]
    fn test_just_below_boundary_stays_in_previous_pada() {
        let pos = classify(NAKSHATRA_SPAN_DEG - 1e-6);
        assert_eq!(pos.nakshatra, Nakshatra::Ashwini);
        assert_eq!(pos.pada, 4);
    }

    #[test]
    fn test_boundary_tolerance_width() {
        // Rohini begins at 40°, one Pada unit is 10/3°
        let tolerance_deg = CalculationPolicyV1::default().boundary_epsilon * PADA_SPAN_DEG;

        let inside = classify(40.0 - tolerance_deg * 0.5);
        assert_eq!((inside.nakshatra, inside.pada), (Nakshatra::Rohini, 1));
        assert_eq!(inside.degrees_in_nakshatra, 0.0);

        let outside = classify(40.0 - tolerance_deg * 3.0);
        assert_eq!((outside.nakshatra, outside.pada), (Nakshatra::Krittika, 4));

        let strict = NakshatraClassifier::from_policy(&CalculationPolicyV1 {
            boundary_epsilon: 0.0,
            ..CalculationPolicyV1::default()
        });
        assert_eq!(strict.classify(40.0 - tolerance_deg * 0.5).unwrap().nakshatra, Nakshatra::Krittika);
    }

    #[test]
    fn test_chennai_golden_longitude() {
        let pos = classify(51.311);
        assert_eq!(pos.nakshatra, Nakshatra::Rohini);
        assert_eq!(pos.pada, 4);
        assert_eq!(pos.nadi, Nadi::Antya);
        assert!((pos.degrees_in_nakshatra - (51.311 - 40.0)).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_is_normalized() {
        assert_eq!(classify(-0.5).nakshatra, Nakshatra::Revati);
        assert_eq!(classify(360.0).nakshatra, Nakshatra::Ashwini);
        assert_eq!(classify(411.311).nakshatra, Nakshatra::Rohini);
    }

    #[test]
    fn test_non_finite_rejected() {
        let classifier = NakshatraClassifier::default();
        assert!(matches!(
            classifier.classify(f64::NAN),
            Err(EphemerisError::InvalidLongitude(_))
        ));
        assert!(classifier.classify(f64::INFINITY).is_err());
    }
}
