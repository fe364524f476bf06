//! Lunar position engine.
//!
//! Pure computation: a [`UtcInstant`] in, the Moon's tropical and sidereal
//! ecliptic longitude out. No I/O and no shared state.
//!
//! ```text
//! UtcInstant ─► JD(UT) ─► +ΔT ─► JD(TT) ─► T ─► λ☾ (ELP2000-85, 60 terms)
//!                                           └─► ayanamsa(T)
//!                              sidereal = (λ☾ − ayanamsa) mod 360
//! ```

pub mod ayanamsa;
pub mod julian;
pub mod lunar;

pub use ayanamsa::{ayanamsa_deg, general_precession_deg, AyanamsaSystem};
pub use julian::{delta_t_seconds, julian_centuries, julian_day, julian_day_ut, J2000_JD};
pub use lunar::{moon_tropical_longitude, MeanElements};

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::policy::CalculationPolicyV1;
use crate::types::UtcInstant;

/// Accuracy label reported with every [`MoonPosition`].
pub const ACCURACY_LABEL: &str = "ELP2000-85 (60 terms), arc-minute";

/// Earliest year the truncated series is evaluated for.
pub const MIN_SUPPORTED_YEAR: i32 = 1000;

/// Latest year the truncated series is evaluated for.
pub const MAX_SUPPORTED_YEAR: i32 = 3000;

/// Reduce an angle in degrees to [0, 360).
pub fn normalize_360(deg: f64) -> f64 {
    let r = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if r >= 360.0 {
        0.0
    } else {
        r
    }
}

/// Errors from the pure astronomy and classification stages.
///
/// Only reachable with malformed input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EphemerisError {
    /// Instant outside the range the series is evaluated for.
    #[error("Invalid instant {instant}: supported years are {min}-{max}")]
    InvalidInstant {
        /// The rejected instant.
        instant: UtcInstant,
        /// Earliest supported year.
        min: i32,
        /// Latest supported year.
        max: i32,
    },

    /// Longitude is NaN or infinite.
    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),
}

/// The Moon's position at an instant, with the intermediate quantities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoonPosition {
    /// Geometric longitude, mean equinox of date, degrees [0, 360).
    pub tropical_longitude: f64,
    /// Ayanamsa applied, degrees.
    pub ayanamsa: f64,
    /// Sidereal longitude, degrees [0, 360).
    pub sidereal_longitude: f64,
    /// Julian date, universal time.
    pub julian_day_ut: f64,
    /// Julian date, terrestrial time.
    pub julian_day_tt: f64,
}

/// Computes lunar longitudes under a fixed ayanamsa system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LunarEngine {
    ayanamsa: AyanamsaSystem,
    apply_delta_t: bool,
}

impl Default for LunarEngine {
    fn default() -> Self {
        Self::new(AyanamsaSystem::Lahiri)
    }
}

impl LunarEngine {
    /// Engine for an ayanamsa system, with ΔT applied.
    pub fn new(ayanamsa: AyanamsaSystem) -> Self {
        Self {
            ayanamsa,
            apply_delta_t: true,
        }
    }

    /// Engine configured from a calculation policy.
    pub fn from_policy(policy: &CalculationPolicyV1) -> Self {
        Self {
            ayanamsa: policy.ayanamsa,
            apply_delta_t: policy.apply_delta_t,
        }
    }

    /// The ayanamsa system in use.
    pub fn ayanamsa_system(&self) -> AyanamsaSystem {
        self.ayanamsa
    }

    /// Full position report for an instant.
    pub fn position(&self, instant: &UtcInstant) -> Result<MoonPosition, EphemerisError> {
        let year = instant.as_datetime().year();
        if !(MIN_SUPPORTED_YEAR..=MAX_SUPPORTED_YEAR).contains(&year) {
            return Err(EphemerisError::InvalidInstant {
                instant: *instant,
                min: MIN_SUPPORTED_YEAR,
                max: MAX_SUPPORTED_YEAR,
            });
        }

        let jd_ut = julian_day_ut(instant);
        let jd_tt = if self.apply_delta_t {
            jd_ut + delta_t_seconds(julian::decimal_year(instant)) / 86_400.0
        } else {
            jd_ut
        };
        let t = julian_centuries(jd_tt);

        let tropical = moon_tropical_longitude(t);
        let ayanamsa = ayanamsa_deg(self.ayanamsa, t);

        Ok(MoonPosition {
            tropical_longitude: tropical,
            ayanamsa,
            sidereal_longitude: normalize_360(tropical - ayanamsa),
            julian_day_ut: jd_ut,
            julian_day_tt: jd_tt,
        })
    }

    /// Moon's tropical longitude in degrees [0, 360).
    pub fn tropical_longitude_of_moon(&self, instant: &UtcInstant) -> Result<f64, EphemerisError> {
        Ok(self.position(instant)?.tropical_longitude)
    }

    /// Ayanamsa in degrees at an instant.
    pub fn ayanamsa(&self, instant: &UtcInstant) -> Result<f64, EphemerisError> {
        Ok(self.position(instant)?.ayanamsa)
    }

    /// Moon's sidereal longitude in degrees [0, 360).
    pub fn sidereal_longitude(&self, instant: &UtcInstant) -> Result<f64, EphemerisError> {
        Ok(self.position(instant)?.sidereal_longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> UtcInstant {
        UtcInstant::new(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, 0)
                .unwrap()
                .and_utc(),
        )
    }

    #[test]
    fn test_normalize_360() {
        assert_eq!(normalize_360(0.0), 0.0);
        assert_eq!(normalize_360(360.0), 0.0);
        assert_eq!(normalize_360(-30.0), 330.0);
        assert_eq!(normalize_360(725.0), 5.0);
        assert!(normalize_360(-1e-17) < 360.0);
    }

    #[test]
    fn test_chennai_1990_position() {
        // 1990-08-15 14:30 IST = 09:00 UTC
        let pos = LunarEngine::default().position(&utc(1990, 8, 15, 9, 0)).unwrap();
        assert!((pos.julian_day_ut - 2_448_118.875).abs() < 1e-9);
        assert!((pos.tropical_longitude - 75.033).abs() < 0.01, "{pos:?}");
        assert!((pos.ayanamsa - 23.722).abs() < 0.01, "{pos:?}");
        assert!((pos.sidereal_longitude - 51.311).abs() < 0.01, "{pos:?}");
        // ΔT ~ 57 s
        let dt_secs = (pos.julian_day_tt - pos.julian_day_ut) * 86_400.0;
        assert!((dt_secs - 57.0).abs() < 1.0);
    }

    #[test]
    fn test_j2000_position() {
        let pos = LunarEngine::default().position(&utc(2000, 1, 1, 12, 0)).unwrap();
        assert!((pos.tropical_longitude - 223.33).abs() < 0.01, "{pos:?}");
        assert!((pos.sidereal_longitude - 199.47).abs() < 0.01, "{pos:?}");
    }

    #[test]
    fn test_delta_t_toggle() {
        let mut engine = LunarEngine::default();
        engine.apply_delta_t = false;
        let pos = engine.position(&utc(1990, 8, 15, 9, 0)).unwrap();
        assert_eq!(pos.julian_day_tt, pos.julian_day_ut);
    }

    #[test]
    fn test_ayanamsa_system_shifts_sidereal_only() {
        let instant = utc(1990, 8, 15, 9, 0);
        let lahiri = LunarEngine::new(AyanamsaSystem::Lahiri).position(&instant).unwrap();
        let raman = LunarEngine::new(AyanamsaSystem::Raman).position(&instant).unwrap();
        assert_eq!(lahiri.tropical_longitude, raman.tropical_longitude);
        let shift = raman.sidereal_longitude - lahiri.sidereal_longitude;
        assert!((shift - (23.853 - 22.370)).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_unsupported_year() {
        let far = UtcInstant::new(
            NaiveDate::from_ymd_opt(3500, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap().and_utc(),
        );
        assert!(matches!(
            LunarEngine::default().position(&far),
            Err(EphemerisError::InvalidInstant { .. })
        ));
    }

    #[test]
    fn test_accessors_agree_with_position() {
        let engine = LunarEngine::default();
        let instant = utc(1985, 3, 10, 0, 45);
        let pos = engine.position(&instant).unwrap();
        assert_eq!(engine.tropical_longitude_of_moon(&instant).unwrap(), pos.tropical_longitude);
        assert_eq!(engine.ayanamsa(&instant).unwrap(), pos.ayanamsa);
        assert_eq!(engine.sidereal_longitude(&instant).unwrap(), pos.sidereal_longitude);
    }
}
