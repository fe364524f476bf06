//! CalculationPolicy v1: the constants that decide classification outcomes.
//!
//! ## Float Normalization for Deterministic Hashing
//!
//! Floats are quantized to integers before hashing (see
//! [`crate::canonical::quantize`]), so `params_hash` is identical across
//! platforms and serde_json versions.

use serde::{Deserialize, Serialize};

use crate::canonical::{canonical_hash_hex, quantize};
use crate::ephemeris::AyanamsaSystem;
use crate::types::{Nadi, Nakshatra, CLASSICAL_NADI_TABLE, NAKSHATRA_COUNT};
use crate::DEFAULT_POLICY_VERSION;

/// Versioned Nakshatra-to-Nadi assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NadiTableVersion {
    /// Classical zig-zag order over 27 Nakshatras, 9 per Nadi.
    #[default]
    Classical27,
}

impl NadiTableVersion {
    /// The table for this version.
    pub fn table(self) -> &'static [Nadi; NAKSHATRA_COUNT] {
        match self {
            Self::Classical27 => &CLASSICAL_NADI_TABLE,
        }
    }

    /// Nadi of a Nakshatra under this table.
    pub fn nadi_of(self, nakshatra: Nakshatra) -> Nadi {
        self.table()[nakshatra.index() as usize]
    }
}

/// Quantized policy parameters for deterministic hashing.
#[derive(Serialize)]
struct QuantizedPolicyParams<'a> {
    version: &'a str,
    ayanamsa: AyanamsaSystem,
    ayanamsa_j2000: i64,
    nadi_table: NadiTableVersion,
    boundary_epsilon: i64,
    apply_delta_t: bool,
    dosha_exceptions: bool,
}

/// Calculation policy version 1.
///
/// ## Parameters
///
/// - `ayanamsa`: sidereal reference system
/// - `nadi_table`: Nakshatra-to-Nadi assignment
/// - `boundary_epsilon`: tolerance in Pada units absorbing float error at
///   exact boundaries, so a boundary longitude lands in the Pada it begins
/// - `apply_delta_t`: evaluate the lunar series in TT rather than UT
/// - `dosha_exceptions`: enable the same-Nakshatra rule branches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationPolicyV1 {
    /// Policy version identifier.
    pub version: String,
    /// Sidereal reference system.
    pub ayanamsa: AyanamsaSystem,
    /// Nakshatra-to-Nadi table.
    pub nadi_table: NadiTableVersion,
    /// Boundary tolerance in Pada units.
    pub boundary_epsilon: f64,
    /// Apply ΔT (TT − UT) before evaluating the series.
    pub apply_delta_t: bool,
    /// Enable Nadi Dosha exception branches.
    pub dosha_exceptions: bool,
}

impl Default for CalculationPolicyV1 {
    fn default() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            ayanamsa: AyanamsaSystem::Lahiri,
            nadi_table: NadiTableVersion::Classical27,
            boundary_epsilon: 1e-9,
            apply_delta_t: true,
            dosha_exceptions: false,
        }
    }
}

impl CalculationPolicyV1 {
    /// Default policy with a different ayanamsa system.
    pub fn with_ayanamsa(ayanamsa: AyanamsaSystem) -> Self {
        Self {
            ayanamsa,
            ..Self::default()
        }
    }

    /// Get the policy ID.
    pub fn policy_id(&self) -> &str {
        &self.version
    }

    /// Hash of the policy parameters.
    ///
    /// Includes the ayanamsa reference value, so changing a system's
    /// constant changes the hash even if the enum variant does not.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(&QuantizedPolicyParams {
            version: &self.version,
            ayanamsa: self.ayanamsa,
            ayanamsa_j2000: quantize(self.ayanamsa.reference_j2000_deg()),
            nadi_table: self.nadi_table,
            boundary_epsilon: quantize(self.boundary_epsilon),
            apply_delta_t: self.apply_delta_t,
            dosha_exceptions: self.dosha_exceptions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = CalculationPolicyV1::default();
        assert_eq!(policy.policy_id(), "nadi_policy_v1");
        assert_eq!(policy.ayanamsa, AyanamsaSystem::Lahiri);
        assert!(policy.apply_delta_t);
        assert!(!policy.dosha_exceptions);
    }

    #[test]
    fn test_policy_params_hash_determinism() {
        assert_eq!(
            CalculationPolicyV1::default().params_hash(),
            CalculationPolicyV1::default().params_hash()
        );
    }

    #[test]
    fn test_policy_params_hash_changes() {
        let base = CalculationPolicyV1::default();
        let raman = CalculationPolicyV1::with_ayanamsa(AyanamsaSystem::Raman);
        assert_ne!(base.params_hash(), raman.params_hash());

        let mut exceptions = CalculationPolicyV1::default();
        exceptions.dosha_exceptions = true;
        assert_ne!(base.params_hash(), exceptions.params_hash());

        let mut epsilon = CalculationPolicyV1::default();
        epsilon.boundary_epsilon = 1e-6;
        assert_ne!(base.params_hash(), epsilon.params_hash());
    }

    #[test]
    fn test_nadi_table_lookup() {
        let table = NadiTableVersion::Classical27;
        assert_eq!(table.nadi_of(Nakshatra::Ashwini), Nadi::Aadi);
        assert_eq!(table.nadi_of(Nakshatra::Rohini), Nadi::Antya);
        assert_eq!(table.nadi_of(Nakshatra::Revati), Nadi::Antya);
    }

    #[test]
    fn test_policy_serde_round_trip() {
        let policy = CalculationPolicyV1::with_ayanamsa(AyanamsaSystem::FaganBradley);
        let json = serde_json::to_string(&policy).unwrap();
        assert!(json.contains("\"fagan_bradley\""));
        let back: CalculationPolicyV1 = serde_json::from_str(&json).unwrap();
        assert_eq!(back.params_hash(), policy.params_hash());
    }
}
