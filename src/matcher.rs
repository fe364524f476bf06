//! Nadi Dosha matching.
//!
//! Base rule: dosha is present when both profiles share a Nadi. With
//! exceptions enabled, two same-Nadi profiles in the same Nakshatra take
//! a named branch instead:
//!
//! | Same Nakshatra | Same Pada | Reason code                      | Dosha |
//! |----------------|-----------|----------------------------------|-------|
//! | no             | -         | `SAME_NADI`                      | yes   |
//! | yes            | no        | `SAME_NAKSHATRA_DIFFERENT_PADA`  | no    |
//! | yes            | yes       | `SAME_NAKSHATRA_SAME_PADA`       | yes   |
//!
//! Every branch depends only on unordered pairs of fields, so matching is
//! symmetric.

use tracing::debug;

use crate::policy::CalculationPolicyV1;
use crate::types::{BirthProfile, ReasonCode, Verdict};

/// Compares two birth profiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoshaMatcher {
    exceptions: bool,
}

impl DoshaMatcher {
    /// Matcher with exception branches enabled or disabled.
    pub fn new(exceptions: bool) -> Self {
        Self { exceptions }
    }

    /// Matcher configured from a calculation policy.
    pub fn from_policy(policy: &CalculationPolicyV1) -> Self {
        Self::new(policy.dosha_exceptions)
    }

    /// Whether exception branches are enabled.
    pub fn exceptions_enabled(&self) -> bool {
        self.exceptions
    }

    /// Produce the verdict for two profiles.
    pub fn match_profiles(&self, a: &BirthProfile, b: &BirthProfile) -> Verdict {
        let verdict = if a.nadi != b.nadi {
            Verdict {
                has_dosha: false,
                reason_code: ReasonCode::DifferentNadi,
                dosha_nadi: None,
                compatible: true,
                explanation: format!(
                    "No Nadi Dosha: {} and {} Nadis are compatible.",
                    a.nadi, b.nadi
                ),
            }
        } else if self.exceptions && a.nakshatra == b.nakshatra && a.pada != b.pada {
            Verdict {
                has_dosha: false,
                reason_code: ReasonCode::SameNakshatraDifferentPada,
                dosha_nadi: None,
                compatible: true,
                explanation: format!(
                    "Nadi Dosha cancelled: both have {} Nadi in {} Nakshatra, but in different Padas.",
                    a.nadi, a.nakshatra
                ),
            }
        } else if self.exceptions && a.nakshatra == b.nakshatra {
            Verdict {
                has_dosha: true,
                reason_code: ReasonCode::SameNakshatraSamePada,
                dosha_nadi: Some(a.nadi),
                compatible: false,
                explanation: format!(
                    "Nadi Dosha present: both have {} Nadi in the same Nakshatra ({}) and Pada ({}). Consult a practitioner.",
                    a.nadi, a.nakshatra, a.pada
                ),
            }
        } else {
            Verdict {
                has_dosha: true,
                reason_code: ReasonCode::SameNadi,
                dosha_nadi: Some(a.nadi),
                compatible: false,
                explanation: format!(
                    "Nadi Dosha present: both have {} Nadi. This combination is not recommended for marriage.",
                    a.nadi
                ),
            }
        };

        debug!(
            reason = %verdict.reason_code,
            has_dosha = verdict.has_dosha,
            "Matched profiles"
        );
        verdict
    }
}
