//! Compatibility verdicts.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::birth::BirthProfile;
use super::nakshatra::Nadi;

/// Which rule branch produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// Both share a Nadi: dosha present.
    SameNadi,
    /// Nadis differ: no dosha.
    DifferentNadi,
    /// Same Nakshatra, different Pada: dosha cancelled (exception branch).
    SameNakshatraDifferentPada,
    /// Same Nakshatra and Pada: dosha retained, flagged as neutral (exception branch).
    SameNakshatraSamePada,
}

impl ReasonCode {
    /// Stable machine-readable code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SameNadi => "SAME_NADI",
            Self::DifferentNadi => "DIFFERENT_NADI",
            Self::SameNakshatraDifferentPada => "SAME_NAKSHATRA_DIFFERENT_PADA",
            Self::SameNakshatraSamePada => "SAME_NAKSHATRA_SAME_PADA",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of matching two birth profiles.
///
/// Stateless and recomputable from the two profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether Nadi Dosha is present.
    pub has_dosha: bool,
    /// Rule branch that decided the verdict.
    pub reason_code: ReasonCode,
    /// The shared Nadi, when dosha is present.
    pub dosha_nadi: Option<Nadi>,
    /// Inverse of `has_dosha`.
    pub compatible: bool,
    /// Human-readable explanation.
    pub explanation: String,
}

/// Which person of a two-person request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Person {
    /// The first person.
    First,
    /// The second person.
    Second,
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "person 1"),
            Self::Second => write!(f, "person 2"),
        }
    }
}

/// Two profiles and the verdict derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// First person's profile.
    pub first: BirthProfile,
    /// Second person's profile.
    pub second: BirthProfile,
    /// The compatibility verdict.
    pub verdict: Verdict,
}
