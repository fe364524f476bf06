//! # nadi-kernel
//!
//! Deterministic Nakshatra, Pada and Nadi classification from birth details,
//! and Nadi Dosha matching between two people.
//!
//! The kernel answers one question:
//!
//! > Given two births (date, local time, place), do they share a Nadi?
//!
//! ## Core Contract
//!
//! 1. Resolve the place of birth to coordinates and the local time to an
//!    absolute instant, using the offset in force on the birth date
//! 2. Compute the Moon's sidereal longitude at that instant
//! 3. Classify the longitude into Nakshatra, Pada and Nadi
//! 4. Match two profiles into a [`Verdict`] with a reason code
//!
//! ## Architecture
//!
//! ```text
//! BirthInput → CoordinateResolver → CivilTimeResolver → LunarEngine → NakshatraClassifier → BirthProfile
//!                    ↓                     ↓
//!           GeocodingProvider*    TimezoneProvider*        (BirthProfile, BirthProfile) → DoshaMatcher → Verdict
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same instant + same coordinates + same policy → identical profile
//! - Verdicts depend only on the two profiles and the policy
//! - Every profile carries the params hash of the policy that produced it

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod canonical;
pub mod ephemeris;
pub mod classifier;
pub mod matcher;
pub mod policy;
pub mod providers;
pub mod resolver;
pub mod pipeline;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    BirthInput, BirthProfile, CivilInstant, Comparison, Coordinates, InputError, Nadi, Nakshatra,
    NakshatraPosition, Person, ReasonCode, ResolvedPlace, TimePrecision, UtcInstant, Verdict,
};
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex};
pub use ephemeris::{AyanamsaSystem, EphemerisError, LunarEngine, MoonPosition};
pub use classifier::NakshatraClassifier;
pub use matcher::DoshaMatcher;
pub use policy::{CalculationPolicyV1, NadiTableVersion, ResolverConfig};
pub use providers::{GeoCandidate, GeocodingProvider, OffsetLookup, ProviderError, TimezoneProvider};
pub use resolver::{CivilTimeError, CivilTimeResolver, CoordinateResolver, Disambiguation, GeocodeError};
pub use pipeline::{BirthProfilePipeline, PipelineError, Stage};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Schema version for all kernel response types.
/// Increment on breaking changes to any schema type.
pub const NADI_KERNEL_SCHEMA_VERSION: &str = "1.0.0";

/// Default policy version identifier.
pub const DEFAULT_POLICY_VERSION: &str = "nadi_policy_v1";
