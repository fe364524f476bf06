//! Resolution of user-supplied place and time against external providers.
//!
//! Both resolvers absorb transient provider errors and surface only terminal
//! ones. Neither holds a lock across a provider call.

pub mod coordinates;
pub mod civil_time;

pub use coordinates::{
    rank_candidates, CoordinateResolver, Disambiguation, GeocodeError, PlaceCacheStats, ProviderAttempt,
};
pub use civil_time::{instant_from_offset, CivilTimeError, CivilTimeResolver};
