//! Core types for the Nadi kernel.

pub mod coordinates;
pub mod birth;
pub mod nakshatra;
pub mod verdict;

pub use coordinates::{Coordinates, ResolvedPlace, normalize_place_key};
pub use birth::{
    BirthInput, ParsedBirthInput, InputError, UtcInstant, CivilInstant, TimePrecision,
    BirthProfile, parse_birth_date, parse_birth_time, parse_utc_offset, MIN_BIRTH_YEAR, MAX_BIRTH_YEAR,
};
pub use nakshatra::{
    Nakshatra, Nadi, NakshatraPosition, ALL_NAKSHATRAS, CLASSICAL_NADI_TABLE,
    NAKSHATRA_COUNT, PADAS_PER_NAKSHATRA, NAKSHATRA_SPAN_DEG, PADA_SPAN_DEG,
};
pub use verdict::{Verdict, ReasonCode, Person, Comparison};
