//! Birth input, absolute instants, and the derived birth profile.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::coordinates::ResolvedPlace;
use super::nakshatra::{Nadi, Nakshatra};
use crate::canonical::canonical_hash_hex;

/// Earliest accepted birth year.
pub const MIN_BIRTH_YEAR: i32 = 1900;

/// Latest accepted birth year.
pub const MAX_BIRTH_YEAR: i32 = 2100;

/// Errors from validating raw birth input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// Date is not `YYYY-MM-DD` or not a real calendar date.
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
    /// Year outside the supported range.
    #[error("Year {0} out of range (1900-2100)")]
    YearOutOfRange(i32),
    /// Time is not `HH:MM` in 24-hour form.
    #[error("Invalid time '{0}': expected HH:MM (24-hour)")]
    InvalidTime(String),
    /// Place of birth missing or too short.
    #[error("Invalid place of birth: {0}")]
    InvalidPlace(&'static str),
    /// UTC offset text not understood or out of range.
    #[error("Invalid UTC offset '{0}': expected +HH:MM or decimal hours")]
    InvalidOffset(String),
}

/// Raw, user-supplied birth details.
///
/// Never mutated; consumed to derive a [`BirthProfile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthInput {
    /// Person name (optional, display only).
    #[serde(default)]
    pub name: Option<String>,
    /// Local birth date, `YYYY-MM-DD`.
    #[serde(alias = "birthDate")]
    pub birth_date: String,
    /// Local wall-clock birth time, `HH:MM`.
    #[serde(alias = "birthTime")]
    pub birth_time: String,
    /// Free-text place of birth.
    #[serde(alias = "placeOfBirth")]
    pub place_of_birth: String,
}

impl BirthInput {
    /// Create a birth input.
    pub fn new(
        name: Option<String>,
        birth_date: impl Into<String>,
        birth_time: impl Into<String>,
        place_of_birth: impl Into<String>,
    ) -> Self {
        Self {
            name,
            birth_date: birth_date.into(),
            birth_time: birth_time.into(),
            place_of_birth: place_of_birth.into(),
        }
    }

    /// Validate and parse the raw fields.
    pub fn parse(&self) -> Result<ParsedBirthInput, InputError> {
        let date = parse_birth_date(&self.birth_date)?;
        let time = parse_birth_time(&self.birth_time)?;

        let place = self.place_of_birth.trim();
        if place.is_empty() {
            return Err(InputError::InvalidPlace("place of birth is required"));
        }
        if place.chars().count() < 2 {
            return Err(InputError::InvalidPlace("place of birth must be at least 2 characters"));
        }

        Ok(ParsedBirthInput {
            name: self.name.clone().filter(|n| !n.trim().is_empty()),
            local: NaiveDateTime::new(date, time),
            place: place.to_string(),
        })
    }
}

/// Parse a `YYYY-MM-DD` date within the supported year range.
pub fn parse_birth_date(s: &str) -> Result<NaiveDate, InputError> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| InputError::InvalidDate(s.to_string()))?;
    if !(MIN_BIRTH_YEAR..=MAX_BIRTH_YEAR).contains(&date.year()) {
        return Err(InputError::YearOutOfRange(date.year()));
    }
    Ok(date)
}

/// Parse an `HH:MM` 24-hour time.
pub fn parse_birth_time(s: &str) -> Result<NaiveTime, InputError> {
    let trimmed = s.trim();
    if trimmed.split(':').count() != 2 {
        return Err(InputError::InvalidTime(s.to_string()));
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M").map_err(|_| InputError::InvalidTime(s.to_string()))
}

/// Largest accepted UTC offset magnitude, in minutes (±14:00).
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Parse a UTC offset into minutes east of UTC.
///
/// Accepts `+05:30`, `-05:00`, `05:30:00` and decimal hours such as `5.5`
/// or `-5`.
pub fn parse_utc_offset(s: &str) -> Result<i32, InputError> {
    let invalid = || InputError::InvalidOffset(s.to_string());
    let trimmed = s.trim();
    let (sign, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if body.is_empty() || body.starts_with(['+', '-']) {
        return Err(invalid());
    }

    let minutes = if body.contains(':') {
        let mut parts = body.split(':');
        let hours: i32 = parts.next().and_then(|h| h.parse().ok()).ok_or_else(invalid)?;
        let mins: i32 = parts.next().and_then(|m| m.parse().ok()).ok_or_else(invalid)?;
        // Optional seconds component must be zero.
        if let Some(secs) = parts.next() {
            if secs.parse::<u32>().ok() != Some(0) || parts.next().is_some() {
                return Err(invalid());
            }
        }
        if !(0..60).contains(&mins) {
            return Err(invalid());
        }
        hours * 60 + mins
    } else {
        let hours: f64 = body.parse().map_err(|_| invalid())?;
        if !hours.is_finite() {
            return Err(invalid());
        }
        (hours * 60.0).round() as i32
    };

    let signed = sign * minutes;
    if signed.abs() > MAX_OFFSET_MINUTES {
        return Err(invalid());
    }
    Ok(signed)
}

/// Birth input after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBirthInput {
    /// Person name, if non-blank.
    pub name: Option<String>,
    /// Local wall-clock date and time.
    pub local: NaiveDateTime,
    /// Trimmed place text.
    pub place: String,
}

/// An absolute point in time.
///
/// Once computed the instant is never re-interpreted against another offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UtcInstant(DateTime<Utc>);

impl UtcInstant {
    /// Wrap a UTC date-time.
    pub fn new(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Instant from a naive local time and a fixed offset east of UTC.
    pub fn from_local_with_offset(local: NaiveDateTime, utc_offset_minutes: i32) -> Self {
        let utc = local - chrono::Duration::minutes(utc_offset_minutes as i64);
        Self(utc.and_utc())
    }

    /// Instant from seconds since the Unix epoch.
    pub fn from_unix_seconds(secs: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp(secs, 0).map(Self)
    }

    /// The inner UTC date-time.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for UtcInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}

/// How trustworthy a UTC offset is for the birth date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePrecision {
    /// Offset in effect on the birth date (historical rules applied).
    Exact,
    /// Present-day or estimated offset; may differ from the historical one.
    Approximate,
}

impl fmt::Display for TimePrecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Approximate => write!(f, "approximate"),
        }
    }
}

/// A local birth time resolved to an absolute instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CivilInstant {
    /// The absolute instant.
    pub instant: UtcInstant,
    /// Offset east of UTC that was applied, in minutes.
    pub utc_offset_minutes: i32,
    /// IANA zone id, when known.
    pub zone_id: Option<String>,
    /// Whether the offset is historical (exact) or approximate.
    pub precision: TimePrecision,
    /// Name of the source that supplied the offset.
    pub source: String,
}

/// Classification of one person's birth.
///
/// Created once per valid [`BirthInput`]; fully determined by the instant,
/// the coordinates, and the calculation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirthProfile {
    /// Person name, if supplied.
    pub name: Option<String>,
    /// Birth Nakshatra.
    pub nakshatra: Nakshatra,
    /// Pada within the Nakshatra, 1-4.
    pub pada: u8,
    /// Nadi of the Nakshatra.
    pub nadi: Nadi,
    /// Moon's sidereal longitude in degrees, [0, 360).
    pub sidereal_longitude: f64,
    /// Moon's tropical longitude in degrees, [0, 360).
    pub tropical_longitude: f64,
    /// Ayanamsa applied, in degrees.
    pub ayanamsa: f64,
    /// Resolved birth instant.
    pub civil_instant: CivilInstant,
    /// Resolved place of birth.
    pub place: ResolvedPlace,
    /// Params hash of the policy the profile was computed under.
    pub policy_params_hash: String,
}

impl BirthProfile {
    /// 0-based Nakshatra index (0-26).
    pub fn nakshatra_id(&self) -> u8 {
        self.nakshatra.index()
    }

    /// Nakshatra display name.
    pub fn nakshatra_name(&self) -> &'static str {
        self.nakshatra.name()
    }

    /// Display name, or "Person" when none was supplied.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Person")
    }

    /// One-line summary of the classification.
    pub fn summary(&self) -> String {
        format!(
            "{} has {} Nadi ({} Nakshatra, Pada {}).",
            self.display_name(),
            self.nadi,
            self.nakshatra,
            self.pada
        )
    }

    /// Deterministic fingerprint of the astronomical content.
    ///
    /// Excludes the name, so two people born at the same instant and place
    /// share a fingerprint.
    pub fn fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct FingerprintInput<'a> {
            nakshatra: u8,
            pada: u8,
            nadi: Nadi,
            sidereal_micro_deg: i64,
            instant: &'a UtcInstant,
            latitude_micro_deg: i64,
            longitude_micro_deg: i64,
            policy_params_hash: &'a str,
        }

        canonical_hash_hex(&FingerprintInput {
            nakshatra: self.nakshatra.index(),
            pada: self.pada,
            nadi: self.nadi,
            sidereal_micro_deg: (self.sidereal_longitude * 1e6).round() as i64,
            instant: &self.civil_instant.instant,
            latitude_micro_deg: (self.place.coordinates.latitude * 1e6).round() as i64,
            longitude_micro_deg: (self.place.coordinates.longitude * 1e6).round() as i64,
            policy_params_hash: &self.policy_params_hash,
        })
    }
}
