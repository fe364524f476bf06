//! Nakshatra, Pada and Nadi types.
//!
//! The sidereal ecliptic is divided into 27 equal Nakshatras of 13°20′,
//! each split into 4 Padas of 3°20′. Every Nakshatra belongs to one of
//! three Nadis; the assignment runs in the classical zig-zag order
//! Aadi, Madhya, Antya, Antya, Madhya, Aadi (period 6), giving 9 each.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of Nakshatras in the sidereal zodiac.
pub const NAKSHATRA_COUNT: usize = 27;

/// Number of Padas in one Nakshatra.
pub const PADAS_PER_NAKSHATRA: usize = 4;

/// Span of one Nakshatra in degrees (13°20′).
pub const NAKSHATRA_SPAN_DEG: f64 = 360.0 / 27.0;

/// Span of one Pada in degrees (3°20′).
pub const PADA_SPAN_DEG: f64 = NAKSHATRA_SPAN_DEG / 4.0;

/// The 27 Nakshatras from Ashwini to Revati.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Nakshatra {
    Ashwini,
    Bharani,
    Krittika,
    Rohini,
    Mrigashira,
    Ardra,
    Punarvasu,
    Pushya,
    Ashlesha,
    Magha,
    PurvaPhalguni,
    UttaraPhalguni,
    Hasta,
    Chitra,
    Swati,
    Vishakha,
    Anuradha,
    Jyeshtha,
    Moola,
    PurvaAshadha,
    UttaraAshadha,
    Shravana,
    Dhanishta,
    Shatabhisha,
    PurvaBhadrapada,
    UttaraBhadrapada,
    Revati,
}

/// All 27 Nakshatras in zodiacal order (0 = Ashwini, 26 = Revati).
pub const ALL_NAKSHATRAS: [Nakshatra; NAKSHATRA_COUNT] = [
    Nakshatra::Ashwini,
    Nakshatra::Bharani,
    Nakshatra::Krittika,
    Nakshatra::Rohini,
    Nakshatra::Mrigashira,
    Nakshatra::Ardra,
    Nakshatra::Punarvasu,
    Nakshatra::Pushya,
    Nakshatra::Ashlesha,
    Nakshatra::Magha,
    Nakshatra::PurvaPhalguni,
    Nakshatra::UttaraPhalguni,
    Nakshatra::Hasta,
    Nakshatra::Chitra,
    Nakshatra::Swati,
    Nakshatra::Vishakha,
    Nakshatra::Anuradha,
    Nakshatra::Jyeshtha,
    Nakshatra::Moola,
    Nakshatra::PurvaAshadha,
    Nakshatra::UttaraAshadha,
    Nakshatra::Shravana,
    Nakshatra::Dhanishta,
    Nakshatra::Shatabhisha,
    Nakshatra::PurvaBhadrapada,
    Nakshatra::UttaraBhadrapada,
    Nakshatra::Revati,
];

impl Nakshatra {
    /// Look up a Nakshatra by its 0-based index.
    pub fn from_index(index: u8) -> Option<Self> {
        ALL_NAKSHATRAS.get(index as usize).copied()
    }

    /// 0-based index (Ashwini = 0 .. Revati = 26).
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ashwini => "Ashwini",
            Self::Bharani => "Bharani",
            Self::Krittika => "Krittika",
            Self::Rohini => "Rohini",
            Self::Mrigashira => "Mrigashira",
            Self::Ardra => "Ardra",
            Self::Punarvasu => "Punarvasu",
            Self::Pushya => "Pushya",
            Self::Ashlesha => "Ashlesha",
            Self::Magha => "Magha",
            Self::PurvaPhalguni => "Purva Phalguni",
            Self::UttaraPhalguni => "Uttara Phalguni",
            Self::Hasta => "Hasta",
            Self::Chitra => "Chitra",
            Self::Swati => "Swati",
            Self::Vishakha => "Vishakha",
            Self::Anuradha => "Anuradha",
            Self::Jyeshtha => "Jyeshtha",
            Self::Moola => "Moola",
            Self::PurvaAshadha => "Purva Ashadha",
            Self::UttaraAshadha => "Uttara Ashadha",
            Self::Shravana => "Shravana",
            Self::Dhanishta => "Dhanishta",
            Self::Shatabhisha => "Shatabhisha",
            Self::PurvaBhadrapada => "Purva Bhadrapada",
            Self::UttaraBhadrapada => "Uttara Bhadrapada",
            Self::Revati => "Revati",
        }
    }

    /// Sidereal longitude at which this Nakshatra begins.
    pub fn start_longitude(self) -> f64 {
        self.index() as f64 * NAKSHATRA_SPAN_DEG
    }

    /// Nadi of this Nakshatra under the classical table.
    pub fn nadi(self) -> Nadi {
        CLASSICAL_NADI_TABLE[self.index() as usize]
    }
}

impl fmt::Display for Nakshatra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The three Nadi groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Nadi {
    /// Vata (first) Nadi.
    Aadi,
    /// Pitta (middle) Nadi.
    Madhya,
    /// Kapha (last) Nadi.
    Antya,
}

impl Nadi {
    /// Display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aadi => "Aadi",
            Self::Madhya => "Madhya",
            Self::Antya => "Antya",
        }
    }

    /// Parse a Nadi name (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "aadi" | "adi" => Some(Self::Aadi),
            "madhya" => Some(Self::Madhya),
            "antya" => Some(Self::Antya),
            _ => None,
        }
    }
}

impl fmt::Display for Nadi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classical Nadi assignment, indexed by Nakshatra.
pub const CLASSICAL_NADI_TABLE: [Nadi; NAKSHATRA_COUNT] = {
    const CYCLE: [Nadi; 6] = [
        Nadi::Aadi,
        Nadi::Madhya,
        Nadi::Antya,
        Nadi::Antya,
        Nadi::Madhya,
        Nadi::Aadi,
    ];
    let mut table = [Nadi::Aadi; NAKSHATRA_COUNT];
    let mut i = 0;
    while i < NAKSHATRA_COUNT {
        table[i] = CYCLE[i % 6];
        i += 1;
    }
    table
};

/// Result of classifying a sidereal longitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NakshatraPosition {
    /// The Nakshatra.
    pub nakshatra: Nakshatra,
    /// Pada within the Nakshatra, 1-4.
    pub pada: u8,
    /// Nadi of the Nakshatra.
    pub nadi: Nadi,
    /// Degrees elapsed within the Nakshatra, [0, 13.333...).
    pub degrees_in_nakshatra: f64,
}

impl NakshatraPosition {
    /// 0-based Nakshatra index.
    pub fn nakshatra_id(&self) -> u8 {
        self.nakshatra.index()
    }
}
