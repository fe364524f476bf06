//! Offline gazetteer of major Indian cities.
//!
//! Queried first by the default provider chain so common places never hit
//! the network. Matching levels, best first:
//!
//! | Level     | Rule                                                        | Confidence |
//! |-----------|-------------------------------------------------------------|------------|
//! | exact     | whole query equals the entry's full place name              | 1.0        |
//! | city      | first comma component equals the entry's city               | 0.9        |
//! | partial   | query city is a whole-word part of the entry's city, or the | 0.6        |
//! |           | entry's city followed only by words of its state or country |            |
//!
//! Every later comma component of the query (state, country) must agree
//! with the entry's own, so "Hyderabad, Sindh, Pakistan" finds nothing here
//! and falls through to the network providers.

use async_trait::async_trait;
use tracing::debug;

use super::{GeoCandidate, GeocodingProvider, ProviderError};
use crate::types::{normalize_place_key, Coordinates};

const EXACT_CONFIDENCE: f64 = 1.0;
const CITY_CONFIDENCE: f64 = 0.9;
const PARTIAL_CONFIDENCE: f64 = 0.6;

/// Shortest query component considered for partial matching.
const MIN_PARTIAL_LEN: usize = 3;

/// One gazetteer row.
#[derive(Debug, Clone, PartialEq)]
pub struct GazetteerEntry {
    /// Full place name, e.g. "Chennai, Tamil Nadu, India".
    pub place: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// IANA zone id.
    pub zone_id: String,
}

impl GazetteerEntry {
    /// Create an entry.
    pub fn new(place: impl Into<String>, latitude: f64, longitude: f64, zone_id: impl Into<String>) -> Self {
        Self {
            place: place.into(),
            latitude,
            longitude,
            zone_id: zone_id.into(),
        }
    }

    /// Match confidence for a normalized query, if the entry matches at all.
    fn confidence_for(&self, key: &str, query: &[&str]) -> Option<f64> {
        let entry_key = normalize_place_key(&self.place);
        if entry_key == key {
            return Some(EXACT_CONFIDENCE);
        }

        let entry = components(&entry_key);
        let (city, qualifiers) = query.split_first()?;
        let (entry_city, entry_qualifiers) = entry.split_first()?;

        let agrees = |q: &&str| {
            entry_qualifiers
                .iter()
                .any(|e| contains_words(q, e) || contains_words(e, q))
        };
        if !qualifiers.iter().all(agrees) {
            return None;
        }

        if city == entry_city {
            return Some(CITY_CONFIDENCE);
        }
        if city.len() < MIN_PARTIAL_LEN {
            return None;
        }
        if contains_words(entry_city, city) {
            return Some(PARTIAL_CONFIDENCE);
        }

        // "chennai tamil nadu": the entry's city plus words of its qualifiers
        let rest = city.strip_prefix(entry_city)?;
        if !rest.starts_with(' ') {
            return None;
        }
        let qualifier_words: Vec<&str> = entry_qualifiers.iter().flat_map(|e| e.split_whitespace()).collect();
        rest.split_whitespace()
            .all(|w| qualifier_words.contains(&w))
            .then_some(PARTIAL_CONFIDENCE)
    }
}

fn components(key: &str) -> Vec<&str> {
    key.split(',').map(str::trim).filter(|c| !c.is_empty()).collect()
}

/// Whether `needle`'s words appear consecutively in `haystack`.
fn contains_words(haystack: &str, needle: &str) -> bool {
    let haystack: Vec<&str> = haystack.split_whitespace().collect();
    let needle: Vec<&str> = needle.split_whitespace().collect();
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle.as_slice())
}

const IST: &str = "Asia/Kolkata";

/// (place, latitude, longitude)
const INDIAN_CITIES: &[(&str, f64, f64)] = &[
    ("Mumbai, Maharashtra, India", 19.0760, 72.8777),
    ("Delhi, India", 28.7041, 77.1025),
    ("New Delhi, Delhi, India", 28.6139, 77.2090),
    ("Bangalore, Karnataka, India", 12.9716, 77.5946),
    ("Bengaluru, Karnataka, India", 12.9716, 77.5946),
    ("Hyderabad, Telangana, India", 17.3850, 78.4867),
    ("Chennai, Tamil Nadu, India", 13.0827, 80.2707),
    ("Kolkata, West Bengal, India", 22.5726, 88.3639),
    ("Pune, Maharashtra, India", 18.5204, 73.8567),
    ("Ahmedabad, Gujarat, India", 23.0225, 72.5714),
    ("Surat, Gujarat, India", 21.1702, 72.8311),
    ("Jaipur, Rajasthan, India", 26.9124, 75.7873),
    ("Lucknow, Uttar Pradesh, India", 26.8467, 80.9462),
    ("Kanpur, Uttar Pradesh, India", 26.4499, 80.3319),
    ("Nagpur, Maharashtra, India", 21.1458, 79.0882),
    ("Indore, Madhya Pradesh, India", 22.7196, 75.8577),
    ("Bhopal, Madhya Pradesh, India", 23.2599, 77.4126),
    ("Patna, Bihar, India", 25.5941, 85.1376),
    ("Vadodara, Gujarat, India", 22.3072, 73.1812),
    ("Coimbatore, Tamil Nadu, India", 11.0168, 76.9558),
    ("Madurai, Tamil Nadu, India", 9.9252, 78.1198),
    ("Tiruchirappalli, Tamil Nadu, India", 10.7905, 78.7047),
    ("Visakhapatnam, Andhra Pradesh, India", 17.6868, 83.2185),
    ("Vijayawada, Andhra Pradesh, India", 16.5062, 80.6480),
    ("Tirupati, Andhra Pradesh, India", 13.6288, 79.4192),
    ("Kurnool, Andhra Pradesh, India", 15.8281, 78.0373),
    ("Adoni, Andhra Pradesh, India", 15.6281, 77.2750),
    ("Mysore, Karnataka, India", 12.2958, 76.6394),
    ("Mangalore, Karnataka, India", 12.9141, 74.8560),
    ("Hubli, Karnataka, India", 15.3647, 75.1240),
    ("Kochi, Kerala, India", 9.9312, 76.2673),
    ("Thiruvananthapuram, Kerala, India", 8.5241, 76.9366),
    ("Kozhikode, Kerala, India", 11.2588, 75.7804),
    ("Warangal, Telangana, India", 17.9689, 79.5941),
    ("Bhubaneswar, Odisha, India", 20.2961, 85.8245),
    ("Guwahati, Assam, India", 26.1445, 91.7362),
    ("Chandigarh, India", 30.7333, 76.7794),
    ("Amritsar, Punjab, India", 31.6340, 74.8723),
    ("Ludhiana, Punjab, India", 30.9010, 75.8573),
    ("Varanasi, Uttar Pradesh, India", 25.3176, 82.9739),
    ("Agra, Uttar Pradesh, India", 27.1767, 78.0081),
    ("Dehradun, Uttarakhand, India", 30.3165, 78.0322),
    ("Ranchi, Jharkhand, India", 23.3441, 85.3096),
    ("Raipur, Chhattisgarh, India", 21.2514, 81.6296),
    ("Srinagar, Jammu and Kashmir, India", 34.0837, 74.7973),
    ("Panaji, Goa, India", 15.4909, 73.8278),
];

/// Offline city table.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
}

impl Default for Gazetteer {
    fn default() -> Self {
        Self::indian_cities()
    }
}

impl Gazetteer {
    /// Gazetteer over custom entries.
    pub fn new(entries: Vec<GazetteerEntry>) -> Self {
        Self { entries }
    }

    /// The built-in table of major Indian cities.
    pub fn indian_cities() -> Self {
        Self::new(
            INDIAN_CITIES
                .iter()
                .map(|(place, lat, lon)| GazetteerEntry::new(*place, *lat, *lon, IST))
                .collect(),
        )
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All matches for a query, best first.
    pub fn lookup(&self, query: &str) -> Vec<GeoCandidate> {
        let key = normalize_place_key(query);
        let parts = components(&key);
        if parts.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<(f64, &GazetteerEntry)> = self
            .entries
            .iter()
            .filter_map(|entry| entry.confidence_for(&key, &parts).map(|c| (c, entry)))
            .collect();

        // Stable sort keeps table order among equal confidences.
        matches.sort_by(|a, b| b.0.total_cmp(&a.0));

        matches
            .into_iter()
            .filter_map(|(confidence, entry)| {
                let coordinates = Coordinates::new(entry.latitude, entry.longitude)?;
                Some(GeoCandidate::new(coordinates, entry.place.clone(), confidence).with_zone(entry.zone_id.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl GeocodingProvider for Gazetteer {
    fn name(&self) -> &str {
        "gazetteer"
    }

    async fn search(&self, query: &str) -> Result<Vec<GeoCandidate>, ProviderError> {
        let found = self.lookup(query);
        debug!(query, matches = found.len(), "Gazetteer lookup");
        Ok(found)
    }
}
