//! Geocoding and timezone provider backends.
//!
//! The resolvers depend only on the two capability traits below. Backends:
//!
//! - [`Gazetteer`]: offline table of major Indian cities
//! - [`memory`]: scripted and fixed providers for tests, plus the
//!   longitude-based offset estimate
//! - `http` (feature `http`): public geocoding and timezone APIs, reached
//!   directly or through a relay via [`transport::Transport`]

pub mod gazetteer;
pub mod memory;
pub mod zone;

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub mod transport;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{Coordinates, TimePrecision};

/// Errors from a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The call did not complete within the configured timeout.
    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    /// The provider asked us to slow down.
    #[error("Provider rate limited the request")]
    RateLimited,

    /// Non-success HTTP status.
    #[error("Provider returned HTTP {status}")]
    Http {
        /// Status code.
        status: u16,
    },

    /// Connection, DNS or TLS failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response could not be interpreted.
    #[error("Malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether retrying the same provider may succeed.
    ///
    /// Timeouts, rate limits, 5xx and transport failures are transient;
    /// other 4xx statuses and malformed payloads are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited | Self::Transport(_) => true,
            Self::Http { status } => *status >= 500 || *status == 429,
            Self::Malformed(_) => false,
        }
    }
}

/// One match returned by a geocoding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoCandidate {
    /// Matched coordinates.
    pub coordinates: Coordinates,
    /// Provider's name for the match.
    pub display_name: String,
    /// Provider confidence in [0, 1].
    pub confidence: f64,
    /// IANA zone id, when the provider knows it.
    pub zone_id: Option<String>,
    /// Population, used as a tie-breaker.
    pub population: Option<u64>,
}

impl GeoCandidate {
    /// Candidate with no zone or population.
    pub fn new(coordinates: Coordinates, display_name: impl Into<String>, confidence: f64) -> Self {
        Self {
            coordinates,
            display_name: display_name.into(),
            confidence: confidence.clamp(0.0, 1.0),
            zone_id: None,
            population: None,
        }
    }

    /// Attach an IANA zone id.
    pub fn with_zone(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }

    /// Attach a population figure.
    pub fn with_population(mut self, population: u64) -> Self {
        self.population = Some(population);
        self
    }
}

/// Place name to coordinates.
///
/// An empty `Ok` result is a definitive "not found" and is never retried.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Provider name, recorded as the source of a resolved place.
    fn name(&self) -> &str;

    /// Search for a place. Candidates may be in any order.
    async fn search(&self, query: &str) -> Result<Vec<GeoCandidate>, ProviderError>;
}

/// UTC offset in effect at a place and local time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetLookup {
    /// Offset east of UTC, minutes.
    pub utc_offset_minutes: i32,
    /// IANA zone id, when known.
    pub zone_id: Option<String>,
    /// Exact when the offset is the one in effect on the date.
    pub precision: TimePrecision,
}

/// Coordinates and local time to UTC offset.
///
/// `Ok(None)` means the provider has no data for the pair.
#[async_trait]
pub trait TimezoneProvider: Send + Sync {
    /// Provider name, recorded as the source of the offset.
    fn name(&self) -> &str;

    /// Offset in effect at `coordinates` for the local wall-clock time.
    async fn lookup(
        &self,
        coordinates: Coordinates,
        local: NaiveDateTime,
    ) -> Result<Option<OffsetLookup>, ProviderError>;
}

pub use gazetteer::{Gazetteer, GazetteerEntry};
pub use memory::{
    FixedTimezoneProvider, LongitudeEstimateProvider, ScriptedGeocoder, ScriptedResponse,
    TimezoneAnswer,
};
pub use zone::offset_in_zone;

#[cfg(feature = "http")]
pub use http::{GeocodeApiProvider, NominatimProvider, PhotonProvider, TimeApiProvider};
#[cfg(feature = "http")]
pub use transport::{DirectTransport, RelayTransport, Transport, USER_AGENT};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout(Duration::from_secs(5)).is_transient());
        assert!(ProviderError::RateLimited.is_transient());
        assert!(ProviderError::Http { status: 503 }.is_transient());
        assert!(ProviderError::Http { status: 429 }.is_transient());
        assert!(ProviderError::Transport("reset".into()).is_transient());
        assert!(!ProviderError::Http { status: 404 }.is_transient());
        assert!(!ProviderError::Malformed("bad json".into()).is_transient());
    }

    #[test]
    fn test_candidate_confidence_clamped() {
        let c = Coordinates::new(13.0, 80.0).unwrap();
        assert_eq!(GeoCandidate::new(c, "x", 1.7).confidence, 1.0);
        assert_eq!(GeoCandidate::new(c, "x", -0.2).confidence, 0.0);
    }
}
