//! Local wall-clock birth time to an absolute instant.
//!
//! Resolution order:
//!
//! 1. the place's own zone id (from the geocoder), applied with the tz
//!    database for the birth date
//! 2. timezone providers in priority order, first answer wins
//!
//! Provider calls follow the same timeout and retry policy as geocoding:
//! transient failures are retried with backoff up to
//! `max_attempts_per_provider`, then the next provider is tried. If nothing
//! answers, the result is [`CivilTimeError::OffsetUnknown`].

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};

use crate::policy::ResolverConfig;
use crate::providers::{offset_in_zone, OffsetLookup, ProviderError, TimezoneProvider};
use crate::types::{CivilInstant, Coordinates, ResolvedPlace, TimePrecision, UtcInstant};

/// Source label when the zone id came with the resolved place.
const PLACE_ZONE_SOURCE: &str = "place-zone";

/// Terminal civil-time errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CivilTimeError {
    /// The local time cannot be represented (overflow near the calendar limits).
    #[error("Invalid local time {0}")]
    InvalidLocalTime(NaiveDateTime),

    /// No provider covers the coordinate/date pair.
    #[error("Could not determine the UTC offset at {coordinates} for {local}")]
    OffsetUnknown {
        /// Birth coordinates.
        coordinates: Coordinates,
        /// Local wall-clock time.
        local: NaiveDateTime,
    },
}

/// Converts local birth times to UTC instants.
pub struct CivilTimeResolver {
    providers: Vec<Arc<dyn TimezoneProvider>>,
    config: ResolverConfig,
}

impl CivilTimeResolver {
    /// Resolver over timezone providers in priority order.
    pub fn new(providers: Vec<Arc<dyn TimezoneProvider>>, config: ResolverConfig) -> Self {
        Self { providers, config }
    }

    /// Provider names in priority order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Resolve a local date and time at `coordinates`.
    pub async fn resolve(
        &self,
        coordinates: Coordinates,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<CivilInstant, CivilTimeError> {
        self.resolve_local(coordinates, None, NaiveDateTime::new(date, time)).await
    }

    /// Resolve a local time at a resolved place, using its zone id if any.
    pub async fn resolve_place(
        &self,
        place: &ResolvedPlace,
        local: NaiveDateTime,
    ) -> Result<CivilInstant, CivilTimeError> {
        self.resolve_local(place.coordinates, place.zone_id.as_deref(), local).await
    }

    async fn resolve_local(
        &self,
        coordinates: Coordinates,
        zone_hint: Option<&str>,
        local: NaiveDateTime,
    ) -> Result<CivilInstant, CivilTimeError> {
        if let Some(zone_id) = zone_hint {
            match offset_in_zone(zone_id, local) {
                Some(lookup) => return to_instant(local, lookup, PLACE_ZONE_SOURCE),
                None => warn!(zone_id, "Unknown zone id on resolved place, asking providers"),
            }
        }

        for provider in &self.providers {
            match self.query_provider(provider.as_ref(), coordinates, local).await {
                Ok(Some(lookup)) => return to_instant(local, lookup, provider.name()),
                Ok(None) => debug!(provider = provider.name(), "No timezone data"),
                Err(e) => warn!(provider = provider.name(), error = %e, "Timezone provider failed"),
            }
        }

        Err(CivilTimeError::OffsetUnknown { coordinates, local })
    }

    async fn query_provider(
        &self,
        provider: &dyn TimezoneProvider,
        coordinates: Coordinates,
        local: NaiveDateTime,
    ) -> Result<Option<OffsetLookup>, ProviderError> {
        let max_attempts = self.config.max_attempts_per_provider.max(1);
        let mut attempt = 1;

        loop {
            let backoff = self.config.backoff_for(attempt);
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }

            let result = match tokio::time::timeout(self.config.call_timeout, provider.lookup(coordinates, local)).await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.config.call_timeout)),
            };

            match result {
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(provider = provider.name(), attempt, error = %e, "Transient timezone error, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Build a [`CivilInstant`] from a local time and an explicit offset.
///
/// The offset is taken as given, so the precision is exact.
pub fn instant_from_offset(local: NaiveDateTime, utc_offset_minutes: i32) -> Result<CivilInstant, CivilTimeError> {
    to_instant(
        local,
        OffsetLookup {
            utc_offset_minutes,
            zone_id: None,
            precision: TimePrecision::Exact,
        },
        "explicit-offset",
    )
}

fn to_instant(local: NaiveDateTime, lookup: OffsetLookup, source: &str) -> Result<CivilInstant, CivilTimeError> {
    let utc = local
        .checked_sub_signed(chrono::Duration::minutes(lookup.utc_offset_minutes as i64))
        .ok_or(CivilTimeError::InvalidLocalTime(local))?;

    if lookup.precision == TimePrecision::Approximate {
        warn!(
            source,
            offset_minutes = lookup.utc_offset_minutes,
            "UTC offset is approximate for this date"
        );
    }

    Ok(CivilInstant {
        instant: UtcInstant::new(utc.and_utc()),
        utc_offset_minutes: lookup.utc_offset_minutes,
        zone_id: lookup.zone_id,
        precision: lookup.precision,
        source: source.to_string(),
    })
}
