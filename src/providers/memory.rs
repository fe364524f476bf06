//! In-memory providers.
//!
//! [`ScriptedGeocoder`] and [`FixedTimezoneProvider`] replay canned answers
//! for tests and offline use. [`LongitudeEstimateProvider`] is the
//! last-resort timezone source of the default chain.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::Mutex;

use super::zone::offset_in_zone;
use super::{GeoCandidate, GeocodingProvider, OffsetLookup, ProviderError, TimezoneProvider};
use crate::types::{Coordinates, TimePrecision};

/// One canned geocoder answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedResponse {
    /// Return these candidates (empty = not found).
    Candidates(Vec<GeoCandidate>),
    /// Fail with this error.
    Fail(ProviderError),
    /// Sleep, then answer.
    Delayed(Duration, Box<ScriptedResponse>),
}

/// Geocoder that replays a script of responses.
///
/// Each call pops the next scripted response; once the script is empty the
/// `fallback` answer repeats.
#[derive(Debug)]
pub struct ScriptedGeocoder {
    name: String,
    script: Mutex<VecDeque<ScriptedResponse>>,
    fallback: ScriptedResponse,
    calls: AtomicUsize,
}

impl ScriptedGeocoder {
    /// Geocoder that finds nothing until scripted otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: ScriptedResponse::Candidates(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Geocoder that always returns one candidate.
    pub fn returning(name: impl Into<String>, candidate: GeoCandidate) -> Self {
        Self::new(name).always(ScriptedResponse::Candidates(vec![candidate]))
    }

    /// Geocoder that always fails.
    pub fn failing(name: impl Into<String>, error: ProviderError) -> Self {
        Self::new(name).always(ScriptedResponse::Fail(error))
    }

    /// Set the answer used once the script is exhausted.
    pub fn always(mut self, response: ScriptedResponse) -> Self {
        self.fallback = response;
        self
    }

    /// Append a response to the script.
    pub fn then(self, response: ScriptedResponse) -> Self {
        self.script.lock().push_back(response);
        self
    }

    /// Number of `search` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeocodingProvider for ScriptedGeocoder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str) -> Result<Vec<GeoCandidate>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut response = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        loop {
            match response {
                ScriptedResponse::Candidates(c) => return Ok(c),
                ScriptedResponse::Fail(e) => return Err(e),
                ScriptedResponse::Delayed(d, next) => {
                    tokio::time::sleep(d).await;
                    response = *next;
                }
            }
        }
    }
}

/// Canned timezone answer.
#[derive(Debug, Clone, PartialEq)]
pub enum TimezoneAnswer {
    /// Apply this IANA zone to the local time.
    Zone(String),
    /// A fixed offset in minutes with the given precision.
    Offset(i32, TimePrecision),
    /// No data.
    Unknown,
    /// Fail with this error.
    Fail(ProviderError),
}

/// Timezone provider with a fixed answer for every coordinate.
///
/// Scripted answers added with [`FixedTimezoneProvider::then`] are served
/// first, one per call.
#[derive(Debug)]
pub struct FixedTimezoneProvider {
    name: String,
    answer: TimezoneAnswer,
    script: Mutex<VecDeque<TimezoneAnswer>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FixedTimezoneProvider {
    /// Provider with a fixed answer.
    pub fn new(name: impl Into<String>, answer: TimezoneAnswer) -> Self {
        Self {
            name: name.into(),
            answer,
            script: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Append a one-off answer to the script.
    pub fn then(self, answer: TimezoneAnswer) -> Self {
        self.script.lock().push_back(answer);
        self
    }

    /// Sleep this long before every answer.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Provider that always applies `zone_id`.
    pub fn zone(zone_id: impl Into<String>) -> Self {
        Self::new("fixed-zone", TimezoneAnswer::Zone(zone_id.into()))
    }

    /// Number of `lookup` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TimezoneProvider for FixedTimezoneProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(
        &self,
        _coordinates: Coordinates,
        local: NaiveDateTime,
    ) -> Result<Option<OffsetLookup>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.script.lock().pop_front().unwrap_or_else(|| self.answer.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match answer {
            TimezoneAnswer::Zone(zone_id) => Ok(offset_in_zone(&zone_id, local)),
            TimezoneAnswer::Offset(minutes, precision) => Ok(Some(OffsetLookup {
                utc_offset_minutes: minutes,
                zone_id: None,
                precision,
            })),
            TimezoneAnswer::Unknown => Ok(None),
            TimezoneAnswer::Fail(e) => Err(e),
        }
    }
}

/// Mean solar time offset from longitude: 4 minutes per degree.
///
/// Civil zones can differ from this by an hour or more, so results are
/// always [`TimePrecision::Approximate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LongitudeEstimateProvider;

impl LongitudeEstimateProvider {
    /// Estimated offset in minutes east of UTC.
    pub fn estimate_minutes(longitude: f64) -> i32 {
        (longitude * 4.0).round() as i32
    }
}

#[async_trait]
impl TimezoneProvider for LongitudeEstimateProvider {
    fn name(&self) -> &str {
        "longitude-estimate"
    }

    async fn lookup(
        &self,
        coordinates: Coordinates,
        _local: NaiveDateTime,
    ) -> Result<Option<OffsetLookup>, ProviderError> {
        Ok(Some(OffsetLookup {
            utc_offset_minutes: Self::estimate_minutes(coordinates.longitude),
            zone_id: None,
            precision: TimePrecision::Approximate,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn chennai() -> GeoCandidate {
        GeoCandidate::new(Coordinates::new(13.0827, 80.2707).unwrap(), "Chennai", 0.9)
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(1990, 8, 15).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let geocoder = ScriptedGeocoder::returning("p", chennai())
            .then(ScriptedResponse::Fail(ProviderError::RateLimited));

        assert_eq!(geocoder.search("x").await, Err(ProviderError::RateLimited));
        assert_eq!(geocoder.search("x").await.unwrap().len(), 1);
        assert_eq!(geocoder.search("x").await.unwrap().len(), 1);
        assert_eq!(geocoder.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_response() {
        let geocoder = ScriptedGeocoder::new("slow").always(ScriptedResponse::Delayed(
            Duration::from_secs(10),
            Box::new(ScriptedResponse::Candidates(vec![chennai()])),
        ));
        let start = tokio::time::Instant::now();
        let found = geocoder.search("x").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_fixed_zone_provider() {
        let provider = FixedTimezoneProvider::zone("Asia/Kolkata");
        let coords = Coordinates::new(13.0827, 80.2707).unwrap();
        let lookup = provider.lookup(coords, noon()).await.unwrap().unwrap();
        assert_eq!(lookup.utc_offset_minutes, 330);
        assert_eq!(lookup.precision, TimePrecision::Exact);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_timezone_script_then_fixed_answer() {
        let provider = FixedTimezoneProvider::zone("Asia/Kolkata").then(TimezoneAnswer::Unknown);
        let coords = Coordinates::new(13.0827, 80.2707).unwrap();
        assert_eq!(provider.lookup(coords, noon()).await, Ok(None));
        assert!(provider.lookup(coords, noon()).await.unwrap().is_some());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_longitude_estimate() {
        assert_eq!(LongitudeEstimateProvider::estimate_minutes(80.2707), 321);
        assert_eq!(LongitudeEstimateProvider::estimate_minutes(-74.006), -296);
        let coords = Coordinates::new(13.0827, 80.2707).unwrap();
        let lookup = LongitudeEstimateProvider.lookup(coords, noon()).await.unwrap().unwrap();
        assert_eq!(lookup.precision, TimePrecision::Approximate);
    }
}
