//! Free-text place to a single best coordinate pair.
//!
//! ## Fallback Policy
//!
//! Providers are queried in priority order. Per provider:
//!
//! - every call is bounded by `call_timeout`; a timeout is a transient error
//! - transient errors are retried up to `max_attempts_per_provider` with
//!   doubling backoff, then the next provider is tried
//! - an empty result is a definitive "not found": never retried, next provider
//! - the first decisive match short-circuits the chain and is cached
//!
//! A match is decisive when a hint picks it, or when it is the only
//! candidate, or when it clears `min_confidence` and no distinct place ties
//! it on confidence and population.
//!
//! When the chain is exhausted the error reports the most informative outcome:
//! an ambiguous match, then a definitive not-found, then the list of failures.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::policy::ResolverConfig;
use crate::providers::{GeoCandidate, GeocodingProvider, ProviderError};
use crate::types::{normalize_place_key, Coordinates, ResolvedPlace};

/// Candidates listed in an ambiguity error.
const MAX_LISTED_CANDIDATES: usize = 5;

/// Tied candidates closer than this are the same place.
const SAME_PLACE_KM: f64 = 5.0;

/// One failed provider attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    /// Provider name.
    pub provider: String,
    /// Error message of the last attempt.
    pub error: String,
}

/// Terminal geocoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeocodeError {
    /// The place text is empty after normalization.
    #[error("Place of birth is empty")]
    EmptyQuery,

    /// A provider answered definitively that the place does not exist.
    #[error("Could not find place '{place}'")]
    PlaceNotFound {
        /// The place text.
        place: String,
    },

    /// Matches exist but none is confident enough.
    #[error("Place '{place}' is ambiguous: {}", .candidates.join("; "))]
    PlaceAmbiguous {
        /// The place text.
        place: String,
        /// Display names of the best candidates.
        candidates: Vec<String>,
    },

    /// Every provider failed without a definitive answer.
    #[error("All geocoding providers failed for '{place}' ({} failed)", .attempts.len())]
    AllProvidersFailed {
        /// The place text.
        place: String,
        /// Failure per provider.
        attempts: Vec<ProviderAttempt>,
    },
}

/// Extra information to pick among several matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disambiguation {
    /// Prefer matches whose display name mentions this region.
    Region(String),
    /// Prefer the match nearest these coordinates.
    Near(Coordinates),
}

impl Disambiguation {
    fn cache_suffix(&self) -> String {
        match self {
            Self::Region(r) => format!("|region:{}", normalize_place_key(r)),
            Self::Near(c) => format!("|near:{:.4},{:.4}", c.latitude, c.longitude),
        }
    }
}

/// Place cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaceCacheStats {
    /// Entries currently cached.
    pub len: usize,
    /// Maximum capacity.
    pub cap: usize,
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that went to providers.
    pub misses: u64,
}

/// Outcome of one provider for one query.
enum ProviderOutcome {
    Found(ResolvedPlace),
    NotFound,
    Ambiguous(Vec<String>),
    Failed(ProviderError),
}

/// Resolves place text through an ordered provider chain.
pub struct CoordinateResolver {
    providers: Vec<Arc<dyn GeocodingProvider>>,
    config: ResolverConfig,
    cache: Option<RwLock<LruCache<String, ResolvedPlace>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CoordinateResolver {
    /// Resolver over providers in priority order.
    pub fn new(providers: Vec<Arc<dyn GeocodingProvider>>, config: ResolverConfig) -> Self {
        let cache = NonZeroUsize::new(config.cache_capacity).map(|cap| RwLock::new(LruCache::new(cap)));
        Self {
            providers,
            config,
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Provider names in priority order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// The active configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve place text to coordinates.
    pub async fn resolve(&self, place: &str) -> Result<ResolvedPlace, GeocodeError> {
        self.resolve_with(place, None).await
    }

    /// Resolve place text, using `hint` to choose among several matches.
    pub async fn resolve_with(
        &self,
        place: &str,
        hint: Option<&Disambiguation>,
    ) -> Result<ResolvedPlace, GeocodeError> {
        let key = normalize_place_key(place);
        if key.is_empty() {
            return Err(GeocodeError::EmptyQuery);
        }
        let cache_key = match hint {
            Some(h) => format!("{key}{}", h.cache_suffix()),
            None => key,
        };

        if let Some(hit) = self.cache_get(&cache_key) {
            debug!(place, source = %hit.source, "Place cache hit");
            return Ok(hit);
        }

        let query = place.trim();
        let mut not_found = false;
        let mut ambiguous: Option<Vec<String>> = None;
        let mut attempts = Vec::new();

        for provider in &self.providers {
            match self.query_provider(provider.as_ref(), query, hint).await {
                ProviderOutcome::Found(resolved) => {
                    info!(
                        place = query,
                        provider = provider.name(),
                        latitude = resolved.coordinates.latitude,
                        longitude = resolved.coordinates.longitude,
                        confidence = resolved.confidence,
                        "Resolved place"
                    );
                    self.cache_put(cache_key, resolved.clone());
                    return Ok(resolved);
                }
                ProviderOutcome::NotFound => {
                    debug!(place = query, provider = provider.name(), "No match");
                    not_found = true;
                }
                ProviderOutcome::Ambiguous(candidates) => {
                    debug!(place = query, provider = provider.name(), "Ambiguous match");
                    ambiguous.get_or_insert(candidates);
                }
                ProviderOutcome::Failed(error) => {
                    warn!(place = query, provider = provider.name(), error = %error, "Provider failed");
                    attempts.push(ProviderAttempt {
                        provider: provider.name().to_string(),
                        error: error.to_string(),
                    });
                }
            }
        }

        let place = query.to_string();
        Err(match (ambiguous, not_found) {
            (Some(candidates), _) => GeocodeError::PlaceAmbiguous { place, candidates },
            (None, true) => GeocodeError::PlaceNotFound { place },
            (None, false) => GeocodeError::AllProvidersFailed { place, attempts },
        })
    }

    async fn query_provider(
        &self,
        provider: &dyn GeocodingProvider,
        query: &str,
        hint: Option<&Disambiguation>,
    ) -> ProviderOutcome {
        let max_attempts = self.config.max_attempts_per_provider.max(1);
        let mut attempt = 1;

        loop {
            let backoff = self.config.backoff_for(attempt);
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }

            debug!(provider = provider.name(), attempt, "Geocoding attempt");
            let result = match tokio::time::timeout(self.config.call_timeout, provider.search(query)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.config.call_timeout)),
            };

            match result {
                Ok(candidates) if candidates.is_empty() => return ProviderOutcome::NotFound,
                Ok(candidates) => return self.select(provider.name(), query, candidates, hint),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(provider = provider.name(), attempt, error = %e, "Transient provider error, retrying");
                    attempt += 1;
                }
                Err(e) => return ProviderOutcome::Failed(e),
            }
        }
    }

    fn select(
        &self,
        source: &str,
        query: &str,
        mut candidates: Vec<GeoCandidate>,
        hint: Option<&Disambiguation>,
    ) -> ProviderOutcome {
        rank_candidates(&mut candidates);

        let chosen = match hint {
            Some(Disambiguation::Region(region)) => {
                let region = normalize_place_key(region);
                candidates
                    .iter()
                    .find(|c| normalize_place_key(&c.display_name).contains(&region))
                    .or_else(|| candidates.first())
            }
            Some(Disambiguation::Near(origin)) => candidates
                .iter()
                .min_by(|a, b| origin.distance_km(&a.coordinates).total_cmp(&origin.distance_km(&b.coordinates))),
            None => {
                let best = &candidates[0];
                let low = best.confidence < self.config.min_confidence && candidates.len() > 1;
                let tied = candidates.get(1).is_some_and(|second| is_tie(best, second));
                if low || tied {
                    let names = candidates
                        .iter()
                        .take(MAX_LISTED_CANDIDATES)
                        .map(|c| c.display_name.clone())
                        .collect();
                    debug!(place = query, best = best.confidence, tied, "No single best match");
                    return ProviderOutcome::Ambiguous(names);
                }
                Some(best)
            }
        };

        match chosen {
            Some(c) => ProviderOutcome::Found(ResolvedPlace {
                coordinates: c.coordinates,
                display_name: c.display_name.clone(),
                zone_id: c.zone_id.clone(),
                source: source.to_string(),
                confidence: c.confidence,
            }),
            None => ProviderOutcome::NotFound,
        }
    }

    fn cache_get(&self, key: &str) -> Option<ResolvedPlace> {
        let cache = self.cache.as_ref()?;
        let hit = cache.read().peek(key).cloned();
        match hit {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        hit
    }

    fn cache_put(&self, key: String, place: ResolvedPlace) {
        if let Some(cache) = &self.cache {
            cache.write().put(key, place);
        }
    }

    /// Cache statistics, or `None` when caching is disabled.
    pub fn cache_stats(&self) -> Option<PlaceCacheStats> {
        self.cache.as_ref().map(|cache| {
            let cache = cache.read();
            PlaceCacheStats {
                len: cache.len(),
                cap: cache.cap().get(),
                hits: self.hits.load(Ordering::Relaxed),
                misses: self.misses.load(Ordering::Relaxed),
            }
        })
    }

    /// Drop all cached places.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.write().clear();
        }
    }
}

/// Two distinct places that confidence and population cannot separate.
fn is_tie(a: &GeoCandidate, b: &GeoCandidate) -> bool {
    (a.confidence - b.confidence).abs() < 1e-9
        && a.population == b.population
        && a.coordinates.distance_km(&b.coordinates) > SAME_PLACE_KM
}

/// Order candidates best first: confidence, then population, then name.
pub fn rank_candidates(candidates: &mut [GeoCandidate]) {
    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.population.unwrap_or(0).cmp(&a.population.unwrap_or(0)))
            .then_with(|| a.display_name.cmp(&b.display_name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Gazetteer, GazetteerEntry, ScriptedGeocoder, ScriptedResponse};
    use std::time::Duration;

    fn candidate(name: &str, lat: f64, lon: f64, confidence: f64) -> GeoCandidate {
        GeoCandidate::new(Coordinates::new(lat, lon).unwrap(), name, confidence)
    }

    fn chennai() -> GeoCandidate {
        candidate("Chennai, Tamil Nadu, India", 13.0827, 80.2707, 0.9)
    }

    fn resolver(providers: Vec<Arc<dyn GeocodingProvider>>) -> CoordinateResolver {
        CoordinateResolver::new(providers, ResolverConfig::fast())
    }

    #[tokio::test]
    async fn test_gazetteer_resolves_chennai() {
        let r = resolver(vec![Arc::new(Gazetteer::default())]);
        let place = r.resolve("Chennai, India").await.unwrap();
        assert!((place.coordinates.latitude - 13.08).abs() < 0.01);
        assert!((place.coordinates.longitude - 80.27).abs() < 0.01);
        assert_eq!(place.source, "gazetteer");
        assert_eq!(place.zone_id.as_deref(), Some("Asia/Kolkata"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_through_to_next_provider() {
        let slow = Arc::new(ScriptedGeocoder::new("slow").always(ScriptedResponse::Delayed(
            Duration::from_secs(60),
            Box::new(ScriptedResponse::Candidates(vec![chennai()])),
        )));
        let fast = Arc::new(ScriptedGeocoder::returning("fast", chennai()));
        let r = resolver(vec![slow.clone(), fast.clone()]);

        let place = r.resolve("Chennai").await.unwrap();
        assert_eq!(place.source, "fast");
        // Timeout is transient: retried once before falling through.
        assert_eq!(slow.calls(), 2);
        assert_eq!(fast.calls(), 1);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let empty = Arc::new(ScriptedGeocoder::new("empty"));
        let r = resolver(vec![empty.clone()]);
        let err = r.resolve("Atlantis").await.unwrap_err();
        assert_eq!(err, GeocodeError::PlaceNotFound { place: "Atlantis".into() });
        assert_eq!(empty.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_empty_is_place_not_found() {
        let r = resolver(vec![
            Arc::new(ScriptedGeocoder::new("a")),
            Arc::new(ScriptedGeocoder::new("b")),
        ]);
        assert!(matches!(r.resolve("Atlantis").await, Err(GeocodeError::PlaceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_all_failing_is_all_providers_failed() {
        let r = resolver(vec![
            Arc::new(ScriptedGeocoder::failing("a", ProviderError::Http { status: 503 })),
            Arc::new(ScriptedGeocoder::failing("b", ProviderError::Malformed("html".into()))),
        ]);
        match r.resolve("Chennai").await {
            Err(GeocodeError::AllProvidersFailed { attempts, .. }) => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].provider, "a");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_not_found_beats_failures() {
        let r = resolver(vec![
            Arc::new(ScriptedGeocoder::failing("down", ProviderError::Transport("refused".into()))),
            Arc::new(ScriptedGeocoder::new("empty")),
        ]);
        assert!(matches!(r.resolve("Atlantis").await, Err(GeocodeError::PlaceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_transient_retry_then_success() {
        let flaky = Arc::new(
            ScriptedGeocoder::returning("flaky", chennai())
                .then(ScriptedResponse::Fail(ProviderError::RateLimited)),
        );
        let r = resolver(vec![flaky.clone()]);
        assert_eq!(r.resolve("Chennai").await.unwrap().source, "flaky");
        assert_eq!(flaky.calls(), 2);
    }

    #[tokio::test]
    async fn test_terminal_error_not_retried() {
        let broken = Arc::new(ScriptedGeocoder::failing("broken", ProviderError::Http { status: 400 }));
        let r = resolver(vec![broken.clone()]);
        assert!(r.resolve("Chennai").await.is_err());
        assert_eq!(broken.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_providers() {
        let provider = Arc::new(ScriptedGeocoder::returning("p", chennai()));
        let r = resolver(vec![provider.clone()]);

        r.resolve("Chennai,  India").await.unwrap();
        r.resolve("  chennai, india").await.unwrap();

        assert_eq!(provider.calls(), 1);
        let stats = r.cache_stats().unwrap();
        assert_eq!(stats.len, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_provider_call() {
        let provider = Arc::new(ScriptedGeocoder::returning("p", chennai()));
        let r = resolver(vec![provider.clone()]);

        r.resolve("Chennai").await.unwrap();
        r.clear_cache();
        assert_eq!(r.cache_stats().unwrap().len, 0);

        r.resolve("Chennai").await.unwrap();
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let provider = Arc::new(
            ScriptedGeocoder::returning("p", chennai())
                .then(ScriptedResponse::Candidates(Vec::new())),
        );
        let r = resolver(vec![provider.clone()]);
        assert!(r.resolve("Chennai").await.is_err());
        assert!(r.resolve("Chennai").await.is_ok());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_low_confidence_is_ambiguous() {
        let provider = Arc::new(ScriptedGeocoder::new("p").always(ScriptedResponse::Candidates(vec![
            candidate("Springfield, Illinois", 39.78, -89.65, 0.3),
            candidate("Springfield, Massachusetts", 42.10, -72.59, 0.3),
        ])));
        let r = resolver(vec![provider]);
        match r.resolve("Springfield").await {
            Err(GeocodeError::PlaceAmbiguous { candidates, .. }) => assert_eq!(candidates.len(), 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disambiguation_by_region_and_proximity() {
        let provider = Arc::new(ScriptedGeocoder::new("p").always(ScriptedResponse::Candidates(vec![
            candidate("Springfield, Illinois", 39.78, -89.65, 0.3),
            candidate("Springfield, Massachusetts", 42.10, -72.59, 0.3),
        ])));
        let r = resolver(vec![provider]);

        let hint = Disambiguation::Region("massachusetts".into());
        let place = r.resolve_with("Springfield", Some(&hint)).await.unwrap();
        assert_eq!(place.display_name, "Springfield, Massachusetts");

        let boston = Coordinates::new(42.36, -71.06).unwrap();
        let place = r.resolve_with("Springfield", Some(&Disambiguation::Near(boston))).await.unwrap();
        assert_eq!(place.display_name, "Springfield, Massachusetts");

        let chicago = Coordinates::new(41.88, -87.63).unwrap();
        let place = r.resolve_with("Springfield", Some(&Disambiguation::Near(chicago))).await.unwrap();
        assert_eq!(place.display_name, "Springfield, Illinois");
    }

    #[tokio::test]
    async fn test_tied_best_candidates_are_ambiguous() {
        let gazetteer = Gazetteer::new(vec![
            GazetteerEntry::new("Aurangabad, Maharashtra, India", 19.8762, 75.3433, "Asia/Kolkata"),
            GazetteerEntry::new("Aurangabad, Bihar, India", 24.7521, 84.3742, "Asia/Kolkata"),
        ]);
        let r = resolver(vec![Arc::new(gazetteer)]);

        match r.resolve("Aurangabad").await {
            Err(GeocodeError::PlaceAmbiguous { candidates, .. }) => {
                assert_eq!(candidates, ["Aurangabad, Bihar, India", "Aurangabad, Maharashtra, India"]);
            }
            other => panic!("unexpected: {other:?}"),
        }

        let place = r.resolve("Aurangabad, Bihar").await.unwrap();
        assert_eq!(place.display_name, "Aurangabad, Bihar, India");

        let hint = Disambiguation::Region("maharashtra".into());
        let place = r.resolve_with("Aurangabad", Some(&hint)).await.unwrap();
        assert_eq!(place.display_name, "Aurangabad, Maharashtra, India");
    }

    #[tokio::test]
    async fn test_tie_broken_by_population_or_same_place() {
        let provider = Arc::new(ScriptedGeocoder::new("p").always(ScriptedResponse::Candidates(vec![
            candidate("Bangalore, India", 12.9716, 77.5946, 0.8),
            candidate("Bengaluru, India", 12.9716, 77.5946, 0.8),
        ])));
        assert!(resolver(vec![provider]).resolve("Bangalore").await.is_ok());

        let provider = Arc::new(ScriptedGeocoder::new("p").always(ScriptedResponse::Candidates(vec![
            candidate("Springfield, Illinois", 39.78, -89.65, 0.8).with_population(114_000),
            candidate("Springfield, Missouri", 37.21, -93.29, 0.8).with_population(169_000),
        ])));
        let place = resolver(vec![provider]).resolve("Springfield").await.unwrap();
        assert_eq!(place.display_name, "Springfield, Missouri");
    }

    #[tokio::test]
    async fn test_single_low_confidence_candidate_is_accepted() {
        let provider = Arc::new(ScriptedGeocoder::returning(
            "p",
            candidate("Adoni, India", 15.6281, 77.2750, 0.2),
        ));
        assert!(resolver(vec![provider]).resolve("Adoni").await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_query() {
        let r = resolver(vec![Arc::new(Gazetteer::default())]);
        assert_eq!(r.resolve("   ").await, Err(GeocodeError::EmptyQuery));
    }

    #[test]
    fn test_rank_candidates() {
        let mut c = vec![
            candidate("B", 0.0, 0.0, 0.5).with_population(10),
            candidate("A", 0.0, 0.0, 0.5).with_population(10),
            candidate("C", 0.0, 0.0, 0.5).with_population(99),
            candidate("D", 0.0, 0.0, 0.9),
        ];
        rank_candidates(&mut c);
        let names: Vec<_> = c.iter().map(|c| c.display_name.as_str()).collect();
        assert_eq!(names, ["D", "C", "A", "B"]);
    }
}
