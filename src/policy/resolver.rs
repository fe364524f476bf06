//! Retry, timeout and cache settings shared by the place and civil-time resolvers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resolver configuration.
///
/// Provider priority is the order providers are passed to the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Timeout for a single provider call.
    #[serde(with = "duration_ms")]
    pub call_timeout: Duration,
    /// Attempts per provider before falling through (transient errors only).
    pub max_attempts_per_provider: u32,
    /// Backoff before the second attempt; doubles per attempt.
    #[serde(with = "duration_ms")]
    pub backoff_base: Duration,
    /// Place cache capacity (entries).
    pub cache_capacity: usize,
    /// Below this confidence, multiple candidates are treated as ambiguous.
    pub min_confidence: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            max_attempts_per_provider: 2,
            backoff_base: Duration::from_millis(200),
            cache_capacity: 1024,
            min_confidence: 0.5,
        }
    }
}

impl ResolverConfig {
    /// Load from environment, falling back to defaults per variable.
    ///
    /// Reads `GEOCODE_TIMEOUT_MS`, `GEOCODE_MAX_ATTEMPTS`,
    /// `GEOCODE_BACKOFF_MS`, `PLACE_CACHE_CAPACITY` and
    /// `GEOCODE_MIN_CONFIDENCE`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            call_timeout: parse("GEOCODE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.call_timeout),
            max_attempts_per_provider: parse("GEOCODE_MAX_ATTEMPTS")
                .map(|n| n.clamp(1, 10) as u32)
                .unwrap_or(defaults.max_attempts_per_provider),
            backoff_base: parse("GEOCODE_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff_base),
            cache_capacity: parse("PLACE_CACHE_CAPACITY")
                .map(|n| n as usize)
                .unwrap_or(defaults.cache_capacity),
            min_confidence: lookup("GEOCODE_MIN_CONFIDENCE")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|c| (0.0..=1.0).contains(c))
                .unwrap_or(defaults.min_confidence),
        }
    }

    /// Backoff before attempt `attempt` (1-based; attempt 1 has none).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.backoff_base.saturating_mul(1 << (attempt - 2).min(16))
        }
    }

    /// Configuration with no backoff, for tests.
    #[cfg(test)]
    pub fn fast() -> Self {
        Self {
            call_timeout: Duration::from_millis(50),
            backoff_base: Duration::ZERO,
            ..Self::default()
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.call_timeout, Duration::from_secs(5));
        assert_eq!(config.max_attempts_per_provider, 2);
        assert_eq!(config.cache_capacity, 1024);
    }

    #[test]
    fn test_backoff_doubles() {
        let config = ResolverConfig::default();
        assert_eq!(config.backoff_for(1), Duration::ZERO);
        assert_eq!(config.backoff_for(2), Duration::from_millis(200));
        assert_eq!(config.backoff_for(3), Duration::from_millis(400));
        assert_eq!(config.backoff_for(4), Duration::from_millis(800));
    }

    #[test]
    fn test_from_lookup_overrides_and_ignores_garbage() {
        let vars: BTreeMap<&str, &str> = [
            ("GEOCODE_TIMEOUT_MS", "1500"),
            ("GEOCODE_MAX_ATTEMPTS", "3"),
            ("PLACE_CACHE_CAPACITY", "not-a-number"),
            ("GEOCODE_MIN_CONFIDENCE", "7.5"),
        ]
        .into_iter()
        .collect();
        let config = ResolverConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.call_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_attempts_per_provider, 3);
        assert_eq!(config.cache_capacity, 1024);
        assert_eq!(config.min_confidence, 0.5);
        assert_eq!(config.backoff_base, Duration::from_millis(200));
    }

    #[test]
    fn test_serde_as_millis() {
        let json = serde_json::to_value(ResolverConfig::default()).unwrap();
        assert_eq!(json["call_timeout"], 5000);
        assert_eq!(json["backoff_base"], 200);
    }
}
