//! Service state and configuration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::warn;

use crate::ephemeris::AyanamsaSystem;
use crate::pipeline::BirthProfilePipeline;
use crate::providers::{ProviderError, USER_AGENT};

use super::middleware::RateLimiter;

/// Service configuration, read from the environment by the binary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Route provider calls through this relay when set.
    pub relay_base_url: Option<String>,
    /// Requests allowed per client per window.
    pub rate_limit_max: usize,
    /// Rate limit window.
    #[serde(serialize_with = "serialize_secs")]
    pub rate_limit_window: Duration,
    /// Ayanamsa for the active policy.
    pub ayanamsa: AyanamsaSystem,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            relay_base_url: None,
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(3600),
            ayanamsa: AyanamsaSystem::Lahiri,
        }
    }
}

impl ServiceConfig {
    /// Read `HOST`, `PORT`, `RELAY_BASE_URL`, `RATE_LIMIT_MAX`,
    /// `RATE_LIMIT_WINDOW_SECS` and `NADI_AYANAMSA`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let ayanamsa = match lookup("NADI_AYANAMSA") {
            Some(raw) => AyanamsaSystem::from_str(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "Unknown NADI_AYANAMSA, using lahiri");
                defaults.ayanamsa
            }),
            None => defaults.ayanamsa,
        };

        Self {
            host: lookup("HOST").filter(|h| !h.is_empty()).unwrap_or(defaults.host),
            port: lookup("PORT").and_then(|p| p.parse().ok()).unwrap_or(defaults.port),
            relay_base_url: lookup("RELAY_BASE_URL").filter(|u| !u.trim().is_empty()),
            rate_limit_max: lookup("RATE_LIMIT_MAX")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.rate_limit_max),
            rate_limit_window: lookup("RATE_LIMIT_WINDOW_SECS")
                .and_then(|n| n.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_window),
            ayanamsa,
        }
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

/// Shared service state.
///
/// Holds the pipeline, the per-client rate limiter and the HTTP client used
/// by the relay endpoint.
#[derive(Clone)]
pub struct ServiceState {
    /// The birth profile pipeline.
    pub pipeline: BirthProfilePipeline,
    /// Sliding-window limiter for calculation endpoints.
    pub limiter: Arc<RateLimiter>,
    relay_client: reqwest::Client,
    started_at: Instant,
}

impl ServiceState {
    /// Create service state.
    pub fn new(pipeline: BirthProfilePipeline, config: &ServiceConfig) -> Result<Self, ProviderError> {
        let relay_client = build_relay_client()?;

        Ok(Self {
            pipeline,
            limiter: Arc::new(RateLimiter::new(config.rate_limit_max, config.rate_limit_window)),
            relay_client,
            started_at: Instant::now(),
        })
    }

    pub(crate) fn relay_client(&self) -> &reqwest::Client {
        &self.relay_client
    }

    /// Seconds since the state was created.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// HTTP client for the relay. Redirects are returned to the caller, never
/// followed, so the allow-list holds for every hop.
fn build_relay_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| ProviderError::Transport(e.to_string()))
}
