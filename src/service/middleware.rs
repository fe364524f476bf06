//! Service middleware for metrics, rate limiting, and request tracking.
//!
//! ## Metrics Exposed
//!
//! Logged to the `nadi_kernel::metrics` target:
//!
//! - `request` - path, method, status, latency
//! - `profile` - Nakshatra, time precision and latency per computed profile
//! - `verdict` - reason code per two-person calculation
//! - `relay` - upstream host and status per relayed call

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use tracing::{info, info_span, warn, Instrument};

use super::routes::ErrorResponse;
use super::state::ServiceState;

/// Request header carrying the correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tracked clients above which idle entries are pruned.
const PRUNE_THRESHOLD: usize = 10_000;

/// Correlation id attached to each request's extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

/// Sliding-window request limiter keyed by client.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Allow `max_requests` per `window` per client. Zero disables limiting.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request now; `Err` carries the time until a slot frees.
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        self.check_at(client, Instant::now())
    }

    /// Record a request at `now`.
    pub fn check_at(&self, client: &str, now: Instant) -> Result<(), Duration> {
        if self.max_requests == 0 {
            return Ok(());
        }

        let mut hits = self.hits.lock();
        if hits.len() > PRUNE_THRESHOLD {
            let window = self.window;
            hits.retain(|_, q| q.back().is_some_and(|t| now.saturating_duration_since(*t) < window));
        }

        let queue = hits.entry(client.to_string()).or_default();
        while let Some(&oldest) = queue.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                queue.pop_front();
            } else {
                break;
            }
        }

        if queue.len() >= self.max_requests {
            let oldest = queue.front().copied().unwrap_or(now);
            return Err(self.window.saturating_sub(now.saturating_duration_since(oldest)));
        }
        queue.push_back(now);
        Ok(())
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.hits.lock().len()
    }
}

/// Client key: first `X-Forwarded-For` hop, else the peer address.
fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rejects clients over their window budget with `429`.
pub async fn rate_limit_middleware(
    State(state): State<Arc<ServiceState>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);
    match state.limiter.check(&client) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            let secs = retry_after.as_secs().max(1);
            warn!(client = %client, retry_after_secs = secs, "Rate limit exceeded");

            let mut body = ErrorResponse::new("RATE_LIMITED", "Too many requests. Please try again later.")
                .with_details(format!("retry after {secs}s"));
            if let Some(CorrelationId(id)) = request.extensions().get::<CorrelationId>() {
                body = body.with_correlation_id(id.clone());
            }
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, secs.to_string())],
                Json(body),
            )
                .into_response()
        }
    }
}

/// Attaches a correlation id and a request span.
///
/// Uses the incoming `X-Request-Id` when present and echoes it back.
pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(CorrelationId(correlation_id.clone()));

    let span = info_span!(
        "request",
        correlation_id = %correlation_id,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Metrics middleware that records request counts and latency.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    info!(
        target: "nadi_kernel::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces UUIDs and numeric segments with `:id`.
fn normalize_path(path: &str) -> String {
    static DYNAMIC_SEGMENT: OnceLock<regex_lite::Regex> = OnceLock::new();
    let re = DYNAMIC_SEGMENT.get_or_init(|| {
        regex_lite::Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|\b[0-9]+\b")
            .expect("static pattern")
    });
    re.replace_all(path, ":id").to_string()
}

/// Record a computed profile.
pub fn record_profile_metrics(nakshatra: &str, precision: &str, latency_ms: u64) {
    info!(
        target: "nadi_kernel::metrics",
        metric_type = "profile",
        nakshatra = nakshatra,
        precision = precision,
        latency_ms = latency_ms,
        "profile_metric"
    );
}

/// Record a two-person verdict.
pub fn record_verdict_metrics(reason_code: &str, has_dosha: bool) {
    info!(
        target: "nadi_kernel::metrics",
        metric_type = "verdict",
        reason_code = reason_code,
        has_dosha = has_dosha,
        "verdict_metric"
    );
}

/// Record a relayed upstream call.
pub fn record_relay(host: &str, status: u16, latency_ms: u64) {
    info!(
        target: "nadi_kernel::metrics",
        metric_type = "relay",
        host = host,
        status = status,
        latency_ms = latency_ms,
        "relay_metric"
    );
}
