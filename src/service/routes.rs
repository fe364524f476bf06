//! Axum routes for the Nadi kernel service.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Extension, Json, Query, State},
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

use crate::ephemeris::ACCURACY_LABEL;
use crate::pipeline::PipelineError;
use crate::policy::CalculationPolicyV1;
use crate::resolver::{GeocodeError, PlaceCacheStats};
use crate::types::{parse_utc_offset, BirthInput, BirthProfile, Coordinates, InputError, Person, ReasonCode};
use crate::NADI_KERNEL_SCHEMA_VERSION;

use super::middleware::{
    correlation_middleware, metrics_middleware, rate_limit_middleware, record_profile_metrics, record_relay,
    record_verdict_metrics, CorrelationId,
};
use super::state::ServiceState;

/// Hosts the relay endpoint forwards to.
pub const RELAY_ALLOWED_HOSTS: &[&str] = &[
    "geocode.prateekanand.com",
    "photon.komoot.io",
    "nominatim.openstreetmap.org",
    "timeapi.io",
];

type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Request/Response Types
// ============================================================================

/// One- or two-person calculation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    /// First person.
    pub person1: BirthInput,
    /// Second person; omitted for a single-person profile.
    #[serde(default)]
    pub person2: Option<BirthInput>,
}

/// UTC offset as text (`+05:30`, `5.5`) or as a number of hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OffsetField {
    /// Textual offset.
    Text(String),
    /// Decimal hours.
    Hours(f64),
}

/// Legacy calculation with explicit offset and coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyRequest {
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Local birth date, `YYYY-MM-DD`.
    pub birth_date: String,
    /// Local birth time, `HH:MM`.
    pub birth_time: String,
    /// UTC offset.
    pub timezone: OffsetField,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Resolved place in a profile response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceDto {
    /// Provider display name.
    pub display_name: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Provider that resolved the place.
    pub source: String,
    /// Provider confidence.
    pub confidence: f64,
}

/// Serializable birth profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    /// Person name, if supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Nakshatra name.
    pub nakshatra: String,
    /// 0-based Nakshatra index.
    pub nakshatra_id: u8,
    /// Pada, 1-4.
    pub pada: u8,
    /// Nadi name.
    pub nadi: String,
    /// Moon sidereal longitude, degrees.
    pub sidereal_longitude: f64,
    /// Moon tropical longitude, degrees.
    pub tropical_longitude: f64,
    /// Ayanamsa applied, degrees.
    pub ayanamsa: f64,
    /// Birth instant, RFC 3339 UTC.
    pub utc_instant: String,
    /// Offset applied, minutes east of UTC.
    pub utc_offset_minutes: i32,
    /// IANA zone id, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    /// `exact` or `approximate`.
    pub time_precision: String,
    /// Resolved place.
    pub place: PlaceDto,
    /// Params hash of the policy used.
    pub policy_params_hash: String,
    /// Profile fingerprint.
    pub fingerprint: String,
    /// One-line summary.
    pub summary: String,
}

impl From<&BirthProfile> for ProfileDto {
    fn from(profile: &BirthProfile) -> Self {
        Self {
            name: profile.name.clone(),
            nakshatra: profile.nakshatra_name().to_string(),
            nakshatra_id: profile.nakshatra_id(),
            pada: profile.pada,
            nadi: profile.nadi.to_string(),
            sidereal_longitude: profile.sidereal_longitude,
            tropical_longitude: profile.tropical_longitude,
            ayanamsa: profile.ayanamsa,
            utc_instant: profile.civil_instant.instant.to_string(),
            utc_offset_minutes: profile.civil_instant.utc_offset_minutes,
            zone_id: profile.civil_instant.zone_id.clone(),
            time_precision: profile.civil_instant.precision.to_string(),
            place: PlaceDto {
                display_name: profile.place.display_name.clone(),
                latitude: profile.place.coordinates.latitude,
                longitude: profile.place.coordinates.longitude,
                source: profile.place.source.clone(),
                confidence: profile.place.confidence,
            },
            policy_params_hash: profile.policy_params_hash.clone(),
            fingerprint: profile.fingerprint(),
            summary: profile.summary(),
        }
    }
}

/// Response to a one- or two-person calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResponse {
    /// First person's profile.
    pub person1: ProfileDto,
    /// Second person's profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person2: Option<ProfileDto>,
    /// Whether Nadi Dosha is present (two-person only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_dosha: Option<bool>,
    /// The shared Nadi when dosha is present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosha_type: Option<String>,
    /// Inverse of `has_dosha` (two-person only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compatible: Option<bool>,
    /// Rule branch of the verdict (two-person only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ReasonCode>,
    /// Verdict explanation, or the profile summary for one person.
    pub message: String,
}

/// Active policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResponse {
    /// Policy identifier.
    pub policy_id: String,
    /// Params hash stamped on every profile.
    pub params_hash: String,
    /// Full policy parameters.
    pub policy: CalculationPolicyV1,
    /// Ephemeris accuracy label.
    pub ephemeris: String,
    /// Whether Dosha exception rules are applied.
    pub dosha_exceptions: bool,
}

/// Relay query string.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayQuery {
    /// Upstream URL to fetch.
    pub url: String,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub schema_version: String,
    pub policy_id: String,
    pub params_hash: String,
    pub geocoders: Vec<String>,
    pub timezone_providers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_cache: Option<PlaceCacheStats>,
    pub rate_limited_clients: usize,
    pub uptime_secs: u64,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub details: Option<String>,
}

/// Structured error response with correlation ID for tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Pipeline stage that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// Which person failed, in two-person requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<Person>,
    /// Correlation ID for request tracing (matches X-Request-Id or generated UUID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            stage: None,
            person: None,
            correlation_id: None,
            details: None,
        }
    }

    /// Add a correlation ID to the error.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn correlated(self, correlation: Option<&Extension<CorrelationId>>) -> Self {
        match correlation {
            Some(Extension(CorrelationId(id))) => self.with_correlation_id(id.clone()),
            None => self,
        }
    }

    fn from_pipeline(err: &PipelineError) -> Self {
        let mut response = Self::new(err.code(), err.to_string());
        response.stage = Some(err.stage().to_string());
        response.person = err.person();
        response.details = pipeline_details(err);
        response
    }
}

fn pipeline_details(err: &PipelineError) -> Option<String> {
    match err {
        PipelineError::ForPerson { source, .. } => pipeline_details(source),
        PipelineError::Geocode(GeocodeError::PlaceAmbiguous { candidates, .. }) => Some(format!(
            "Please add the state or country. Candidates: {}",
            candidates.join("; ")
        )),
        PipelineError::Geocode(GeocodeError::AllProvidersFailed { attempts, .. }) => Some(
            attempts
                .iter()
                .map(|a| format!("{}: {}", a.provider, a.error))
                .collect::<Vec<_>>()
                .join("; "),
        ),
        _ => None,
    }
}

fn status_for_code(code: &str) -> StatusCode {
    match code {
        "OFFSET_UNKNOWN" => StatusCode::UNPROCESSABLE_ENTITY,
        "ALL_PROVIDERS_FAILED" | "RELAY_FAILED" => StatusCode::BAD_GATEWAY,
        "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
        "HOST_NOT_ALLOWED" => StatusCode::FORBIDDEN,
        "INVALID_INSTANT" | "INVALID_LONGITUDE" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn pipeline_error(err: &PipelineError, correlation: Option<&Extension<CorrelationId>>) -> ApiError {
    let body = ErrorResponse::from_pipeline(err).correlated(correlation);
    tracing::warn!(
        code = %body.code,
        stage = ?body.stage,
        person = ?body.person,
        error = %body.error,
        correlation_id = ?body.correlation_id,
        "Request error"
    );
    (status_for_code(err.code()), Json(body))
}

fn rejection_error(rejection: JsonRejection, correlation: Option<&Extension<CorrelationId>>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(
            ErrorResponse::new("INVALID_INPUT", "Malformed request body")
                .with_details(rejection.body_text())
                .correlated(correlation),
        ),
    )
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = status_for_code(&self.code);
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Compute one birth profile.
async fn profile_handler(
    State(state): State<Arc<ServiceState>>,
    correlation: Option<Extension<CorrelationId>>,
    payload: Result<Json<BirthInput>, JsonRejection>,
) -> Result<Json<ProfileDto>, ApiError> {
    let Json(input) = payload.map_err(|r| rejection_error(r, correlation.as_ref()))?;

    let start = Instant::now();
    let profile = state
        .pipeline
        .compute_profile(&input)
        .await
        .map_err(|e| pipeline_error(&e, correlation.as_ref()))?;
    record_profile_metrics(
        profile.nakshatra_name(),
        &profile.civil_instant.precision.to_string(),
        start.elapsed().as_millis() as u64,
    );

    Ok(Json(ProfileDto::from(&profile)))
}

/// One profile, or two profiles and a verdict.
async fn complete_handler(
    State(state): State<Arc<ServiceState>>,
    correlation: Option<Extension<CorrelationId>>,
    payload: Result<Json<CompleteRequest>, JsonRejection>,
) -> Result<Json<CompleteResponse>, ApiError> {
    let Json(request) = payload.map_err(|r| rejection_error(r, correlation.as_ref()))?;
    let start = Instant::now();

    let Some(second) = request.person2 else {
        let profile = state
            .pipeline
            .compute_profile(&request.person1)
            .await
            .map_err(|e| pipeline_error(&e, correlation.as_ref()))?;
        record_profile_metrics(
            profile.nakshatra_name(),
            &profile.civil_instant.precision.to_string(),
            start.elapsed().as_millis() as u64,
        );
        return Ok(Json(CompleteResponse {
            message: profile.summary(),
            person1: ProfileDto::from(&profile),
            person2: None,
            has_dosha: None,
            dosha_type: None,
            compatible: None,
            reason_code: None,
        }));
    };

    let comparison = state
        .pipeline
        .compute_verdict(&request.person1, &second)
        .await
        .map_err(|e| pipeline_error(&e, correlation.as_ref()))?;
    let verdict = &comparison.verdict;
    record_verdict_metrics(verdict.reason_code.as_str(), verdict.has_dosha);

    Ok(Json(CompleteResponse {
        person1: ProfileDto::from(&comparison.first),
        person2: Some(ProfileDto::from(&comparison.second)),
        has_dosha: Some(verdict.has_dosha),
        dosha_type: verdict.dosha_nadi.map(|n| n.to_string()),
        compatible: Some(verdict.compatible),
        reason_code: Some(verdict.reason_code),
        message: verdict.explanation.clone(),
    }))
}

/// Legacy calculation: explicit offset and coordinates, no providers.
async fn legacy_handler(
    State(state): State<Arc<ServiceState>>,
    correlation: Option<Extension<CorrelationId>>,
    payload: Result<Json<LegacyRequest>, JsonRejection>,
) -> Result<Json<ProfileDto>, ApiError> {
    let Json(request) = payload.map_err(|r| rejection_error(r, correlation.as_ref()))?;
    let input_error = |e: InputError| pipeline_error(&PipelineError::Input(e), correlation.as_ref());

    let offset_minutes = match &request.timezone {
        OffsetField::Text(text) => parse_utc_offset(text),
        OffsetField::Hours(hours) => parse_utc_offset(&hours.to_string()),
    }
    .map_err(input_error)?;

    let coordinates = Coordinates::new(request.latitude, request.longitude).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(
                ErrorResponse::new("INVALID_INPUT", "Latitude or longitude out of range")
                    .with_details(format!("{}, {}", request.latitude, request.longitude))
                    .correlated(correlation.as_ref()),
            ),
        )
    })?;

    let mut profile = state
        .pipeline
        .compute_from_offset(&request.birth_date, &request.birth_time, offset_minutes, coordinates)
        .map_err(|e| pipeline_error(&e, correlation.as_ref()))?;
    profile.name = request.name.filter(|n| !n.trim().is_empty());

    Ok(Json(ProfileDto::from(&profile)))
}

/// Forward a GET to an allow-listed provider host.
async fn relay_handler(
    State(state): State<Arc<ServiceState>>,
    correlation: Option<Extension<CorrelationId>>,
    Query(query): Query<RelayQuery>,
) -> Result<Response, ApiError> {
    let reject = |status: StatusCode, code: &str, msg: &str| {
        (
            status,
            Json(
                ErrorResponse::new(code, msg)
                    .with_details(query.url.clone())
                    .correlated(correlation.as_ref()),
            ),
        )
    };

    let target = reqwest::Url::parse(&query.url)
        .map_err(|_| reject(StatusCode::BAD_REQUEST, "INVALID_URL", "Relay target is not a valid URL"))?;
    let host = target.host_str().unwrap_or_default().to_string();
    if !matches!(target.scheme(), "http" | "https") || !RELAY_ALLOWED_HOSTS.contains(&host.as_str()) {
        return Err(reject(StatusCode::FORBIDDEN, "HOST_NOT_ALLOWED", "Relay target host is not allowed"));
    }

    let start = Instant::now();
    let upstream = state
        .relay_client()
        .get(target)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|_| reject(StatusCode::BAD_GATEWAY, "RELAY_FAILED", "Upstream request failed"))?;

    let status = upstream.status().as_u16();
    let forwarded_header = |name: reqwest::header::HeaderName| {
        upstream
            .headers()
            .get(name)
            .and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok())
    };
    let content_type = forwarded_header(reqwest::header::CONTENT_TYPE);
    // Redirects are not followed; the caller sees the 3xx as sent
    let location = forwarded_header(reqwest::header::LOCATION);
    let body = upstream
        .bytes()
        .await
        .map_err(|_| reject(StatusCode::BAD_GATEWAY, "RELAY_FAILED", "Upstream body could not be read"))?;
    record_relay(&host, status, start.elapsed().as_millis() as u64);

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    if let Some(content_type) = content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    }
    if let Some(location) = location {
        response.headers_mut().insert(header::LOCATION, location);
    }
    Ok(response)
}

/// Active calculation policy.
async fn policy_handler(State(state): State<Arc<ServiceState>>) -> Json<PolicyResponse> {
    let policy = state.pipeline.policy();
    Json(PolicyResponse {
        policy_id: policy.policy_id().to_string(),
        params_hash: state.pipeline.params_hash().to_string(),
        policy: policy.clone(),
        ephemeris: ACCURACY_LABEL.to_string(),
        dosha_exceptions: state.pipeline.matcher().exceptions_enabled(),
    })
}

/// Health check endpoint (detailed).
async fn health_handler(State(state): State<Arc<ServiceState>>) -> Json<HealthResponse> {
    let pipeline = &state.pipeline;
    let geocoders: Vec<String> = pipeline
        .coordinate_resolver()
        .provider_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    Json(HealthResponse {
        status: if geocoders.is_empty() { "degraded" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: NADI_KERNEL_SCHEMA_VERSION.to_string(),
        policy_id: pipeline.policy().policy_id().to_string(),
        params_hash: pipeline.params_hash().to_string(),
        geocoders,
        timezone_providers: pipeline
            .civil_time_resolver()
            .provider_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
        place_cache: pipeline.coordinate_resolver().cache_stats(),
        rate_limited_clients: state.limiter.tracked_clients(),
        uptime_secs: state.uptime_secs(),
    })
}

/// Liveness probe endpoint. Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint: 503 without any geocoding provider.
async fn readiness_handler(
    State(state): State<Arc<ServiceState>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    if state.pipeline.coordinate_resolver().provider_names().is_empty() {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                details: Some("No geocoding provider configured".to_string()),
            }),
        ))
    } else {
        Ok(Json(ReadinessResponse {
            ready: true,
            details: None,
        }))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the Nadi kernel service.
pub fn create_router(state: ServiceState) -> Router {
    let state = Arc::new(state);

    // Calculation endpoints are rate limited per client
    let calculations = Router::new()
        .route("/api/profile", post(profile_handler))
        .route("/api/calculate-nadi-complete", post(complete_handler))
        .route("/api/calculate-nadi", post(legacy_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(calculations)
        .route("/api/relay", get(relay_handler))
        .route("/api/policy", get(policy_handler))
        // Health checks
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(correlation_middleware))
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::BirthProfilePipeline;
    use crate::service::ServiceConfig;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router_with(config: ServiceConfig) -> Router {
        let pipeline = BirthProfilePipeline::offline(CalculationPolicyV1::default());
        create_router(ServiceState::new(pipeline, &config).unwrap())
    }

    fn router() -> Router {
        router_with(ServiceConfig::default())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn chennai(name: &str) -> Value {
        json!({
            "name": name,
            "birth_date": "1990-08-15",
            "birth_time": "14:30",
            "place_of_birth": "Chennai, India"
        })
    }

    #[tokio::test]
    async fn test_liveness() {
        let response = router().oneshot(get_req("/health/live")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "alive");
    }

    #[tokio::test]
    async fn test_health_reports_providers() {
        let response = router().oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["policy_id"], "nadi_policy_v1");
        assert_eq!(body["geocoders"], json!(["gazetteer"]));
        assert_eq!(body["timezone_providers"], json!(["longitude-estimate"]));
    }

    #[tokio::test]
    async fn test_profile_endpoint() {
        let response = router().oneshot(post_json("/api/profile", chennai("Asha"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["nakshatra"], "Rohini");
        assert_eq!(body["pada"], 4);
        assert_eq!(body["nadi"], "Antya");
        assert_eq!(body["utcInstant"], "1990-08-15T09:00:00Z");
        assert_eq!(body["timePrecision"], "exact");
        assert_eq!(body["summary"], "Asha has Antya Nadi (Rohini Nakshatra, Pada 4).");
    }

    #[tokio::test]
    async fn test_profile_accepts_camel_case_fields() {
        let request = json!({
            "birthDate": "1990-08-15",
            "birthTime": "14:30",
            "placeOfBirth": "Chennai"
        });
        let response = router().oneshot(post_json("/api/profile", request)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_complete_two_people_same_nadi() {
        let request = json!({ "person1": chennai("A"), "person2": chennai("B") });
        let response = router()
            .oneshot(post_json("/api/calculate-nadi-complete", request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["hasDosha"], true);
        assert_eq!(body["doshaType"], "Antya");
        assert_eq!(body["compatible"], false);
        assert_eq!(body["reasonCode"], "SAME_NADI");
        assert!(body["message"].as_str().unwrap().starts_with("Nadi Dosha present"));
    }

    #[tokio::test]
    async fn test_complete_single_person() {
        let request = json!({ "person1": chennai("A") });
        let response = router()
            .oneshot(post_json("/api/calculate-nadi-complete", request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body.get("person2").is_none());
        assert!(body.get("hasDosha").is_none());
        assert_eq!(body["message"], "A has Antya Nadi (Rohini Nakshatra, Pada 4).");
    }

    #[tokio::test]
    async fn test_place_not_found_is_400_with_stage() {
        let mut person = chennai("A");
        person["place_of_birth"] = json!("Atlantis");
        let response = router().oneshot(post_json("/api/profile", person)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "PLACE_NOT_FOUND");
        assert_eq!(body["stage"], "geocoding");
        assert!(body["correlation_id"].is_string());
    }

    #[tokio::test]
    async fn test_failing_person_is_named() {
        let mut second = chennai("B");
        second["birth_time"] = json!("25:61");
        let request = json!({ "person1": chennai("A"), "person2": second });
        let response = router()
            .oneshot(post_json("/api/calculate-nadi-complete", request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "INVALID_INPUT");
        assert_eq!(body["person"], "second");
        assert_eq!(body["stage"], "input");
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_input() {
        let response = router()
            .oneshot(post_json("/api/profile", json!({ "birth_date": 5 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_legacy_offset_forms() {
        for tz in [json!("+05:30"), json!("5.5"), json!(5.5)] {
            let request = json!({
                "birth_date": "1990-08-15",
                "birth_time": "14:30",
                "timezone": tz,
                "latitude": 13.0827,
                "longitude": 80.2707
            });
            let response = router().oneshot(post_json("/api/calculate-nadi", request)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = body_json(response).await;
            assert_eq!(body["nakshatra"], "Rohini");
            assert_eq!(body["utcOffsetMinutes"], 330);
        }
    }

    #[tokio::test]
    async fn test_legacy_rejects_bad_offset() {
        let request = json!({
            "birth_date": "1990-08-15",
            "birth_time": "14:30",
            "timezone": "IST",
            "latitude": 13.0827,
            "longitude": 80.2707
        });
        let response = router().oneshot(post_json("/api/calculate-nadi", request)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_rate_limit_returns_429() {
        let app = router_with(ServiceConfig {
            rate_limit_max: 1,
            ..ServiceConfig::default()
        });

        let first = app.clone().oneshot(post_json("/api/profile", chennai("A"))).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.clone().oneshot(post_json("/api/profile", chennai("A"))).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(body_json(second).await["code"], "RATE_LIMITED");

        // Health is not limited
        let health = app.oneshot(get_req("/health/live")).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_correlation_id_echoed() {
        let request = Request::builder()
            .uri("/health/live")
            .header("x-request-id", "req-123")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.headers().get("x-request-id").unwrap(), "req-123");
    }

    #[tokio::test]
    async fn test_relay_rejects_unlisted_host() {
        let response = router()
            .oneshot(get_req("/api/relay?url=https%3A%2F%2Fevil.example%2Fx"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["code"], "HOST_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn test_relay_rejects_invalid_url() {
        let response = router().oneshot(get_req("/api/relay?url=not%20a%20url")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "INVALID_URL");
    }

    #[tokio::test]
    async fn test_policy_endpoint() {
        let response = router().oneshot(get_req("/api/policy")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["policy_id"], "nadi_policy_v1");
        assert_eq!(body["policy"]["ayanamsa"], "lahiri");
        assert_eq!(body["ephemeris"], ACCURACY_LABEL);
        assert_eq!(body["dosha_exceptions"], false);
    }
}
