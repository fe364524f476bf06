//! Public geocoding and timezone APIs.
//!
//! | Provider               | Endpoint                                   | Confidence         |
//! |------------------------|--------------------------------------------|--------------------|
//! | [`GeocodeApiProvider`] | `/geocode?city=..&limit=5`                 | population share   |
//! | [`PhotonProvider`]     | `/api/?q=..&limit=1` (GeoJSON `[lon, lat]`) | fixed 0.7          |
//! | [`NominatimProvider`]  | `/search?q=..&format=json&limit=5`         | `importance`       |
//! | [`TimeApiProvider`]    | `/api/TimeZone/coordinate?latitude=..`     | -                  |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Url;
use serde_json::Value;

use super::transport::Transport;
use super::zone::offset_in_zone;
use super::{GeoCandidate, GeocodingProvider, OffsetLookup, ProviderError, TimezoneProvider};
use crate::types::{parse_utc_offset, Coordinates, TimePrecision};

/// Default base URL of the city geocoding API.
pub const GEOCODE_API_BASE: &str = "https://geocode.prateekanand.com";
/// Default base URL of Photon.
pub const PHOTON_BASE: &str = "https://photon.komoot.io";
/// Default base URL of Nominatim.
pub const NOMINATIM_BASE: &str = "https://nominatim.openstreetmap.org";
/// Default base URL of TimeAPI.
pub const TIMEAPI_BASE: &str = "https://timeapi.io";

/// Photon returns no score; its single best match gets this confidence.
const PHOTON_CONFIDENCE: f64 = 0.7;

fn endpoint(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, ProviderError> {
    let raw = format!("{}{}", base.trim_end_matches('/'), path);
    Url::parse_with_params(&raw, params).map_err(|e| ProviderError::Transport(format!("bad URL {raw}: {e}")))
}

/// A JSON number, or a string holding one.
fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string(v: &Value) -> Option<String> {
    v.as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn first_component(place: &str) -> &str {
    place.split(',').next().unwrap_or(place).trim()
}

/// City geocoding API; ranks by population.
pub struct GeocodeApiProvider {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl GeocodeApiProvider {
    /// Provider against the public endpoint.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_base_url(transport, GEOCODE_API_BASE)
    }

    /// Provider against a custom base URL.
    pub fn with_base_url(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
        }
    }

    fn parse(body: &Value) -> Result<Vec<GeoCandidate>, ProviderError> {
        let rows = body
            .as_array()
            .ok_or_else(|| ProviderError::Malformed("expected a JSON array".into()))?;

        let parsed: Vec<(Coordinates, String, u64, Option<String>)> = rows
            .iter()
            .filter_map(|row| {
                let coordinates = Coordinates::new(number(&row["latitude"])?, number(&row["longitude"])?)?;
                let name = string(&row["name"]).unwrap_or_else(|| coordinates.to_string());
                let display = match string(&row["country"]) {
                    Some(country) => format!("{name}, {country}"),
                    None => name,
                };
                let population = number(&row["population"]).map(|p| p.max(0.0) as u64).unwrap_or(0);
                Some((coordinates, display, population, string(&row["timezone"])))
            })
            .collect();

        let total: u64 = parsed.iter().map(|p| p.2).sum();
        let count = parsed.len().max(1) as f64;

        Ok(parsed
            .into_iter()
            .map(|(coordinates, display, population, zone)| {
                let confidence = if total > 0 {
                    population as f64 / total as f64
                } else {
                    1.0 / count
                };
                let candidate = GeoCandidate::new(coordinates, display, confidence).with_population(population);
                match zone {
                    Some(z) => candidate.with_zone(z),
                    None => candidate,
                }
            })
            .collect())
    }
}

#[async_trait]
impl GeocodingProvider for GeocodeApiProvider {
    fn name(&self) -> &str {
        "geocode-api"
    }

    async fn search(&self, query: &str) -> Result<Vec<GeoCandidate>, ProviderError> {
        let url = endpoint(
            &self.base_url,
            "/geocode",
            &[("city", first_component(query)), ("limit", "5")],
        )?;
        Self::parse(&self.transport.get_json(&url).await?)
    }
}

/// Photon (komoot) geocoder.
pub struct PhotonProvider {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl PhotonProvider {
    /// Provider against the public endpoint.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_base_url(transport, PHOTON_BASE)
    }

    /// Provider against a custom base URL.
    pub fn with_base_url(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
        }
    }

    fn parse(body: &Value) -> Result<Vec<GeoCandidate>, ProviderError> {
        let features = body["features"]
            .as_array()
            .ok_or_else(|| ProviderError::Malformed("missing 'features'".into()))?;

        Ok(features
            .iter()
            .filter_map(|feature| {
                // GeoJSON order is [lon, lat]
                let coords = feature["geometry"]["coordinates"].as_array()?;
                let coordinates = Coordinates::new(number(coords.get(1)?)?, number(coords.first()?)?)?;
                let props = &feature["properties"];
                let display = ["name", "state", "country"]
                    .iter()
                    .filter_map(|k| string(&props[*k]))
                    .collect::<Vec<_>>()
                    .join(", ");
                let display = if display.is_empty() { coordinates.to_string() } else { display };
                Some(GeoCandidate::new(coordinates, display, PHOTON_CONFIDENCE))
            })
            .collect())
    }
}

#[async_trait]
impl GeocodingProvider for PhotonProvider {
    fn name(&self) -> &str {
        "photon"
    }

    async fn search(&self, query: &str) -> Result<Vec<GeoCandidate>, ProviderError> {
        let url = endpoint(&self.base_url, "/api/", &[("q", query), ("limit", "1")])?;
        Self::parse(&self.transport.get_json(&url).await?)
    }
}

/// OpenStreetMap Nominatim geocoder.
pub struct NominatimProvider {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl NominatimProvider {
    /// Provider against the public endpoint.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_base_url(transport, NOMINATIM_BASE)
    }

    /// Provider against a custom base URL.
    pub fn with_base_url(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
        }
    }

    fn parse(body: &Value) -> Result<Vec<GeoCandidate>, ProviderError> {
        let rows = body
            .as_array()
            .ok_or_else(|| ProviderError::Malformed("expected a JSON array".into()))?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let coordinates = Coordinates::new(number(&row["lat"])?, number(&row["lon"])?)?;
                let display = string(&row["display_name"]).unwrap_or_else(|| coordinates.to_string());
                let importance = number(&row["importance"]).unwrap_or(0.5);
                Some(GeoCandidate::new(coordinates, display, importance))
            })
            .collect())
    }
}

#[async_trait]
impl GeocodingProvider for NominatimProvider {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn search(&self, query: &str) -> Result<Vec<GeoCandidate>, ProviderError> {
        let url = endpoint(
            &self.base_url,
            "/search",
            &[("q", query), ("format", "json"), ("limit", "5")],
        )?;
        Self::parse(&self.transport.get_json(&url).await?)
    }
}

/// TimeAPI coordinate-to-zone lookup.
///
/// The returned zone id is applied to the birth date with the tz database.
/// When the zone is unknown locally, the current offset is used and marked
/// approximate.
pub struct TimeApiProvider {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl TimeApiProvider {
    /// Provider against the public endpoint.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_base_url(transport, TIMEAPI_BASE)
    }

    /// Provider against a custom base URL.
    pub fn with_base_url(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
        }
    }

    fn parse(body: &Value, local: NaiveDateTime) -> Option<OffsetLookup> {
        let zone = string(&body["timeZone"]);
        if let Some(lookup) = zone.as_deref().and_then(|z| offset_in_zone(z, local)) {
            return Some(lookup);
        }

        let current_minutes = number(&body["currentUtcOffset"]["seconds"])
            .map(|s| (s / 60.0).round() as i32)
            .or_else(|| body["utcOffset"].as_str().and_then(|s| parse_utc_offset(s).ok()))?;

        Some(OffsetLookup {
            utc_offset_minutes: current_minutes,
            zone_id: zone,
            precision: TimePrecision::Approximate,
        })
    }
}

#[async_trait]
impl TimezoneProvider for TimeApiProvider {
    fn name(&self) -> &str {
        "timeapi"
    }

    async fn lookup(
        &self,
        coordinates: Coordinates,
        local: NaiveDateTime,
    ) -> Result<Option<OffsetLookup>, ProviderError> {
        let lat = coordinates.latitude.to_string();
        let lon = coordinates.longitude.to_string();
        let url = endpoint(
            &self.base_url,
            "/api/TimeZone/coordinate",
            &[("latitude", lat.as_str()), ("longitude", lon.as_str())],
        )?;
        let body = self.transport.get_json(&url).await?;
        Ok(Self::parse(&body, local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Returns a canned body and records requested URLs.
    struct CannedTransport {
        body: Value,
        requested: Mutex<Vec<Url>>,
    }

    impl CannedTransport {
        fn new(body: Value) -> Arc<Self> {
            Arc::new(Self {
                body,
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for CannedTransport {
        fn name(&self) -> &str {
            "canned"
        }

        async fn get_json(&self, url: &Url) -> Result<Value, ProviderError> {
            self.requested.lock().push(url.clone());
            Ok(self.body.clone())
        }
    }

    fn local() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(1990, 8, 15).unwrap().and_hms_opt(14, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn test_geocode_api_population_share() {
        let transport = CannedTransport::new(json!([
            {"name": "Chennai", "country": "India", "latitude": 13.0827, "longitude": "80.2707",
             "population": 7_000_000, "timezone": "Asia/Kolkata"},
            {"name": "Chennai", "country": "USA", "latitude": 40.0, "longitude": -75.0,
             "population": 3_000_000}
        ]));
        let provider = GeocodeApiProvider::new(transport.clone());
        let found = provider.search("Chennai, Tamil Nadu").await.unwrap();

        assert_eq!(found.len(), 2);
        assert!((found[0].confidence - 0.7).abs() < 1e-9);
        assert_eq!(found[0].zone_id.as_deref(), Some("Asia/Kolkata"));
        assert_eq!(found[0].display_name, "Chennai, India");

        let url = &transport.requested.lock()[0];
        assert_eq!(url.path(), "/geocode");
        assert!(url.query_pairs().any(|(k, v)| k == "city" && v == "Chennai"));
    }

    #[tokio::test]
    async fn test_photon_lon_lat_order() {
        let transport = CannedTransport::new(json!({
            "features": [{
                "geometry": {"coordinates": [80.2707, 13.0827]},
                "properties": {"name": "Chennai", "state": "Tamil Nadu", "country": "India"}
            }]
        }));
        let found = PhotonProvider::new(transport).search("Chennai").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!((found[0].coordinates.latitude - 13.0827).abs() < 1e-9);
        assert!((found[0].coordinates.longitude - 80.2707).abs() < 1e-9);
        assert_eq!(found[0].display_name, "Chennai, Tamil Nadu, India");
    }

    #[tokio::test]
    async fn test_photon_missing_features_is_malformed() {
        let transport = CannedTransport::new(json!({"type": "error"}));
        let result = PhotonProvider::new(transport).search("Chennai").await;
        assert!(matches!(result, Err(ProviderError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_nominatim_string_coordinates() {
        let transport = CannedTransport::new(json!([
            {"lat": "13.0836939", "lon": "80.270186", "display_name": "Chennai, Tamil Nadu, India",
             "importance": 0.82}
        ]));
        let found = NominatimProvider::new(transport).search("Chennai").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!((found[0].confidence - 0.82).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_nominatim_empty_is_not_found() {
        let transport = CannedTransport::new(json!([]));
        assert!(NominatimProvider::new(transport).search("Atlantis").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeapi_zone_is_exact() {
        let transport = CannedTransport::new(json!({
            "timeZone": "Asia/Kolkata",
            "currentUtcOffset": {"seconds": 19800}
        }));
        let provider = TimeApiProvider::new(transport);
        let coords = Coordinates::new(13.0827, 80.2707).unwrap();
        let lookup = provider.lookup(coords, local()).await.unwrap().unwrap();
        assert_eq!(lookup.utc_offset_minutes, 330);
        assert_eq!(lookup.precision, TimePrecision::Exact);
    }

    #[tokio::test]
    async fn test_timeapi_unknown_zone_uses_current_offset() {
        let transport = CannedTransport::new(json!({
            "timeZone": "Nowhere/Unknown",
            "currentUtcOffset": {"seconds": 19800}
        }));
        let coords = Coordinates::new(13.0827, 80.2707).unwrap();
        let lookup = TimeApiProvider::new(transport).lookup(coords, local()).await.unwrap().unwrap();
        assert_eq!(lookup.utc_offset_minutes, 330);
        assert_eq!(lookup.precision, TimePrecision::Approximate);
    }

    #[tokio::test]
    async fn test_timeapi_no_data() {
        let transport = CannedTransport::new(json!({}));
        let coords = Coordinates::new(0.0, 0.0).unwrap();
        assert!(TimeApiProvider::new(transport).lookup(coords, local()).await.unwrap().is_none());
    }
}
