//! Birth profile pipeline: place → instant → Moon → Nakshatra.
//!
//! ```text
//! BirthInput ─► CoordinateResolver ─► CivilTimeResolver ─► LunarEngine ─► NakshatraClassifier ─► BirthProfile
//!
//! (BirthInput, BirthInput) ─► two pipelines, joined ─► DoshaMatcher ─► Comparison
//! ```
//!
//! Each stage's terminal error propagates unchanged, tagged with the stage
//! (and the person, in two-person mode). A profile is only built once both
//! the coordinates and the instant are fully resolved.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};

use crate::classifier::NakshatraClassifier;
use crate::ephemeris::{EphemerisError, LunarEngine, MoonPosition};
use crate::matcher::DoshaMatcher;
use crate::policy::{CalculationPolicyV1, ResolverConfig};
use crate::providers::{Gazetteer, GeocodingProvider, LongitudeEstimateProvider, TimezoneProvider};
use crate::resolver::{
    instant_from_offset, CivilTimeError, CivilTimeResolver, CoordinateResolver, GeocodeError,
};
use crate::types::{
    parse_birth_date, parse_birth_time, BirthInput, BirthProfile, CivilInstant, Comparison, Coordinates,
    InputError, Person, ResolvedPlace, Verdict,
};

/// Largest accepted explicit offset, minutes.
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Pipeline stage, reported with every failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Validating raw input.
    Input,
    /// Resolving the place of birth.
    Geocoding,
    /// Resolving the local time to UTC.
    CivilTime,
    /// Computing the Moon's position.
    Ephemeris,
    /// Classifying the sidereal longitude.
    Classification,
}

impl Stage {
    /// Stable identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Geocoding => "geocoding",
            Self::CivilTime => "civil_time",
            Self::Ephemeris => "ephemeris",
            Self::Classification => "classification",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal pipeline errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    /// Raw input failed validation.
    #[error(transparent)]
    Input(#[from] InputError),

    /// Place could not be resolved.
    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    /// UTC offset could not be determined.
    #[error(transparent)]
    CivilTime(#[from] CivilTimeError),

    /// Lunar position failed.
    #[error(transparent)]
    Ephemeris(EphemerisError),

    /// Classification failed.
    #[error(transparent)]
    Classification(EphemerisError),

    /// Failure for one person of a two-person request.
    #[error("{person}: {source}")]
    ForPerson {
        /// Which person failed.
        person: Person,
        /// The underlying failure.
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Input(_) => Stage::Input,
            Self::Geocode(GeocodeError::EmptyQuery) => Stage::Input,
            Self::Geocode(_) => Stage::Geocoding,
            Self::CivilTime(_) => Stage::CivilTime,
            Self::Ephemeris(_) => Stage::Ephemeris,
            Self::Classification(_) => Stage::Classification,
            Self::ForPerson { source, .. } => source.stage(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Input(_) | Self::Geocode(GeocodeError::EmptyQuery) => "INVALID_INPUT",
            Self::Geocode(GeocodeError::PlaceNotFound { .. }) => "PLACE_NOT_FOUND",
            Self::Geocode(GeocodeError::PlaceAmbiguous { .. }) => "PLACE_AMBIGUOUS",
            Self::Geocode(GeocodeError::AllProvidersFailed { .. }) => "ALL_PROVIDERS_FAILED",
            Self::CivilTime(CivilTimeError::OffsetUnknown { .. }) => "OFFSET_UNKNOWN",
            Self::CivilTime(CivilTimeError::InvalidLocalTime(_)) => "INVALID_INPUT",
            Self::Ephemeris(_) => "INVALID_INSTANT",
            Self::Classification(_) => "INVALID_LONGITUDE",
            Self::ForPerson { source, .. } => source.code(),
        }
    }

    /// The person the failure belongs to, in two-person mode.
    pub fn person(&self) -> Option<Person> {
        match self {
            Self::ForPerson { person, .. } => Some(*person),
            _ => None,
        }
    }

    /// Tag the error with a person.
    pub fn for_person(self, person: Person) -> Self {
        match self {
            tagged @ Self::ForPerson { .. } => tagged,
            other => Self::ForPerson {
                person,
                source: Box::new(other),
            },
        }
    }
}

/// Orchestrates the resolvers, the lunar engine and the classifier.
///
/// Cheap to clone; clones share the place cache.
#[derive(Clone)]
pub struct BirthProfilePipeline {
    coordinates: Arc<CoordinateResolver>,
    civil_time: Arc<CivilTimeResolver>,
    engine: LunarEngine,
    classifier: NakshatraClassifier,
    matcher: DoshaMatcher,
    policy: Arc<CalculationPolicyV1>,
    params_hash: Arc<str>,
}

impl BirthProfilePipeline {
    /// Pipeline over explicit resolvers.
    pub fn new(
        coordinates: CoordinateResolver,
        civil_time: CivilTimeResolver,
        policy: CalculationPolicyV1,
    ) -> Self {
        Self {
            coordinates: Arc::new(coordinates),
            civil_time: Arc::new(civil_time),
            engine: LunarEngine::from_policy(&policy),
            classifier: NakshatraClassifier::from_policy(&policy),
            matcher: DoshaMatcher::from_policy(&policy),
            params_hash: policy.params_hash().into(),
            policy: Arc::new(policy),
        }
    }

    /// Pipeline from provider lists in priority order.
    pub fn from_providers(
        geocoders: Vec<Arc<dyn GeocodingProvider>>,
        timezones: Vec<Arc<dyn TimezoneProvider>>,
        config: ResolverConfig,
        policy: CalculationPolicyV1,
    ) -> Self {
        let civil_time = CivilTimeResolver::new(timezones, config.clone());
        let coordinates = CoordinateResolver::new(geocoders, config);
        Self::new(coordinates, civil_time, policy)
    }

    /// Offline pipeline: built-in gazetteer, longitude-based offset fallback.
    pub fn offline(policy: CalculationPolicyV1) -> Self {
        Self::from_providers(
            vec![Arc::new(Gazetteer::default())],
            vec![Arc::new(LongitudeEstimateProvider)],
            ResolverConfig::default(),
            policy,
        )
    }

    /// Default online chain: gazetteer, then the public geocoders; TimeAPI,
    /// then the longitude estimate.
    #[cfg(feature = "http")]
    pub fn online(
        transport: Arc<dyn crate::providers::Transport>,
        config: ResolverConfig,
        policy: CalculationPolicyV1,
    ) -> Self {
        use crate::providers::{GeocodeApiProvider, NominatimProvider, PhotonProvider, TimeApiProvider};

        Self::from_providers(
            vec![
                Arc::new(Gazetteer::default()),
                Arc::new(GeocodeApiProvider::new(transport.clone())),
                Arc::new(PhotonProvider::new(transport.clone())),
                Arc::new(NominatimProvider::new(transport.clone())),
            ],
            vec![Arc::new(TimeApiProvider::new(transport)), Arc::new(LongitudeEstimateProvider)],
            config,
            policy,
        )
    }

    /// The active calculation policy.
    pub fn policy(&self) -> &CalculationPolicyV1 {
        &self.policy
    }

    /// Params hash of the active policy.
    pub fn params_hash(&self) -> &str {
        &self.params_hash
    }

    /// The coordinate resolver (for cache statistics).
    pub fn coordinate_resolver(&self) -> &CoordinateResolver {
        &self.coordinates
    }

    /// The civil time resolver.
    pub fn civil_time_resolver(&self) -> &CivilTimeResolver {
        &self.civil_time
    }

    /// The lunar engine.
    pub fn engine(&self) -> &LunarEngine {
        &self.engine
    }

    /// The Dosha matcher.
    pub fn matcher(&self) -> &DoshaMatcher {
        &self.matcher
    }

    /// Compute one person's birth profile.
    pub async fn compute_profile(&self, input: &BirthInput) -> Result<BirthProfile, PipelineError> {
        let span = info_span!("birth_profile", person = "single");
        self.run(input).instrument(span).await
    }

    /// Compute both profiles concurrently and match them.
    pub async fn compute_verdict(
        &self,
        first: &BirthInput,
        second: &BirthInput,
    ) -> Result<Comparison, PipelineError> {
        let (a, b) = tokio::join!(
            self.run(first).instrument(info_span!("birth_profile", person = "person 1")),
            self.run(second).instrument(info_span!("birth_profile", person = "person 2")),
        );
        let first = a.map_err(|e| e.for_person(Person::First))?;
        let second = b.map_err(|e| e.for_person(Person::Second))?;

        let verdict = self.match_profiles(&first, &second);
        info!(
            first = %first.nadi,
            second = %second.nadi,
            has_dosha = verdict.has_dosha,
            reason = %verdict.reason_code,
            "Computed verdict"
        );
        Ok(Comparison { first, second, verdict })
    }

    /// Match two already-computed profiles.
    pub fn match_profiles(&self, first: &BirthProfile, second: &BirthProfile) -> Verdict {
        self.matcher.match_profiles(first, second)
    }

    /// Profile from an explicit UTC offset and coordinates; no providers.
    pub fn compute_from_offset(
        &self,
        birth_date: &str,
        birth_time: &str,
        utc_offset_minutes: i32,
        coordinates: Coordinates,
    ) -> Result<BirthProfile, PipelineError> {
        let local = parse_birth_date(birth_date)?.and_time(parse_birth_time(birth_time)?);
        if utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(InputError::InvalidOffset(utc_offset_minutes.to_string()).into());
        }

        let civil = instant_from_offset(local, utc_offset_minutes)?;
        let place = ResolvedPlace {
            coordinates,
            display_name: coordinates.to_string(),
            zone_id: None,
            source: "explicit-coordinates".to_string(),
            confidence: 1.0,
        };
        self.classify(None, civil, place)
    }

    /// Moon position at a resolved instant, for diagnostics.
    pub fn moon_position(&self, civil: &CivilInstant) -> Result<MoonPosition, PipelineError> {
        self.engine.position(&civil.instant).map_err(PipelineError::Ephemeris)
    }

    async fn run(&self, input: &BirthInput) -> Result<BirthProfile, PipelineError> {
        let parsed = input.parse()?;
        let place = self.coordinates.resolve(&parsed.place).await?;
        let civil = self.civil_time.resolve_place(&place, parsed.local).await?;
        self.classify(parsed.name, civil, place)
    }

    fn classify(
        &self,
        name: Option<String>,
        civil: CivilInstant,
        place: ResolvedPlace,
    ) -> Result<BirthProfile, PipelineError> {
        let position = self.moon_position(&civil)?;
        let class = self
            .classifier
            .classify(position.sidereal_longitude)
            .map_err(PipelineError::Classification)?;

        let profile = BirthProfile {
            name,
            nakshatra: class.nakshatra,
            pada: class.pada,
            nadi: class.nadi,
            sidereal_longitude: position.sidereal_longitude,
            tropical_longitude: position.tropical_longitude,
            ayanamsa: position.ayanamsa,
            civil_instant: civil,
            place,
            policy_params_hash: self.params_hash.to_string(),
        };

        info!(
            nakshatra = %profile.nakshatra,
            pada = profile.pada,
            nadi = %profile.nadi,
            sidereal = profile.sidereal_longitude,
            instant = %profile.civil_instant.instant,
            precision = %profile.civil_instant.precision,
            "Computed birth profile"
        );
        Ok(profile)
    }
}
