//! Nadi Kernel REST Service
//!
//! Exposes the birth profile pipeline and the Dosha matcher over HTTP.
//!
//! ## Endpoints
//!
//! - `POST /api/profile` - One birth profile
//! - `POST /api/calculate-nadi-complete` - One profile, or two profiles and a verdict
//! - `POST /api/calculate-nadi` - Legacy calculation with explicit offset and coordinates
//! - `GET /api/relay?url=` - Forward a GET to an allow-listed provider host
//! - `GET /api/policy` - Active calculation policy
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{
    correlation_middleware, metrics_middleware, rate_limit_middleware, CorrelationId, RateLimiter,
};
pub use routes::{create_router, ErrorResponse, RELAY_ALLOWED_HOSTS};
pub use state::{ServiceConfig, ServiceState};
