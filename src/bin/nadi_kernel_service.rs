//! Nadi Kernel Service Binary
//!
//! Runs the birth profile pipeline as a REST API service:
//! - Structured JSON logging
//! - Request tracing with correlation IDs
//! - Per-client rate limiting on calculation endpoints
//! - Graceful shutdown handling
//!
//! ## Configuration
//!
//! Environment variables:
//! - `PORT`: Service port (default: 8000)
//! - `HOST`: Service host (default: 0.0.0.0)
//! - `RELAY_BASE_URL`: Route provider calls through a relay (default: direct)
//! - `RATE_LIMIT_MAX`, `RATE_LIMIT_WINDOW_SECS`: Rate limit (default: 100 per 3600s)
//! - `NADI_AYANAMSA`: `lahiri` (default), `raman`, `krishnamurti`, `fagan_bradley`
//! - `GEOCODE_TIMEOUT_MS`, `GEOCODE_MAX_ATTEMPTS`, `GEOCODE_BACKOFF_MS`,
//!   `PLACE_CACHE_CAPACITY`, `GEOCODE_MIN_CONFIDENCE`: Resolver tuning
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! PORT=8000 cargo run --bin nadi_kernel_service --features service
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use nadi_kernel::providers::{DirectTransport, RelayTransport, Transport};
use nadi_kernel::service::{create_router, ServiceConfig, ServiceState};
use nadi_kernel::{BirthProfilePipeline, CalculationPolicyV1, ResolverConfig};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nadi_kernel=info,nadi_kernel_service=info,tower_http=info".into());

    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_span_events(FmtSpan::CLOSE))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    let build_sha = option_env!("BUILD_SHA").unwrap_or("dev");
    info!(version = version, build_sha = build_sha, "Starting Nadi Kernel Service");

    let config = ServiceConfig::from_env();
    let resolver_config = ResolverConfig::from_env();

    let transport: Arc<dyn Transport> = match &config.relay_base_url {
        Some(relay) => {
            info!(relay = %relay, "Routing provider calls through relay");
            Arc::new(RelayTransport::new(relay)?)
        }
        None => Arc::new(DirectTransport::new()?),
    };

    let policy = CalculationPolicyV1::with_ayanamsa(config.ayanamsa);
    info!(
        policy_id = %policy.policy_id(),
        params_hash = %policy.params_hash(),
        ayanamsa = %policy.ayanamsa,
        "Calculation policy loaded"
    );

    let pipeline = BirthProfilePipeline::online(transport, resolver_config, policy);
    let state = ServiceState::new(pipeline, &config)?;

    let app = create_router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        address = %addr,
        rate_limit_max = config.rate_limit_max,
        rate_limit_window_secs = config.rate_limit_window.as_secs(),
        "Nadi Kernel Service listening"
    );

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Nadi Kernel Service shutdown complete");
    Ok(())
}
