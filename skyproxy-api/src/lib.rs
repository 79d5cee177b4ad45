//! # skyproxy API Server
//!
//! Caching, rate-limited front for the Open-Meteo forecast API, so that
//! many dashboards can poll the weather without each of them hitting the
//! upstream.
//!
//! ## Endpoints
//!
//! - `GET /api/weather` - Forecast payload, served from cache when fresh
//! - `GET /health` - Liveness plus cache and limiter statistics
//!
//! ## Example
//!
//! ```rust,ignore
//! use skyproxy_api::{ApiConfig, ApiServer};
//!
//! let server = ApiServer::new(ApiConfig::from_env()?)?;
//! server.run(([0, 0, 0, 0], 8080)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod client_id;
mod config;
mod dto;
mod error;
mod handlers;
mod routes;
mod state;

pub use client_id::{resolve_client_id, ClientId};
pub use config::{vars, ApiConfig};
pub use dto::{HealthResponse, RateLimiterStatus};
pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
pub use state::{AppState, WeatherCache};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use axum::Router;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use skyproxy_core::error::Result;

/// API server for skyproxy.
pub struct ApiServer {
    state: Arc<AppState>,
    shutdown: CancellationToken,
}

impl ApiServer {
    /// Creates a new API server with the given configuration.
    pub fn new(config: ApiConfig) -> Result<Self> {
        Ok(Self::with_state(Arc::new(AppState::new(config)?)))
    }

    /// Creates a server around prepared state.
    pub fn with_state(state: Arc<AppState>) -> Self {
        Self {
            state,
            shutdown: CancellationToken::new(),
        }
    }

    /// Shared state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Cancelling this token stops the server as Ctrl-C would.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Creates the router with all routes configured.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET])
            .allow_headers(Any);

        create_router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given address until Ctrl-C or the shutdown
    /// token fires.
    pub async fn run(self, addr: impl Into<SocketAddr>) -> Result<()> {
        let addr = addr.into();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!(
            %addr,
            upstream = %self.state.fetcher.describe(),
            ttl_seconds = self.state.config.cache.ttl_seconds,
            rate_limit = self.state.config.rate_limit.max_requests,
            window_seconds = self.state.config.rate_limit.window_seconds,
            "skyproxy listening"
        );

        let sweeper = spawn_sweeper(
            self.state.clone(),
            Duration::from_secs(self.state.config.sweep_interval_seconds),
            self.shutdown.clone(),
        );

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(self.shutdown.clone()))
            .await;

        self.shutdown.cancel();
        if let Err(err) = sweeper.await {
            warn!(error = %err, "Sweeper task ended abnormally");
        }
        info!("skyproxy stopped");

        served.map_err(Into::into)
    }
}

/// Periodically evicts idle limiter state and expired cache entries.
fn spawn_sweeper(
    state: Arc<AppState>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    state.sweep();
                }
            }
        }
    })
}

async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => {
                warn!(error = %err, "Could not listen for Ctrl-C, waiting for shutdown token");
                token.cancelled().await;
            }
        },
        _ = token.cancelled() => {}
    }
}

/// Starts the API server on `addr` with configuration from the environment.
pub async fn start_server(addr: SocketAddr) -> Result<()> {
    let config = ApiConfig::from_env()?;
    let server = ApiServer::new(config)?;
    server.run(addr).await
}
